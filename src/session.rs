use serde::Serialize;

use crate::codec::{self, Export, Upload, MAX_UPLOAD_BYTES};
use crate::compositor::CompositorOptions;
use crate::error::{EditorError, Result};
use crate::layers::{CanvasGeometry, LayerSet, Viewport};
use crate::status::{BrushStatus, CanvasStatus, SessionStatus};
use crate::stroke::{BrushColor, BrushSettings, ClientRect, StrokeEngine, StrokeState, Tool};
use crate::surface::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub viewport: Viewport,
    pub compositor: CompositorOptions,
    pub max_upload_bytes: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(1240.0, 520.0),
            compositor: CompositorOptions::default(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

/// Oldest notifications are dropped once this many are waiting to be drained.
pub const MAX_PENDING_NOTIFICATIONS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

/// User-facing outcome of an operation, for whoever renders toasts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub message: String,
}

impl Notification {
    fn success(title: &str, message: &str) -> Self {
        Self {
            level: Level::Success,
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    fn error(title: &str, err: &EditorError) -> Self {
        Self {
            level: Level::Error,
            title: title.to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSlot {
    Base,
    Replacement,
}

/// Issued when a load starts. Only the most recent ticket for a slot is
/// honored when its bytes arrive; older ones are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    slot: LoadSlot,
    generation: u64,
}

/// One editing session: the only owner of the layer set. Every mask mutation,
/// load and mode change recomputes the output before returning.
pub struct EditingSession {
    layers: LayerSet,
    strokes: StrokeEngine,
    brush: BrushSettings,
    options: SessionOptions,
    base_name: Option<String>,
    base_generation: u64,
    replacement_generation: u64,
    notifications: Vec<Notification>,
}

impl EditingSession {
    pub fn new(options: SessionOptions) -> Self {
        Self::with_brush(options, BrushSettings::default())
    }

    pub fn with_brush(options: SessionOptions, brush: BrushSettings) -> Self {
        Self {
            layers: LayerSet::new(),
            strokes: StrokeEngine::new(),
            brush,
            options,
            base_name: None,
            base_generation: 0,
            replacement_generation: 0,
            notifications: Vec::new(),
        }
    }

    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.brush.tool = tool;
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush.set_size(size);
    }

    pub fn set_brush_color(&mut self, color: BrushColor) {
        self.brush.color = color;
    }

    pub fn stroke_state(&self) -> StrokeState {
        self.strokes.state()
    }

    pub fn begin_load(&mut self, slot: LoadSlot) -> LoadTicket {
        let counter = match slot {
            LoadSlot::Base => &mut self.base_generation,
            LoadSlot::Replacement => &mut self.replacement_generation,
        };
        *counter += 1;
        LoadTicket {
            slot,
            generation: *counter,
        }
    }

    fn is_current(&self, ticket: LoadTicket) -> bool {
        let current = match ticket.slot {
            LoadSlot::Base => self.base_generation,
            LoadSlot::Replacement => self.replacement_generation,
        };
        ticket.generation == current
    }

    /// Finish a base load started with `begin_load`. Returns `Ok(false)` when a
    /// newer load has been started since, leaving everything untouched.
    pub fn complete_base_load(&mut self, ticket: LoadTicket, upload: &Upload) -> Result<bool> {
        if ticket.slot != LoadSlot::Base || !self.is_current(ticket) {
            tracing::debug!("Discarding superseded base load of '{}'", upload.name);
            return Ok(false);
        }
        let result = self.apply_base(upload);
        self.record(&result, "Upload failed", ("Image uploaded", "Image uploaded successfully"));
        result.map(|_| true)
    }

    pub fn complete_replacement_load(
        &mut self,
        ticket: LoadTicket,
        upload: &Upload,
    ) -> Result<bool> {
        if ticket.slot != LoadSlot::Replacement || !self.is_current(ticket) {
            tracing::debug!("Discarding superseded replacement load of '{}'", upload.name);
            return Ok(false);
        }
        let result = self.apply_replacement(upload);
        self.record(
            &result,
            "Replacement upload failed",
            (
                "Replacement image uploaded",
                "Replacement image uploaded successfully",
            ),
        );
        result.map(|_| true)
    }

    pub fn load_base(&mut self, upload: &Upload) -> Result<CanvasGeometry> {
        let ticket = self.begin_load(LoadSlot::Base);
        self.complete_base_load(ticket, upload)?;
        self.layers.geometry().ok_or(EditorError::NotReady)
    }

    pub fn load_replacement(&mut self, upload: &Upload) -> Result<()> {
        let ticket = self.begin_load(LoadSlot::Replacement);
        self.complete_replacement_load(ticket, upload).map(|_| ())
    }

    fn apply_base(&mut self, upload: &Upload) -> Result<CanvasGeometry> {
        codec::validate_upload(upload, self.options.max_upload_bytes)?;
        let geometry = self.layers.load_base(&upload.bytes, self.options.viewport)?;
        // The stroke in progress belonged to the old canvas
        self.strokes.pointer_up();
        self.base_name = Some(upload.name.clone());
        self.recompute();

        let (width, height) = geometry.canvas_size();
        tracing::info!(
            "Base '{}' loaded: {}x{} source, scale {:.3}, canvas {}x{}",
            upload.name,
            geometry.source_width,
            geometry.source_height,
            geometry.display_scale,
            width,
            height
        );
        Ok(geometry)
    }

    fn apply_replacement(&mut self, upload: &Upload) -> Result<()> {
        codec::validate_upload(upload, self.options.max_upload_bytes)?;
        self.layers.load_replacement(&upload.bytes)?;
        self.recompute();
        tracing::info!("Replacement '{}' loaded", upload.name);
        Ok(())
    }

    pub fn clear_replacement(&mut self) -> Result<()> {
        let result = self.layers.clear_replacement();
        if result.is_ok() {
            self.recompute();
            tracing::info!("Replacement removed");
        }
        self.record(
            &result,
            "Cannot remove replacement",
            ("Replacement removed", "The replacement image has been removed"),
        );
        result
    }

    /// Start a stroke at a client-space point over the canvas rendered at `rect`.
    pub fn pointer_down(&mut self, client: Point, rect: &ClientRect) -> Result<()> {
        let canvas_size = self.layers.canvas_size();
        let point = rect.to_canvas(client, canvas_size);
        let brush = self.brush;
        let mask = self.layers.mask_mut().ok_or(EditorError::NotReady)?;
        self.strokes.pointer_down(mask, point, &brush);
        self.recompute();
        Ok(())
    }

    /// Extend the active stroke. Silently ignored while idle or before a base
    /// is loaded.
    pub fn pointer_move(&mut self, client: Point, rect: &ClientRect) {
        let canvas_size = self.layers.canvas_size();
        let point = rect.to_canvas(client, canvas_size);
        let Some(mask) = self.layers.mask_mut() else {
            return;
        };
        if self.strokes.pointer_move(mask, point) {
            self.recompute();
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(points) = self.strokes.pointer_up() {
            tracing::debug!("Stroke finished with {} point(s)", points);
        }
    }

    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    pub fn reset_mask(&mut self) -> Result<()> {
        let result = self.layers.reset_mask();
        if result.is_ok() {
            self.strokes.pointer_up();
            self.recompute();
            tracing::info!("Mask reset");
        }
        self.record(
            &result,
            "Reset failed",
            ("Canvas Reset", "Your mask layer has been cleared"),
        );
        result
    }

    pub fn apply_mask(&mut self) -> Result<()> {
        let result = self.layers.apply();
        if result.is_ok() {
            self.recompute();
            tracing::info!("Mask applied");
        }
        self.record(
            &result,
            "Cannot apply mask",
            ("Mask applied", "Replacement composited into the masked area"),
        );
        result
    }

    /// Encode the output layer as PNG, named after the base upload.
    pub fn export(&mut self) -> Result<Export> {
        self.recompute();
        let result = self.encode_output();
        self.record(
            &result,
            "Failed to export image",
            ("Image exported", "Image exported successfully"),
        );
        result
    }

    fn encode_output(&self) -> Result<Export> {
        let output = self.layers.output().ok_or(EditorError::NotReady)?;
        let bytes = codec::encode_png(output)?;
        let filename = codec::suggested_filename("masked", self.base_stem());
        tracing::info!("Exported {} ({} bytes)", filename, bytes.len());
        Ok(Export { filename, bytes })
    }

    /// Encode the mask layer itself, for consumers that take a mask image.
    pub fn export_mask(&self) -> Result<Export> {
        let mask = self.layers.mask().ok_or(EditorError::NotReady)?;
        let bytes = codec::encode_png(mask)?;
        Ok(Export {
            filename: codec::suggested_filename("mask", self.base_stem()),
            bytes,
        })
    }

    /// Drop every layer and go back to the empty state.
    pub fn unload(&mut self) {
        self.strokes.pointer_up();
        self.layers.unload();
        self.base_name = None;
        // Loads still in flight belong to the closed image
        self.base_generation += 1;
        self.replacement_generation += 1;
        tracing::info!("Session unloaded");
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn status(&self) -> SessionStatus {
        let canvas = self.layers.geometry().map(|geometry| {
            let (width, height) = self.layers.canvas_size();
            CanvasStatus {
                width,
                height,
                source_width: geometry.source_width,
                source_height: geometry.source_height,
                display_scale: geometry.display_scale,
                mode: self.layers.mode(),
                has_replacement: self.layers.replacement().is_some(),
                mask_coverage: self.layers.mask().map(|m| m.coverage()).unwrap_or(0.0),
            }
        });
        SessionStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            base_name: self.base_name.clone(),
            canvas,
            brush: BrushStatus {
                tool: self.brush.tool,
                size: self.brush.size(),
                color: self.brush.color,
            },
            stroke: self.strokes.state(),
        }
    }

    fn base_stem(&self) -> &str {
        self.base_name.as_deref().unwrap_or("image")
    }

    fn recompute(&mut self) {
        self.layers.recompute(&self.options.compositor);
    }

    fn record<T>(&mut self, result: &Result<T>, failure: &str, success: (&str, &str)) {
        let note = match result {
            Ok(_) => Notification::success(success.0, success.1),
            Err(e) => {
                tracing::warn!("{}: {}", failure, e);
                Notification::error(failure, e)
            }
        };
        if self.notifications.len() == MAX_PENDING_NOTIFICATIONS {
            self.notifications.remove(0);
        }
        self.notifications.push(note);
    }
}
