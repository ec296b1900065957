use image::RgbaImage;
use serde::Serialize;

use crate::codec;
use crate::compositor::{self, CompositorOptions, Layers};
use crate::error::{EditorError, Prerequisite, Result};
use crate::surface::RasterSurface;

/// Space available for displaying the canvas, in CSS/viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Source image size, the factor it's shrunk by to fit the viewport, and the
/// resulting canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CanvasGeometry {
    pub source_width: u32,
    pub source_height: u32,
    pub display_scale: f64,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl CanvasGeometry {
    /// Images larger than the viewport are scaled down to fit; smaller ones are
    /// never scaled up. The binding axis takes the viewport size exactly and
    /// only the other axis is floored.
    pub fn compute(source_width: u32, source_height: u32, viewport: Viewport) -> Self {
        let sw = f64::from(source_width);
        let sh = f64::from(source_height);
        let vw = f64::from(viewport.width);
        let vh = f64::from(viewport.height);

        if sw <= vw && sh <= vh {
            return Self {
                source_width,
                source_height,
                display_scale: 1.0,
                canvas_width: source_width,
                canvas_height: source_height,
            };
        }

        let scale_x = vw / sw;
        let scale_y = vh / sh;
        let (display_scale, canvas_width, canvas_height) = if scale_x <= scale_y {
            let height = floor_px(sh * scale_x).min(source_height);
            (scale_x, floor_px(vw).min(source_width), height)
        } else {
            let width = floor_px(sw * scale_y).min(source_width);
            (scale_y, width, floor_px(vh).min(source_height))
        };
        Self {
            source_width,
            source_height,
            display_scale,
            canvas_width,
            canvas_height,
        }
    }

    /// Pixel size shared by base, mask and output.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }
}

fn floor_px(v: f64) -> u32 {
    (v.floor() as u32).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionMode {
    /// Mask drawn as an overlay on the base.
    Preview,
    /// Replacement clipped to the mask, drawn over the base.
    Applied,
}

struct Replacement {
    // Kept so a new base can re-stretch it to the new canvas size.
    source: RgbaImage,
    surface: RasterSurface,
}

struct Loaded {
    geometry: CanvasGeometry,
    base: RasterSurface,
    mask: RasterSurface,
    output: RasterSurface,
    replacement: Option<Replacement>,
    mode: CompositionMode,
}

impl Loaded {
    fn recompute(&mut self, options: &CompositorOptions) {
        let layers = Layers {
            base: &self.base,
            mask: &self.mask,
            replacement: self.replacement.as_ref().map(|r| &r.surface),
            mode: self.mode,
        };
        compositor::recompute(&layers, &mut self.output, options);
    }
}

/// The four layers of one editing session. Nothing but the canvas size exists
/// until a base image is loaded; every other operation is rejected until then.
#[derive(Default)]
pub struct LayerSet {
    loaded: Option<Loaded>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Decode a new base image and rebuild every layer at the computed canvas
    /// size. The mask starts empty and the mode returns to `Preview`. An existing
    /// replacement is re-stretched to the new size. On error nothing changes.
    pub fn load_base(&mut self, bytes: &[u8], viewport: Viewport) -> Result<CanvasGeometry> {
        let decoded = codec::decode(bytes)?;
        let geometry = CanvasGeometry::compute(decoded.width(), decoded.height(), viewport);
        let (width, height) = geometry.canvas_size();

        let base = RasterSurface::resampled(&decoded, width, height)?;
        let mask = RasterSurface::create(width, height)?;
        let output = RasterSurface::create(width, height)?;
        let restretched = match self.loaded.as_ref().and_then(|l| l.replacement.as_ref()) {
            Some(prev) => Some(RasterSurface::resampled(&prev.source, width, height)?),
            None => None,
        };
        let replacement = self
            .loaded
            .take()
            .and_then(|l| l.replacement)
            .zip(restretched)
            .map(|(prev, surface)| Replacement {
                source: prev.source,
                surface,
            });

        self.loaded = Some(Loaded {
            geometry,
            base,
            mask,
            output,
            replacement,
            mode: CompositionMode::Preview,
        });
        Ok(geometry)
    }

    /// Decode a replacement image and stretch it to the canvas size. Mask and
    /// mode are left alone.
    pub fn load_replacement(&mut self, bytes: &[u8]) -> Result<()> {
        let loaded = self
            .loaded
            .as_mut()
            .ok_or(EditorError::Precedence(Prerequisite::Base))?;
        let source = codec::decode(bytes)?;
        let (width, height) = loaded.base.dimensions();
        let surface = RasterSurface::resampled(&source, width, height)?;
        loaded.replacement = Some(Replacement { source, surface });
        Ok(())
    }

    pub fn clear_replacement(&mut self) -> Result<()> {
        let loaded = self.loaded.as_mut().ok_or(EditorError::NotReady)?;
        loaded.replacement = None;
        loaded.mode = CompositionMode::Preview;
        Ok(())
    }

    pub fn reset_mask(&mut self) -> Result<()> {
        let loaded = self.loaded.as_mut().ok_or(EditorError::NotReady)?;
        loaded.mask.clear();
        loaded.mode = CompositionMode::Preview;
        Ok(())
    }

    /// Switch to `Applied`. Needs a replacement and a non-empty mask.
    pub fn apply(&mut self) -> Result<()> {
        let loaded = self.loaded.as_mut().ok_or(EditorError::NotReady)?;
        if loaded.replacement.is_none() {
            return Err(EditorError::Precedence(Prerequisite::Replacement));
        }
        if loaded.mask.is_clear() {
            return Err(EditorError::Precedence(Prerequisite::MaskContent));
        }
        loaded.mode = CompositionMode::Applied;
        Ok(())
    }

    /// Rebuild the output layer from the others. No-op when nothing is loaded.
    pub fn recompute(&mut self, options: &CompositorOptions) {
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.recompute(options);
        }
    }

    pub fn unload(&mut self) {
        self.loaded = None;
    }

    /// Canvas size in pixels, or (0, 0) before a base is loaded.
    pub fn canvas_size(&self) -> (u32, u32) {
        self.loaded
            .as_ref()
            .map(|l| l.base.dimensions())
            .unwrap_or((0, 0))
    }

    pub fn geometry(&self) -> Option<CanvasGeometry> {
        self.loaded.as_ref().map(|l| l.geometry)
    }

    pub fn mode(&self) -> CompositionMode {
        self.loaded
            .as_ref()
            .map(|l| l.mode)
            .unwrap_or(CompositionMode::Preview)
    }

    pub fn base(&self) -> Option<&RasterSurface> {
        self.loaded.as_ref().map(|l| &l.base)
    }

    pub fn mask(&self) -> Option<&RasterSurface> {
        self.loaded.as_ref().map(|l| &l.mask)
    }

    pub(crate) fn mask_mut(&mut self) -> Option<&mut RasterSurface> {
        self.loaded.as_mut().map(|l| &mut l.mask)
    }

    pub fn replacement(&self) -> Option<&RasterSurface> {
        self.loaded
            .as_ref()
            .and_then(|l| l.replacement.as_ref().map(|r| &r.surface))
    }

    pub fn output(&self) -> Option<&RasterSurface> {
        self.loaded.as_ref().map(|l| &l.output)
    }
}
