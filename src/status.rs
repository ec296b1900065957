use serde::Serialize;

use crate::layers::CompositionMode;
use crate::stroke::{BrushColor, StrokeState, Tool};

/// Snapshot of a session for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    /// Absent until a base image is loaded.
    pub canvas: Option<CanvasStatus>,
    pub brush: BrushStatus,
    pub stroke: StrokeState,
}

#[derive(Debug, Clone, Serialize)]
pub struct CanvasStatus {
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub display_scale: f64,
    pub mode: CompositionMode,
    pub has_replacement: bool,
    /// Fraction of mask pixels with any paint.
    pub mask_coverage: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrushStatus {
    pub tool: Tool,
    pub size: u32,
    pub color: BrushColor,
}

impl SessionStatus {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
