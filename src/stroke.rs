use std::fmt;
use std::str::FromStr;

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::surface::{Paint, Point, RasterSurface, StrokeStyle};

pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 50;
pub const DEFAULT_BRUSH_SIZE: u32 = 20;
pub const DEFAULT_BRUSH_COLOR: BrushColor = BrushColor([0x3B, 0x82, 0xF6]);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

/// Opaque RGB brush color, written as `#rrggbb` or `#rgb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BrushColor(pub [u8; 3]);

impl BrushColor {
    pub fn rgba(&self) -> Rgba<u8> {
        let [r, g, b] = self.0;
        Rgba([r, g, b, 255])
    }
}

impl Default for BrushColor {
    fn default() -> Self {
        DEFAULT_BRUSH_COLOR
    }
}

impl FromStr for BrushColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(format!("invalid color '{}': not hexadecimal", s));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(format!("invalid color '{}': expected #rgb or #rrggbb", s)),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| format!("invalid color '{}': not hexadecimal", s))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl TryFrom<String> for BrushColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BrushColor> for String {
    fn from(color: BrushColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for BrushColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

/// Current tool selection. A stroke snapshots these at pointer-down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushSettings {
    pub tool: Tool,
    size: u32,
    pub color: BrushColor,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            size: DEFAULT_BRUSH_SIZE,
            color: DEFAULT_BRUSH_COLOR,
        }
    }
}

impl BrushSettings {
    pub fn new(tool: Tool, size: u32, color: BrushColor) -> Self {
        let mut settings = Self {
            tool,
            size: DEFAULT_BRUSH_SIZE,
            color,
        };
        settings.set_size(size);
        settings
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Clamped to 1..=50.
    pub fn set_size(&mut self, size: u32) {
        self.size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    /// Brush size is stroke width in canvas pixels, whatever the display scale.
    pub fn style(&self) -> StrokeStyle {
        let paint = match self.tool {
            Tool::Brush => Paint::Color(self.color.rgba()),
            Tool::Eraser => Paint::Erase,
        };
        StrokeStyle {
            paint,
            width: self.size as f32,
        }
    }
}

/// Where the canvas is rendered on screen, in client coordinates. Its size may
/// differ from the canvas pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ClientRect {
    /// Rendered at the origin at exactly its pixel size.
    pub fn unscaled(canvas_size: (u32, u32)) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: canvas_size.0 as f32,
            height: canvas_size.1 as f32,
        }
    }

    /// Map a client-space point into canvas pixel space.
    pub fn to_canvas(&self, client: Point, canvas_size: (u32, u32)) -> Point {
        let ratio = |rendered: f32, pixels: u32| {
            if rendered > 0.0 && pixels > 0 {
                rendered / pixels as f32
            } else {
                1.0
            }
        };
        let rx = ratio(self.width, canvas_size.0);
        let ry = ratio(self.height, canvas_size.1);
        Point::new((client.x - self.left) / rx, (client.y - self.top) / ry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeState {
    Idle,
    Drawing,
}

struct Stroke {
    style: StrokeStyle,
    points: Vec<Point>,
}

/// Pointer-driven painting on the mask. Points are in canvas pixel space.
#[derive(Default)]
pub struct StrokeEngine {
    active: Option<Stroke>,
}

impl StrokeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StrokeState {
        if self.active.is_some() {
            StrokeState::Drawing
        } else {
            StrokeState::Idle
        }
    }

    /// Start a stroke at `point` and paint its starting dot. A pointer-down while
    /// already drawing starts over with a new stroke.
    pub fn pointer_down(&mut self, mask: &mut RasterSurface, point: Point, brush: &BrushSettings) {
        let style = brush.style();
        mask.draw_segment(point, point, &style);
        self.active = Some(Stroke {
            style,
            points: vec![point],
        });
    }

    /// Extend the active stroke. Returns false (and draws nothing) when idle.
    pub fn pointer_move(&mut self, mask: &mut RasterSurface, point: Point) -> bool {
        let Some(stroke) = self.active.as_mut() else {
            return false;
        };
        let prev = stroke.points.last().copied().unwrap_or(point);
        mask.draw_segment(prev, point, &stroke.style);
        stroke.points.push(point);
        true
    }

    /// End the active stroke, returning how many points it had.
    pub fn pointer_up(&mut self) -> Option<usize> {
        self.active.take().map(|s| s.points.len())
    }

    pub fn pointer_leave(&mut self) -> Option<usize> {
        self.pointer_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colors() {
        assert_eq!("#3B82F6".parse::<BrushColor>().unwrap(), DEFAULT_BRUSH_COLOR);
        assert_eq!("#fff".parse::<BrushColor>().unwrap(), BrushColor([255, 255, 255]));
        assert_eq!("00ff00".parse::<BrushColor>().unwrap(), BrushColor([0, 255, 0]));
        assert!("#12345".parse::<BrushColor>().is_err());
        assert!("#gggggg".parse::<BrushColor>().is_err());
    }

    #[test]
    fn test_color_display() {
        assert_eq!(DEFAULT_BRUSH_COLOR.to_string(), "#3b82f6");
    }

    #[test]
    fn test_size_is_clamped() {
        let mut brush = BrushSettings::default();
        assert_eq!(brush.size(), 20);
        brush.set_size(0);
        assert_eq!(brush.size(), 1);
        brush.set_size(500);
        assert_eq!(brush.size(), 50);
        assert_eq!(BrushSettings::new(Tool::Eraser, 99, DEFAULT_BRUSH_COLOR).size(), 50);
    }

    #[test]
    fn test_eraser_style() {
        let brush = BrushSettings::new(Tool::Eraser, 8, DEFAULT_BRUSH_COLOR);
        assert_eq!(brush.style().paint, Paint::Erase);
        assert_eq!(brush.style().width, 8.0);
    }

    #[test]
    fn test_client_to_canvas_divides_by_render_ratio() {
        // 400x300 buffer shown at 800x600, offset by (100, 50)
        let rect = ClientRect {
            left: 100.0,
            top: 50.0,
            width: 800.0,
            height: 600.0,
        };
        let p = rect.to_canvas(Point::new(300.0, 250.0), (400, 300));
        assert_eq!(p, Point::new(100.0, 100.0));
    }

    #[test]
    fn test_unscaled_rect_is_identity() {
        let rect = ClientRect::unscaled((64, 32));
        assert_eq!(rect.to_canvas(Point::new(7.5, 3.0), (64, 32)), Point::new(7.5, 3.0));
    }

    #[test]
    fn test_state_machine() {
        let mut mask = RasterSurface::create(50, 50).unwrap();
        let mut engine = StrokeEngine::new();
        let brush = BrushSettings::new(Tool::Brush, 4, DEFAULT_BRUSH_COLOR);

        assert_eq!(engine.state(), StrokeState::Idle);
        assert!(!engine.pointer_move(&mut mask, Point::new(5.0, 5.0)));
        assert!(mask.is_clear());

        engine.pointer_down(&mut mask, Point::new(5.0, 5.0), &brush);
        assert_eq!(engine.state(), StrokeState::Drawing);
        assert!(engine.pointer_move(&mut mask, Point::new(40.0, 5.0)));
        assert_eq!(engine.pointer_up(), Some(2));
        assert_eq!(engine.state(), StrokeState::Idle);
        assert_eq!(engine.pointer_leave(), None);

        assert_eq!(mask.pixel(20, 5)[3], 255);
    }

    #[test]
    fn test_style_is_fixed_at_stroke_start() {
        let mut mask = RasterSurface::create(60, 20).unwrap();
        let mut engine = StrokeEngine::new();
        let mut brush = BrushSettings::new(Tool::Brush, 4, DEFAULT_BRUSH_COLOR);

        engine.pointer_down(&mut mask, Point::new(5.0, 10.0), &brush);
        brush.tool = Tool::Eraser;
        engine.pointer_move(&mut mask, Point::new(50.0, 10.0));
        engine.pointer_up();

        assert_eq!(mask.pixel(30, 10)[3], 255);
    }

    #[test]
    fn test_eraser_stroke_clears_painted_path() {
        let mut mask = RasterSurface::create(60, 20).unwrap();
        let mut engine = StrokeEngine::new();
        let paint = BrushSettings::new(Tool::Brush, 12, "#ff00ff".parse().unwrap());
        let erase = BrushSettings::new(Tool::Eraser, 6, DEFAULT_BRUSH_COLOR);

        engine.pointer_down(&mut mask, Point::new(5.0, 10.0), &paint);
        engine.pointer_move(&mut mask, Point::new(55.0, 10.0));
        engine.pointer_up();

        engine.pointer_down(&mut mask, Point::new(5.0, 10.0), &erase);
        engine.pointer_move(&mut mask, Point::new(55.0, 10.0));
        engine.pointer_up();

        for x in 5..55 {
            assert_eq!(mask.pixel(x, 10)[3], 0, "x = {}", x);
        }
        // Beyond the eraser's reach the paint survives
        assert_eq!(mask.pixel(30, 5)[3], 255);
    }
}
