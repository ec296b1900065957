use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::codec::MAX_UPLOAD_BYTES;
use crate::compositor::CompositorOptions;
use crate::layers::Viewport;
use crate::session::SessionOptions;
use crate::stroke::{BrushColor, BrushSettings, Tool, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub brush: BrushConfig,
    pub session: SessionScript,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: f32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f32,
    #[serde(default = "default_preview_opacity")]
    pub preview_opacity: f32,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            preview_opacity: default_preview_opacity(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_viewport_width() -> f32 {
    1240.0
}

fn default_viewport_height() -> f32 {
    520.0
}

fn default_preview_opacity() -> f32 {
    1.0
}

fn default_max_upload_bytes() -> usize {
    MAX_UPLOAD_BYTES
}

#[derive(Debug, Deserialize)]
pub struct BrushConfig {
    #[serde(default)]
    pub tool: Tool,
    #[serde(default = "default_brush_size")]
    pub size: u32,
    #[serde(default)]
    pub color: BrushColor,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            tool: Tool::default(),
            size: default_brush_size(),
            color: BrushColor::default(),
        }
    }
}

fn default_brush_size() -> u32 {
    crate::stroke::DEFAULT_BRUSH_SIZE
}

/// What the headless run does: which images to load, which strokes to paint.
#[derive(Debug, Deserialize)]
pub struct SessionScript {
    pub base: PathBuf,
    pub replacement: Option<PathBuf>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub apply: bool,
    #[serde(default)]
    pub export_mask: bool,
    #[serde(default)]
    pub stroke: Vec<StrokeConfig>,
}

fn default_output() -> PathBuf {
    PathBuf::from(".")
}

/// One stroke in canvas pixel space. Unset fields fall back to `[brush]`.
#[derive(Debug, Deserialize)]
pub struct StrokeConfig {
    pub tool: Option<Tool>,
    pub size: Option<u32>,
    pub color: Option<BrushColor>,
    pub points: Vec<[f32; 2]>,
}

impl StrokeConfig {
    pub fn brush(&self, defaults: &BrushSettings) -> BrushSettings {
        BrushSettings::new(
            self.tool.unwrap_or(defaults.tool),
            self.size.unwrap_or(defaults.size()),
            self.color.unwrap_or(defaults.color),
        )
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let mut config = Self::from_toml(&content)?;
        if let Some(dir) = path.parent() {
            config.session.resolve_relative_to(dir);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let s = &self.settings;
        if s.viewport_width <= 0.0 || s.viewport_height <= 0.0 {
            anyhow::bail!("viewport_width and viewport_height must be > 0");
        }
        if !(0.0..=1.0).contains(&s.preview_opacity) {
            anyhow::bail!("preview_opacity must be 0.0–1.0");
        }
        if s.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be > 0");
        }
        check_brush_size("[brush]", self.brush.size)?;
        for (i, stroke) in self.session.stroke.iter().enumerate() {
            if stroke.points.is_empty() {
                anyhow::bail!("Stroke {}: at least one point is required", i + 1);
            }
            if let Some(size) = stroke.size {
                check_brush_size(&format!("Stroke {}", i + 1), size)?;
            }
        }
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            viewport: Viewport::new(self.settings.viewport_width, self.settings.viewport_height),
            compositor: CompositorOptions {
                preview_opacity: self.settings.preview_opacity,
            },
            max_upload_bytes: self.settings.max_upload_bytes,
        }
    }

    pub fn brush_settings(&self) -> BrushSettings {
        BrushSettings::new(self.brush.tool, self.brush.size, self.brush.color)
    }
}

impl SessionScript {
    fn resolve_relative_to(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        resolve(&mut self.base);
        if let Some(ref mut replacement) = self.replacement {
            resolve(replacement);
        }
        resolve(&mut self.output);
    }
}

fn check_brush_size(what: &str, size: u32) -> anyhow::Result<()> {
    if !(MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE).contains(&size) {
        anyhow::bail!(
            "{}: brush size must be {}–{}",
            what,
            MIN_BRUSH_SIZE,
            MAX_BRUSH_SIZE
        );
    }
    Ok(())
}
