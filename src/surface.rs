use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba, RgbaImage};

use crate::error::{EditorError, Result};

/// A position in canvas pixel space. Integer coordinates fall on pixel corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// What a stroke deposits on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    /// Source-over paint with this color.
    Color(Rgba<u8>),
    /// Remove alpha along the path; color channels survive where alpha remains.
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub paint: Paint,
    /// Line width in canvas pixels. Caps and joins are always round.
    pub width: f32,
}

/// How `composite_over` combines a source surface with its destination.
#[derive(Debug, Clone, Copy)]
pub enum CompositeOp<'a> {
    /// Porter-Duff source-over, with the source alpha multiplied by `opacity`.
    Normal { opacity: f32 },
    /// Destination-in: keep destination pixels only where the source is opaque.
    ClipTo,
    /// Use the source as a mask over `replacement` and draw the result over the
    /// destination. Equivalent to clipping a copy of `replacement` to the mask and
    /// drawing that with `Normal`, in one pass.
    MaskedReplace { replacement: &'a RasterSurface },
}

/// Fixed-size RGBA pixel grid. The size never changes after creation; a resize
/// builds a new surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    /// Blank, fully transparent surface.
    pub fn create(width: u32, height: u32) -> Result<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            image: ImageBuffer::from_pixel(width, height, Rgba([0, 0, 0, 0])),
        })
    }

    pub fn from_image(image: RgbaImage) -> Result<Self> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    /// Stretch `source` to exactly `width` x `height` with bilinear filtering.
    pub fn resampled(source: &RgbaImage, width: u32, height: u32) -> Result<Self> {
        check_dimensions(width, height)?;
        if source.dimensions() == (width, height) {
            return Self::from_image(source.clone());
        }
        Ok(Self {
            image: imageops::resize(source, width, height, FilterType::Triangle),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn is_clear(&self) -> bool {
        self.image.as_raw().chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Fraction of pixels with any alpha at all.
    pub fn coverage(&self) -> f32 {
        let total = (self.width() as usize) * (self.height() as usize);
        let painted = self
            .image
            .as_raw()
            .chunks_exact(4)
            .filter(|px| px[3] > 0)
            .count();
        painted as f32 / total as f32
    }

    pub fn clear(&mut self) {
        if self.is_clear() {
            return;
        }
        let buf: &mut [u8] = self.image.as_mut();
        buf.fill(0);
    }

    /// Draw a round-capped line from `from` to `to`. A zero-length segment
    /// renders a dot of `style.width` diameter. Edges are antialiased by
    /// pixel-center distance to the segment.
    pub fn draw_segment(&mut self, from: Point, to: Point, style: &StrokeStyle) {
        let radius = style.width / 2.0;
        if radius <= 0.0 {
            return;
        }

        let (width, height) = self.dimensions();
        let pad = radius + 1.0;
        let min_x = (from.x.min(to.x) - pad).floor().max(0.0) as u32;
        let min_y = (from.y.min(to.y) - pad).floor().max(0.0) as u32;
        let max_x = ((from.x.max(to.x) + pad).ceil().max(0.0) as u32).min(width);
        let max_y = ((from.y.max(to.y) + pad).ceil().max(0.0) as u32).min(height);

        for y in min_y..max_y {
            for x in min_x..max_x {
                let d = distance_to_segment(x as f32 + 0.5, y as f32 + 0.5, from, to);
                let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let px = &mut self.image.get_pixel_mut(x, y).0;
                match style.paint {
                    Paint::Color(color) => {
                        let sa = coverage * (color[3] as f32 / 255.0);
                        blend_over(px, [color[0], color[1], color[2]], sa);
                    }
                    Paint::Erase => {
                        px[3] = to_u8(px[3] as f32 * (1.0 - coverage));
                        if px[3] == 0 {
                            *px = [0, 0, 0, 0];
                        }
                    }
                }
            }
        }
    }

    /// Blend this surface onto `dest`. A source of a different size is scaled to
    /// fit the destination first.
    pub fn composite_over(&self, dest: &mut RasterSurface, op: CompositeOp<'_>) {
        let (width, height) = dest.dimensions();
        let src = fit(&self.image, width, height);
        let src_buf: &[u8] = src.as_raw();
        let dst_buf: &mut [u8] = dest.image.as_mut();

        match op {
            CompositeOp::Normal { opacity } => {
                if opacity <= 0.0 {
                    return;
                }
                for (d, s) in dst_buf.chunks_exact_mut(4).zip(src_buf.chunks_exact(4)) {
                    let sa = (s[3] as f32 / 255.0) * opacity.min(1.0);
                    blend_over(d, [s[0], s[1], s[2]], sa);
                }
            }
            CompositeOp::ClipTo => {
                for (d, s) in dst_buf.chunks_exact_mut(4).zip(src_buf.chunks_exact(4)) {
                    d[3] = clip_alpha(d[3], s[3]);
                    if d[3] == 0 {
                        d.fill(0);
                    }
                }
            }
            CompositeOp::MaskedReplace { replacement } => {
                let repl = fit(&replacement.image, width, height);
                let repl_buf: &[u8] = repl.as_raw();
                for ((d, m), r) in dst_buf
                    .chunks_exact_mut(4)
                    .zip(src_buf.chunks_exact(4))
                    .zip(repl_buf.chunks_exact(4))
                {
                    let sa = clip_alpha(r[3], m[3]) as f32 / 255.0;
                    blend_over(d, [r[0], r[1], r[2]], sa);
                }
            }
        }
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(EditorError::InvalidDimensions { width, height });
    }
    Ok(())
}

fn fit(src: &RgbaImage, width: u32, height: u32) -> Cow<'_, RgbaImage> {
    if src.dimensions() == (width, height) {
        Cow::Borrowed(src)
    } else {
        Cow::Owned(imageops::resize(src, width, height, FilterType::Nearest))
    }
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn clip_alpha(alpha: u8, mask_alpha: u8) -> u8 {
    to_u8(alpha as f32 * mask_alpha as f32 / 255.0)
}

/// Source-over for one straight-alpha RGBA pixel.
fn blend_over(dst: &mut [u8], src: [u8; 3], sa: f32) {
    if sa <= 0.0 {
        return;
    }

    let da = dst[3] as f32 / 255.0;

    // Opaque source or empty destination: the result is the source itself
    if sa >= 1.0 || da <= 0.0 {
        let alpha = to_u8(sa * 255.0);
        if alpha == 0 {
            return;
        }
        dst[..3].copy_from_slice(&src);
        dst[3] = alpha;
        return;
    }

    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        dst[c] = to_u8((src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a);
    }
    dst[3] = to_u8(out_a * 255.0);
}

fn distance_to_segment(px: f32, py: f32, a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let cx = a.x + dx * t;
    let cy = a.y + dy * t;
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}
