use crate::layers::CompositionMode;
use crate::surface::{CompositeOp, RasterSurface};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorOptions {
    /// Opacity of the mask overlay in preview mode. Presentation only.
    pub preview_opacity: f32,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            preview_opacity: 1.0,
        }
    }
}

/// Borrowed inputs of one recompute.
pub struct Layers<'a> {
    pub base: &'a RasterSurface,
    pub mask: &'a RasterSurface,
    pub replacement: Option<&'a RasterSurface>,
    pub mode: CompositionMode,
}

/// Rebuild `output` from the layers. Always starts from a cleared output with
/// the base drawn at the origin, so the result depends on the inputs only.
///
/// Preview draws the mask over the base. Applied draws the replacement,
/// clipped to the mask, over the base: soft mask edges blend the two in
/// proportion to mask alpha.
pub fn recompute(layers: &Layers<'_>, output: &mut RasterSurface, options: &CompositorOptions) {
    output.clear();
    layers
        .base
        .composite_over(output, CompositeOp::Normal { opacity: 1.0 });

    match (layers.mode, layers.replacement) {
        (CompositionMode::Applied, Some(replacement)) => {
            layers
                .mask
                .composite_over(output, CompositeOp::MaskedReplace { replacement });
        }
        (CompositionMode::Applied, None) => {
            // Unreachable through LayerSet, which drops to Preview with the replacement
            tracing::warn!("applied mode without a replacement, rendering preview");
            draw_preview(layers.mask, output, options);
        }
        (CompositionMode::Preview, _) => draw_preview(layers.mask, output, options),
    }
}

fn draw_preview(mask: &RasterSurface, output: &mut RasterSurface, options: &CompositorOptions) {
    if mask.is_clear() {
        return;
    }
    mask.composite_over(
        output,
        CompositeOp::Normal {
            opacity: options.preview_opacity,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Paint, Point, StrokeStyle};
    use image::{ImageBuffer, Rgba};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RasterSurface {
        RasterSurface::from_image(ImageBuffer::from_pixel(width, height, Rgba(color))).unwrap()
    }

    fn dot_mask(width: u32, height: u32, at: Point, size: f32) -> RasterSurface {
        let mut mask = RasterSurface::create(width, height).unwrap();
        let style = StrokeStyle {
            paint: Paint::Color(Rgba([0, 255, 0, 255])),
            width: size,
        };
        mask.draw_segment(at, at, &style);
        mask
    }

    #[test]
    fn test_preview_empty_mask_equals_base() {
        let base = solid(16, 16, [50, 60, 70, 255]);
        let mask = RasterSurface::create(16, 16).unwrap();
        let mut output = solid(16, 16, [1, 1, 1, 1]);
        let layers = Layers {
            base: &base,
            mask: &mask,
            replacement: None,
            mode: CompositionMode::Preview,
        };
        recompute(&layers, &mut output, &CompositorOptions::default());
        assert_eq!(output, base);
    }

    #[test]
    fn test_preview_shows_mask_over_base() {
        let base = solid(30, 30, [50, 60, 70, 255]);
        let mask = dot_mask(30, 30, Point::new(10.0, 10.0), 10.0);
        let mut output = RasterSurface::create(30, 30).unwrap();
        let layers = Layers {
            base: &base,
            mask: &mask,
            replacement: None,
            mode: CompositionMode::Preview,
        };
        recompute(&layers, &mut output, &CompositorOptions::default());
        assert_eq!(output.pixel(10, 10), Rgba([0, 255, 0, 255]));
        assert_eq!(output.pixel(25, 25), Rgba([50, 60, 70, 255]));
    }

    #[test]
    fn test_preview_half_opacity_overlay() {
        let base = solid(30, 30, [0, 0, 0, 255]);
        let mask = dot_mask(30, 30, Point::new(10.0, 10.0), 10.0);
        let mut output = RasterSurface::create(30, 30).unwrap();
        let layers = Layers {
            base: &base,
            mask: &mask,
            replacement: None,
            mode: CompositionMode::Preview,
        };
        let options = CompositorOptions {
            preview_opacity: 0.5,
        };
        recompute(&layers, &mut output, &options);
        let g = output.pixel(10, 10)[1];
        assert!((g as i32 - 128).abs() <= 1, "green = {}", g);
    }

    #[test]
    fn test_applied_shows_replacement_inside_mask() {
        let base = solid(40, 40, [255, 0, 0, 255]);
        let replacement = solid(40, 40, [0, 0, 255, 255]);
        let mask = dot_mask(40, 40, Point::new(10.0, 10.0), 12.0);
        let mut output = RasterSurface::create(40, 40).unwrap();
        let layers = Layers {
            base: &base,
            mask: &mask,
            replacement: Some(&replacement),
            mode: CompositionMode::Applied,
        };
        recompute(&layers, &mut output, &CompositorOptions::default());
        assert_eq!(output.pixel(10, 10), Rgba([0, 0, 255, 255]));
        assert_eq!(output.pixel(30, 30), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_applied_soft_edge_blends_proportionally() {
        let base = solid(40, 40, [255, 0, 0, 255]);
        let replacement = solid(40, 40, [0, 0, 255, 255]);
        let mask = dot_mask(40, 40, Point::new(20.0, 20.0), 20.0);
        let mut output = RasterSurface::create(40, 40).unwrap();
        let layers = Layers {
            base: &base,
            mask: &mask,
            replacement: Some(&replacement),
            mode: CompositionMode::Applied,
        };
        recompute(&layers, &mut output, &CompositorOptions::default());

        let m = mask.pixel(29, 22)[3] as i32;
        assert!(m > 0 && m < 255);
        let px = output.pixel(29, 22);
        assert!((px[2] as i32 - m).abs() <= 1);
        assert!((px[0] as i32 - (255 - m)).abs() <= 1);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let base = solid(24, 24, [12, 34, 56, 255]);
        let replacement = solid(24, 24, [200, 100, 0, 255]);
        let mask = dot_mask(24, 24, Point::new(12.0, 12.0), 9.0);
        let layers = Layers {
            base: &base,
            mask: &mask,
            replacement: Some(&replacement),
            mode: CompositionMode::Applied,
        };
        let mut output = RasterSurface::create(24, 24).unwrap();
        recompute(&layers, &mut output, &CompositorOptions::default());
        let first = output.clone();
        recompute(&layers, &mut output, &CompositorOptions::default());
        assert_eq!(first, output);
    }
}
