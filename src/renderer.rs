// CPU flag renderer
// Draws the striped flag and the circular subject image into a surface

use crate::app::Source;
use crate::config::PADDING_RANGE;
use crate::decoder::{Frame, StillImage};
use crate::flags::Palette;
use crate::scheduler::{Paint, PaintContext, PaintError, Surface};
use image::{Rgba, RgbaImage};
use log::debug;

/// Reference painter: rotated flag stripes with the subject clipped to a circle
#[derive(Debug, Default)]
pub struct FlagPainter {
    /// Rasterized still image and the source generation it belongs to
    still_cache: Option<(u64, RgbaImage)>,
}

impl FlagPainter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterize the still once per source and reuse it afterwards
    fn still_raster(&mut self, generation: u64, still: &StillImage) -> Result<&RgbaImage, PaintError> {
        let fresh = matches!(&self.still_cache, Some((cached, _)) if *cached == generation);
        if !fresh {
            let raster = still.to_rgba().map_err(|e| PaintError::Source(e.to_string()))?;
            debug!(
                "Rasterized still image {}x{} for source {}",
                raster.width(),
                raster.height(),
                generation
            );
            self.still_cache = Some((generation, raster));
        }

        match &self.still_cache {
            Some((_, raster)) => Ok(raster),
            None => Err(PaintError::Source("still image cache is empty".to_string())),
        }
    }
}

impl Paint for FlagPainter {
    fn paint(&mut self, surface: &mut Surface, context: &PaintContext<'_>) -> Result<(), PaintError> {
        if surface.size() == 0 {
            return Err(PaintError::SurfaceUnavailable);
        }

        let params = context.params;
        draw_flag(surface.pixels_mut(), params.palette, params.angle);

        let subject = match context.source {
            Source::None => {
                self.still_cache = None;
                None
            }
            Source::Still(still) => Some(self.still_raster(context.source_generation, still)?),
            Source::Animated(_) => {
                self.still_cache = None;
                context.current_frame().map(Frame::pixels)
            }
        };

        if let Some(subject) = subject {
            draw_subject(surface.pixels_mut(), subject, params.padding);
        }

        Ok(())
    }
}

/// Fill the canvas with the palette's stripes, rotated by `angle` degrees
fn draw_flag(canvas: &mut RgbaImage, palette: Palette, angle: f32) {
    let stripes = palette.stripes();
    let size = canvas.width() as f32;
    let center = size / 2.0;
    let (sin, cos) = angle.to_radians().sin_cos();
    // Height of the square projected onto the stripe normal
    let extent = size * (sin.abs() + cos.abs());

    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - center;
        let dy = y as f32 + 0.5 - center;
        let v = dy * cos - dx * sin;

        let t = (v / extent + 0.5).clamp(0.0, 1.0);
        let index = ((t * stripes.len() as f32) as usize).min(stripes.len() - 1);
        let [r, g, b] = stripes[index];
        *pixel = Rgba([r, g, b, 0xff]);
    }
}

/// Composite `subject` over the canvas, scaled to cover a centered circle
fn draw_subject(canvas: &mut RgbaImage, subject: &RgbaImage, padding: f32) {
    let (img_width, img_height) = subject.dimensions();
    if img_width == 0 || img_height == 0 {
        return;
    }

    let size = canvas.width() as f32;
    let padding = padding.clamp(*PADDING_RANGE.start(), *PADDING_RANGE.end()) / 100.0;
    let radius = size / 2.0 * (1.0 - 2.0 * padding);
    if radius <= 0.0 {
        return;
    }

    let center = size / 2.0;
    // Cover: the shorter image side spans the circle's diameter
    let scale = (2.0 * radius) / img_width.min(img_height) as f32;

    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - center;
        let dy = y as f32 + 0.5 - center;
        let distance = (dx * dx + dy * dy).sqrt();

        // Anti-aliased circle edge
        let coverage = (radius - distance + 0.5).clamp(0.0, 1.0);
        if coverage == 0.0 {
            continue;
        }

        let src_x = dx / scale + img_width as f32 / 2.0 - 0.5;
        let src_y = dy / scale + img_height as f32 / 2.0 - 0.5;
        let sample = sample_bilinear(subject, src_x, src_y);

        let alpha = sample[3] / 255.0 * coverage;
        for c in 0..3 {
            let blended = sample[c] * alpha + pixel[c] as f32 * (1.0 - alpha);
            pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Bilinear interpolation with edge clamping
fn sample_bilinear(image: &RgbaImage, src_x: f32, src_y: f32) -> [f32; 4] {
    let max_x = image.width() - 1;
    let max_y = image.height() - 1;

    let src_x = src_x.clamp(0.0, max_x as f32);
    let src_y = src_y.clamp(0.0, max_y as f32);

    let x0 = src_x.floor() as u32;
    let y0 = src_y.floor() as u32;
    let x1 = (x0 + 1).min(max_x);
    let y1 = (y0 + 1).min(max_y);

    let fx = src_x - x0 as f32;
    let fy = src_y - y0 as f32;

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut out = [0.0; 4];
    for (c, value) in out.iter_mut().enumerate() {
        let v0 = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let v1 = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        *value = v0 * (1.0 - fy) + v1 * fy;
    }
    out
}
