// Export module
// Renders the current state off-screen and encodes it as PNG or looping GIF

use crate::app::{Action, AppState};
use crate::scheduler::{Paint, PaintContext, Surface};
use anyhow::{Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, ImageFormat};
use log::info;
use std::io::Cursor;

/// Encoding chosen for an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Gif,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Gif => "gif",
        }
    }
}

/// An encoded render
#[derive(Debug, Clone)]
pub struct Export {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
    pub frame_count: usize,
}

/// Render and encode the current state at `resolution`.
///
/// Animations become a looping GIF with one frame per source frame,
/// everything else a PNG. `saving` is held for the whole export so the
/// live scheduler stays off the canvas, and is restored to its previous
/// value on every path.
pub fn export<P: Paint>(state: &mut AppState, painter: &mut P, resolution: u32) -> Result<Export> {
    let was_saving = state.is_saving();
    state.dispatch(Action::SetSaving(true))?;
    let result = render(state, painter, resolution);
    state.dispatch(Action::SetSaving(was_saving))?;

    let export = result?;
    info!(
        "Exported {} frame(s) as {} ({} bytes)",
        export.frame_count,
        export.format.extension(),
        export.bytes.len()
    );
    Ok(export)
}

fn render<P: Paint>(state: &AppState, painter: &mut P, resolution: u32) -> Result<Export> {
    let mut surface = Surface::new(resolution);
    let context = |elapsed_ms: f64| PaintContext {
        params: state.params(),
        source: state.source(),
        source_generation: state.source_generation(),
        delay: state.delay(),
        timestamp_ms: elapsed_ms,
        source_elapsed_ms: elapsed_ms,
    };

    let mut bytes = Vec::new();

    let Some(sequence) = state.source().sequence() else {
        painter
            .paint(&mut surface, &context(0.0))
            .context("Failed to render export")?;
        DynamicImage::ImageRgba8(surface.into_image())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("Failed to encode PNG")?;
        return Ok(Export {
            format: ExportFormat::Png,
            bytes,
            frame_count: 1,
        });
    };

    let delay = Delay::from_numer_denom_ms(sequence.delay_ms(), 1);
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, 10);
        encoder
            .set_repeat(Repeat::Infinite)
            .context("Failed to configure GIF encoder")?;

        for index in 0..sequence.len() {
            let elapsed_ms = index as f64 * sequence.delay_ms() as f64;
            painter
                .paint(&mut surface, &context(elapsed_ms))
                .with_context(|| format!("Failed to render frame {index}"))?;

            let frame = image::Frame::from_parts(surface.pixels().clone(), 0, 0, delay);
            encoder
                .encode_frame(frame)
                .with_context(|| format!("Failed to encode frame {index}"))?;
        }
    }

    Ok(Export {
        format: ExportFormat::Gif,
        bytes,
        frame_count: sequence.len(),
    })
}
