// Render scheduler module
// Decides once per display refresh whether the canvas must be repainted

use crate::app::{Action, AppState, RenderParams, Source};
use crate::decoder::Frame;
use crate::quality::resolution_for;
use image::RgbaImage;
use log::{debug, warn};
use thiserror::Error;

/// Reasons a paint call can fail; the tick is retried on the next refresh
#[derive(Debug, Error)]
pub enum PaintError {
    #[error("drawing surface is unavailable")]
    SurfaceUnavailable,
    #[error("failed to prepare drawing context: {0}")]
    Context(String),
    #[error("failed to rasterize source image: {0}")]
    Source(String),
}

/// Square RGBA drawing target
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    pub fn new(size: u32) -> Self {
        Self {
            pixels: RgbaImage::new(size, size),
        }
    }

    /// Side length in pixels
    pub fn size(&self) -> u32 {
        self.pixels.width()
    }

    /// Reallocate to `size`×`size` if needed; returns whether it changed
    pub fn resize(&mut self, size: u32) -> bool {
        if self.size() == size {
            return false;
        }
        debug!("Resizing surface {} -> {}", self.size(), size);
        self.pixels = RgbaImage::new(size, size);
        true
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }
}

/// Everything the painter may read for one frame
#[derive(Debug, Clone, Copy)]
pub struct PaintContext<'a> {
    pub params: RenderParams,
    pub source: &'a Source,
    /// Changes whenever a different source is installed
    pub source_generation: u64,
    /// Frame delay in milliseconds while an animation is loaded
    pub delay: Option<u32>,
    /// Monotonic timestamp of this refresh
    pub timestamp_ms: f64,
    /// Time since the current source was first painted
    pub source_elapsed_ms: f64,
}

impl<'a> PaintContext<'a> {
    /// Animation frame to show at this point of playback
    pub fn current_frame(&self) -> Option<&'a Frame> {
        self.source
            .sequence()
            .map(|sequence| sequence.frame_at(self.source_elapsed_ms))
    }
}

/// Draws one complete frame onto a surface; reads state, never writes it
pub trait Paint {
    fn paint(&mut self, surface: &mut Surface, context: &PaintContext<'_>) -> Result<(), PaintError>;
}

/// Why a tick did not paint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An export is reading the canvas
    Saving,
    /// No surface is attached
    Detached,
    /// Nothing changed and nothing is animating
    Idle,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Painted,
    /// Paint failed; the state stays dirty so the next tick retries
    Failed,
}

/// Cooperative per-refresh render loop
pub struct RenderScheduler<P> {
    painter: P,
    surface: Option<Surface>,
    /// Source generation being played and the timestamp it started at
    playback: Option<(u64, f64)>,
    paint_count: u64,
}

impl<P: Paint> RenderScheduler<P> {
    /// Create a scheduler with no surface attached yet
    pub fn new(painter: P) -> Self {
        Self {
            painter,
            surface: None,
            playback: None,
            paint_count: 0,
        }
    }

    pub fn attach(&mut self, surface: Surface) {
        debug!("Surface attached ({}px)", surface.size());
        self.surface = Some(surface);
    }

    pub fn detach(&mut self) -> Option<Surface> {
        debug!("Surface detached");
        self.surface.take()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn painter_mut(&mut self) -> &mut P {
        &mut self.painter
    }

    /// Number of successful paints so far
    pub fn paint_count(&self) -> u64 {
        self.paint_count
    }

    /// Run one refresh at `timestamp_ms`
    pub fn tick(&mut self, state: &mut AppState, timestamp_ms: f64) -> TickOutcome {
        if state.is_saving() {
            return TickOutcome::Skipped(SkipReason::Saving);
        }

        let Some(surface) = self.surface.as_mut() else {
            return TickOutcome::Skipped(SkipReason::Detached);
        };

        // A painted still stays on screen until something changes
        if !state.is_dirty() && !state.source().is_animated() {
            return TickOutcome::Skipped(SkipReason::Idle);
        }

        let generation = state.source_generation();
        let started_ms = match self.playback {
            Some((playing, started_ms)) if playing == generation => started_ms,
            _ => {
                self.playback = Some((generation, timestamp_ms));
                timestamp_ms
            }
        };

        surface.resize(resolution_for(state.quality()));

        let result = {
            let context = PaintContext {
                params: state.params(),
                source: state.source(),
                source_generation: generation,
                delay: state.delay(),
                timestamp_ms,
                source_elapsed_ms: timestamp_ms - started_ms,
            };
            self.painter.paint(surface, &context)
        };

        match result {
            Ok(()) => {
                self.paint_count += 1;
                if let Err(e) = state.dispatch(Action::MarkClean) {
                    warn!("Could not mark state clean: {:#}", e);
                }
                TickOutcome::Painted
            }
            Err(e) => {
                warn!("Paint failed, retrying next tick: {}", e);
                TickOutcome::Failed
            }
        }
    }
}
