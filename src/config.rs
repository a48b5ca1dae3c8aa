// Configuration module
// Startup values for the rendering parameters and where flags are stored

use crate::flags::Palette;
use crate::quality::QUALITY_RANGE;
use anyhow::{bail, Result};
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Padding is a percentage of the canvas side
pub const PADDING_RANGE: RangeInclusive<f32> = 0.0..=50.0;

/// Initial rendering parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Quality step, see [`crate::quality::resolution_for`]
    pub quality: u8,
    /// Inset of the subject image, percent of the canvas side
    pub padding: f32,
    /// Flag rotation in degrees
    pub angle: f32,
    /// Initial flag motif
    pub palette: Palette,
    /// Directory for persisted flags; `None` uses the platform config dir
    pub storage_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: 3,
            padding: 12.0,
            angle: 0.0,
            palette: Palette::Pastel,
            storage_dir: None,
        }
    }
}

impl Config {
    /// Check every value is within the range the controls allow
    pub fn validate(&self) -> Result<()> {
        if !QUALITY_RANGE.contains(&self.quality) {
            bail!(
                "Quality must be between {} and {}, got {}",
                QUALITY_RANGE.start(),
                QUALITY_RANGE.end(),
                self.quality
            );
        }
        if !PADDING_RANGE.contains(&self.padding) {
            bail!("Padding must be between 0 and 50, got {}", self.padding);
        }
        if !self.angle.is_finite() {
            bail!("Angle must be a finite number of degrees");
        }
        Ok(())
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }
}
