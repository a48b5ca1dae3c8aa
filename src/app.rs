// Application state module
// The single mutable record read by the render loop and written by UI actions

use crate::config::Config;
use crate::decoder::{DecodedSource, Sequence, StillImage};
use crate::flags::Palette;
use crate::storage::{NoticeStore, SHOWN_ADVERT_KEY};
use anyhow::{Context, Result};
use log::{debug, warn};

/// Angles closer to zero than this (in degrees) snap to zero
pub const ANGLE_SNAP: f32 = 0.25;

/// The image currently being framed
#[derive(Debug, Default)]
pub enum Source {
    #[default]
    None,
    Still(StillImage),
    Animated(Sequence),
}

impl Source {
    pub fn is_none(&self) -> bool {
        matches!(self, Source::None)
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Source::Animated(_))
    }

    pub fn still(&self) -> Option<&StillImage> {
        match self {
            Source::Still(still) => Some(still),
            _ => None,
        }
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            Source::Animated(sequence) => Some(sequence),
            _ => None,
        }
    }

    /// Bytes of image data held by this source
    pub fn byte_len(&self) -> usize {
        match self {
            Source::None => 0,
            Source::Still(still) => still.byte_len(),
            Source::Animated(sequence) => sequence.byte_len(),
        }
    }
}

/// Every transition the state accepts
#[derive(Debug)]
pub enum Action {
    MarkClean,
    SetQuality(u8),
    SetPadding(f32),
    SetAngle(f32),
    SetPalette(Palette),
    SetImage(StillImage),
    SetSequence(Sequence),
    ToggleEasterEgg,
    SetSaving(bool),
    SetAdvertShowing(bool),
    MarkNoticeShown,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::MarkClean => "markClean",
            Action::SetQuality(_) => "setQuality",
            Action::SetPadding(_) => "setPadding",
            Action::SetAngle(_) => "setAngle",
            Action::SetPalette(_) => "setPalette",
            Action::SetImage(_) => "setImage",
            Action::SetSequence(_) => "setSequence",
            Action::ToggleEasterEgg => "toggleEasterEgg",
            Action::SetSaving(_) => "setSaving",
            Action::SetAdvertShowing(_) => "setAdvertShowing",
            Action::MarkNoticeShown => "markNoticeShown",
        }
    }
}

/// Snapshot of the parameters the painter reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    pub quality: u8,
    pub padding: f32,
    pub angle: f32,
    pub palette: Palette,
}

/// Proof that a load was requested; only the newest one may install its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

/// Main application state
pub struct AppState {
    dirty: bool,
    quality: u8,
    padding: f32,
    angle: f32,
    palette: Palette,
    source: Source,
    /// Bumped every time a new source is installed
    source_generation: u64,
    /// Bumped on every load request and every source change
    load_generation: u64,
    saving: bool,
    easter_egg: bool,
    advert_open: bool,
    shown_advert: bool,
    notices: Box<dyn NoticeStore>,
}

impl AppState {
    /// Create the state with default parameters
    pub fn new(notices: Box<dyn NoticeStore>) -> Self {
        Self::build(&Config::default(), notices)
    }

    /// Create the state from validated configuration
    pub fn from_config(config: &Config, notices: Box<dyn NoticeStore>) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        Ok(Self::build(config, notices))
    }

    fn build(config: &Config, notices: Box<dyn NoticeStore>) -> Self {
        let shown_advert = notices.load(SHOWN_ADVERT_KEY).unwrap_or_else(|e| {
            warn!("Could not read notice flag, assuming unseen: {:#}", e);
            false
        });

        Self {
            // The first tick always paints
            dirty: true,
            quality: config.quality,
            padding: config.padding,
            angle: snap_angle(config.angle),
            palette: config.palette,
            source: Source::None,
            source_generation: 0,
            load_generation: 0,
            saving: false,
            easter_egg: false,
            advert_open: false,
            shown_advert,
            notices,
        }
    }

    /// Apply one transition.
    ///
    /// Only `MarkNoticeShown` can fail; when it does nothing is changed.
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        debug!("Action: {}", action.name());

        match action {
            Action::MarkClean => self.dirty = false,
            Action::SetQuality(quality) => {
                self.quality = quality;
                self.dirty = true;
            }
            Action::SetPadding(padding) => {
                self.padding = padding;
                self.dirty = true;
            }
            Action::SetAngle(angle) => {
                self.angle = snap_angle(angle);
                self.dirty = true;
            }
            Action::SetPalette(palette) => {
                self.palette = palette;
                self.dirty = true;
            }
            Action::SetImage(still) => self.replace_source(Source::Still(still)),
            Action::SetSequence(sequence) => self.replace_source(Source::Animated(sequence)),
            Action::ToggleEasterEgg => self.easter_egg = !self.easter_egg,
            Action::SetSaving(saving) => self.saving = saving,
            Action::SetAdvertShowing(open) => self.advert_open = open,
            Action::MarkNoticeShown => {
                self.notices
                    .store(SHOWN_ADVERT_KEY)
                    .context("Failed to persist notice flag")?;
                self.shown_advert = true;
            }
        }

        Ok(())
    }

    /// Drop whatever source is held, then install the new one
    fn replace_source(&mut self, source: Source) {
        let previous = std::mem::take(&mut self.source);
        if !previous.is_none() {
            debug!("Releasing previous source ({} bytes)", previous.byte_len());
        }
        drop(previous);

        self.source = source;
        self.source_generation += 1;
        self.load_generation += 1;
        self.dirty = true;
    }

    /// Register a new load; any load registered earlier becomes stale
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_generation += 1;
        LoadTicket {
            generation: self.load_generation,
        }
    }

    /// Whether no newer load or source change happened since `ticket`
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.generation == self.load_generation
    }

    /// Install a decode result if its ticket is still current.
    ///
    /// Returns false, dropping the result, when the ticket is stale.
    pub fn complete_load(&mut self, ticket: LoadTicket, decoded: DecodedSource) -> bool {
        if !self.is_current(ticket) {
            warn!(
                "Discarding stale decode (ticket {}, current {})",
                ticket.generation, self.load_generation
            );
            return false;
        }

        match decoded {
            DecodedSource::Still(still) => self.replace_source(Source::Still(still)),
            DecodedSource::Animated(sequence) => self.replace_source(Source::Animated(sequence)),
        }
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn padding(&self) -> f32 {
        self.padding
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Identifies the installed source; changes whenever it is replaced
    pub fn source_generation(&self) -> u64 {
        self.source_generation
    }

    /// Frame delay in milliseconds, only while an animation is loaded
    pub fn delay(&self) -> Option<u32> {
        self.source.sequence().map(Sequence::delay_ms)
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn easter_egg(&self) -> bool {
        self.easter_egg
    }

    pub fn advert_open(&self) -> bool {
        self.advert_open
    }

    pub fn shown_advert(&self) -> bool {
        self.shown_advert
    }

    pub fn params(&self) -> RenderParams {
        RenderParams {
            quality: self.quality,
            padding: self.padding,
            angle: self.angle,
            palette: self.palette,
        }
    }
}

fn snap_angle(angle: f32) -> f32 {
    if angle.abs() < ANGLE_SNAP {
        0.0
    } else {
        angle
    }
}
