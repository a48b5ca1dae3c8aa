// Image loading module
// Gates incoming files by type, decodes them and installs the result

use crate::app::{AppState, LoadTicket};
use crate::decoder::{decode, DecodeError, DecodedSource, GIF_MIME};
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Declared types must start with this to reach the decoder
pub const IMAGE_TYPE_PREFIX: &str = "image/";

/// Reasons a file is refused
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// What happened to a load that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The new source is installed and a redraw is owed
    Installed,
    /// The file held no frames; nothing changed
    Ignored,
    /// A newer load or source change won; the result was dropped
    Stale,
}

/// Whether a declared type is accepted at all
pub fn is_supported(declared_type: &str) -> bool {
    declared_type.starts_with(IMAGE_TYPE_PREFIX)
}

/// Decode `bytes` and install the result in one step
pub fn load_image(
    state: &mut AppState,
    bytes: &[u8],
    declared_type: &str,
) -> Result<LoadOutcome, LoadError> {
    if !is_supported(declared_type) {
        warn!("Rejected file of type {:?}", declared_type);
        return Err(LoadError::Unsupported(declared_type.to_string()));
    }

    let decoded = match decode(bytes, declared_type) {
        Ok(decoded) => decoded,
        Err(DecodeError::Empty) => {
            info!("Ignoring animation without frames");
            return Ok(LoadOutcome::Ignored);
        }
        Err(e) => return Err(e.into()),
    };

    let ticket = state.begin_load();
    Ok(install(state, ticket, decoded))
}

/// Install the result of a decode started with [`AppState::begin_load`].
///
/// Used when decoding happens away from the state, so newer loads may
/// have been requested in the meantime.
pub fn finish_load(
    state: &mut AppState,
    ticket: LoadTicket,
    result: Result<DecodedSource, DecodeError>,
) -> Result<LoadOutcome, LoadError> {
    match result {
        Ok(decoded) => Ok(install(state, ticket, decoded)),
        Err(DecodeError::Empty) => {
            info!("Ignoring animation without frames");
            Ok(LoadOutcome::Ignored)
        }
        Err(e) => Err(e.into()),
    }
}

fn install(state: &mut AppState, ticket: LoadTicket, decoded: DecodedSource) -> LoadOutcome {
    let kind = match &decoded {
        DecodedSource::Still(_) => "still image".to_string(),
        DecodedSource::Animated(sequence) => format!("{}-frame animation", sequence.len()),
    };

    if state.complete_load(ticket, decoded) {
        info!("Loaded {}", kind);
        LoadOutcome::Installed
    } else {
        LoadOutcome::Stale
    }
}

/// Read a file from disk and load it, taking its type from the extension
pub fn load_file(state: &mut AppState, path: &Path) -> Result<LoadOutcome> {
    let declared_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_from_extension)
        .unwrap_or("application/octet-stream");

    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read image file: {}", path.display()))?;

    load_image(state, &bytes, declared_type)
        .with_context(|| format!("Failed to load image file: {}", path.display()))
}

/// Get the declared type for a file extension
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some(GIF_MIME),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "ico" => Some("image/x-icon"),
        "tiff" | "tif" => Some("image/tiff"),
        _ => None,
    }
}
