// Decoder module
// Turns raw image bytes into a still image or a sequence of composited frames

use image::{imageops, Rgba, RgbaImage};
use log::{debug, info};
use std::io::Cursor;
use thiserror::Error;

/// Declared type of the only animated container the decoder unpacks
pub const GIF_MIME: &str = "image/gif";

/// Delay used when an animation declares a zero delay for its first frame
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Upper bound on the composited output (every frame plus the working canvas)
pub const MAX_DECODED_BYTES: u64 = 1 << 30;

const GIF_TRAILER: u8 = 0x3b;
const GIF_EXTENSION: u8 = 0x21;

/// Reasons a decode can fail
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The container parsed cleanly but holds no frames
    #[error("animation contains no frames")]
    Empty,
    /// Bad header, truncated data or a patch outside the logical screen
    #[error("malformed animation: {0}")]
    Malformed(String),
}

/// Reasons a sequence cannot be assembled
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("a sequence needs at least two frames, got {0}")]
    TooShort(usize),
    #[error("frame {index} is {actual:?}, expected {expected:?}")]
    MismatchedFrame {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// One fully composited animation frame (RGBA, logical-screen sized)
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: RgbaImage,
}

impl Frame {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Raw RGBA pixels
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Size of the pixel buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

/// Ordered animation frames sharing one inter-frame delay
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    frames: Vec<Frame>,
    delay_ms: u32,
}

impl Sequence {
    /// Build a sequence from at least two equally sized frames.
    ///
    /// A zero delay is replaced by [`DEFAULT_FRAME_DELAY_MS`] so playback
    /// always advances.
    pub fn new(frames: Vec<Frame>, delay_ms: u32) -> Result<Self, SequenceError> {
        if frames.len() < 2 {
            return Err(SequenceError::TooShort(frames.len()));
        }

        let expected = frames[0].dimensions();
        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.dimensions() != expected)
        {
            return Err(SequenceError::MismatchedFrame {
                index,
                expected,
                actual: frame.dimensions(),
            });
        }

        let delay_ms = if delay_ms == 0 {
            DEFAULT_FRAME_DELAY_MS
        } else {
            delay_ms
        };

        Ok(Self { frames, delay_ms })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Never true for a constructed sequence
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Milliseconds each frame stays on screen
    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frames[0].dimensions()
    }

    /// Index of the frame visible `elapsed_ms` after playback started
    pub fn frame_index_at(&self, elapsed_ms: f64) -> usize {
        let ticks = (elapsed_ms.max(0.0) / self.delay_ms as f64).floor() as u64;
        (ticks % self.frames.len() as u64) as usize
    }

    /// Frame visible `elapsed_ms` after playback started
    pub fn frame_at(&self, elapsed_ms: f64) -> &Frame {
        &self.frames[self.frame_index_at(elapsed_ms)]
    }

    /// Total bytes held by all frames
    pub fn byte_len(&self) -> usize {
        self.frames.iter().map(Frame::byte_len).sum()
    }
}

/// A single picture to draw
#[derive(Debug, Clone, PartialEq)]
pub enum StillImage {
    /// Untouched bytes of a non-animated file; rasterized when painted
    Encoded { bytes: Vec<u8>, mime: String },
    /// The only frame of a one-frame animation
    Decoded(Frame),
}

impl StillImage {
    /// Size of the held buffer in bytes
    pub fn byte_len(&self) -> usize {
        match self {
            StillImage::Encoded { bytes, .. } => bytes.len(),
            StillImage::Decoded(frame) => frame.byte_len(),
        }
    }

    /// Rasterize to RGBA, auto-detecting the format of encoded bytes
    pub fn to_rgba(&self) -> image::ImageResult<RgbaImage> {
        match self {
            StillImage::Encoded { bytes, .. } => {
                let format = image::guess_format(bytes)?;
                let img = image::load(Cursor::new(bytes), format)?;
                Ok(img.to_rgba8())
            }
            StillImage::Decoded(frame) => Ok(frame.pixels().clone()),
        }
    }
}

/// Successful decode result
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedSource {
    Still(StillImage),
    Animated(Sequence),
}

/// How a patch is cleaned up before the next frame is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposal {
    Keep,
    Background,
    Previous,
}

impl From<gif::DisposalMethod> for Disposal {
    fn from(method: gif::DisposalMethod) -> Self {
        match method {
            gif::DisposalMethod::Background => Disposal::Background,
            gif::DisposalMethod::Previous => Disposal::Previous,
            gif::DisposalMethod::Any | gif::DisposalMethod::Keep => Disposal::Keep,
        }
    }
}

/// One logical frame as stored in the container
#[derive(Debug)]
struct Patch {
    left: u32,
    top: u32,
    pixels: RgbaImage,
    delay_ms: u32,
    disposal: Disposal,
}

impl Patch {
    fn from_gif(index: usize, frame: &gif::Frame<'_>) -> Result<Self, DecodeError> {
        let (width, height) = (frame.width as u32, frame.height as u32);
        let pixels = RgbaImage::from_raw(width, height, frame.buffer.to_vec()).ok_or_else(|| {
            DecodeError::Malformed(format!(
                "frame {index}: buffer of {} bytes does not fill {width}x{height}",
                frame.buffer.len()
            ))
        })?;

        Ok(Self {
            left: frame.left as u32,
            top: frame.top as u32,
            pixels,
            // GIF delays are in hundredths of a second
            delay_ms: frame.delay as u32 * 10,
            disposal: frame.dispose.into(),
        })
    }

    fn fits(&self, width: u32, height: u32) -> bool {
        self.left + self.pixels.width() <= width && self.top + self.pixels.height() <= height
    }

    /// Replace (not blend) the canvas pixels under this patch.
    ///
    /// Transparent patch pixels overwrite the canvas too, so GIFs optimized
    /// with transparent "unchanged" regions show holes in those frames.
    fn apply(&self, canvas: &mut RgbaImage) {
        imageops::replace(canvas, &self.pixels, self.left as i64, self.top as i64);
    }

    fn clear(&self, canvas: &mut RgbaImage) {
        for y in self.top..self.top + self.pixels.height() {
            for x in self.left..self.left + self.pixels.width() {
                canvas.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
    }
}

/// Decode a byte buffer according to its declared type.
///
/// Only [`GIF_MIME`] is unpacked; every other type is wrapped as an
/// encoded still image without touching the pixels.
pub fn decode(bytes: &[u8], declared_type: &str) -> Result<DecodedSource, DecodeError> {
    if declared_type != GIF_MIME {
        debug!("Wrapping {} bytes of {} as a still image", bytes.len(), declared_type);
        return Ok(DecodedSource::Still(StillImage::Encoded {
            bytes: bytes.to_vec(),
            mime: declared_type.to_string(),
        }));
    }

    let (width, height, patches) = read_patches(bytes)?;
    let mut frames = composite(width, height, &patches)?;

    match frames.len() {
        0 => Err(DecodeError::Empty),
        1 => {
            debug!("Single-frame animation treated as a still image");
            Ok(DecodedSource::Still(StillImage::Decoded(frames.remove(0))))
        }
        count => {
            let delay_ms = patches[0].delay_ms;
            info!(
                "Decoded animation: {} frames at {}x{}, {}ms per frame",
                count, width, height, delay_ms
            );
            let sequence = Sequence::new(frames, delay_ms)
                .map_err(|e| DecodeError::Malformed(e.to_string()))?;
            Ok(DecodedSource::Animated(sequence))
        }
    }
}

/// Parse the container into its logical-screen size and raw patches
fn read_patches(bytes: &[u8]) -> Result<(u32, u32, Vec<Patch>), DecodeError> {
    let malformed = |e: gif::DecodingError| DecodeError::Malformed(e.to_string());

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    // read_info scans ahead to the first image descriptor and reports a
    // frameless stream as an unexpected end of file
    let mut decoder = match options.read_info(Cursor::new(bytes)) {
        Ok(decoder) => decoder,
        Err(_) if ends_before_first_frame(bytes) => return Err(DecodeError::Empty),
        Err(e) => return Err(malformed(e)),
    };

    let width = decoder.width() as u32;
    let height = decoder.height() as u32;

    let mut patches = Vec::new();
    while let Some(frame) = decoder.read_next_frame().map_err(malformed)? {
        patches.push(Patch::from_gif(patches.len(), frame)?);
    }

    Ok((width, height, patches))
}

/// Whether the stream is a complete GIF whose trailer comes before any image.
///
/// Walks the header, the global color table and any extension blocks.
fn ends_before_first_frame(bytes: &[u8]) -> bool {
    fn walk(bytes: &[u8]) -> Option<bool> {
        let signature = bytes.get(..6)?;
        if signature != b"GIF87a" && signature != b"GIF89a" {
            return Some(false);
        }

        let flags = *bytes.get(10)?;
        let mut pos = 13;
        if flags & 0x80 != 0 {
            pos += 3 * (2usize << (flags & 0x07));
        }

        loop {
            match *bytes.get(pos)? {
                GIF_TRAILER => return Some(true),
                GIF_EXTENSION => {
                    pos += 2;
                    loop {
                        let len = *bytes.get(pos)? as usize;
                        pos += 1 + len;
                        if len == 0 {
                            break;
                        }
                    }
                }
                _ => return Some(false),
            }
        }
    }

    walk(bytes).unwrap_or(false)
}

/// Fold the patches over one accumulator canvas, snapshotting it after each
fn composite(width: u32, height: u32, patches: &[Patch]) -> Result<Vec<Frame>, DecodeError> {
    let canvas_bytes = width as u64 * height as u64 * 4;
    let total = canvas_bytes.saturating_mul(patches.len() as u64 + 1);
    if total > MAX_DECODED_BYTES {
        return Err(DecodeError::Malformed(format!(
            "{} frames at {width}x{height} need {total} bytes, limit is {MAX_DECODED_BYTES}",
            patches.len()
        )));
    }

    let mut canvas = RgbaImage::new(width, height);
    let mut frames = Vec::with_capacity(patches.len());

    for (index, patch) in patches.iter().enumerate() {
        if !patch.fits(width, height) {
            return Err(DecodeError::Malformed(format!(
                "frame {index}: {}x{} patch at ({}, {}) exceeds the {width}x{height} screen",
                patch.pixels.width(),
                patch.pixels.height(),
                patch.left,
                patch.top
            )));
        }

        let before = (patch.disposal == Disposal::Previous).then(|| canvas.clone());
        patch.apply(&mut canvas);
        frames.push(Frame::new(canvas.clone()));

        match patch.disposal {
            Disposal::Keep => {}
            Disposal::Background => patch.clear(&mut canvas),
            Disposal::Previous => {
                if let Some(before) = before {
                    canvas = before;
                }
            }
        }
    }

    Ok(frames)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A patch for the test encoder: position, size, fill color, delay (cs)
    pub(crate) struct TestPatch {
        pub left: u16,
        pub top: u16,
        pub width: u16,
        pub height: u16,
        pub color: [u8; 3],
        pub delay: u16,
        pub dispose: gif::DisposalMethod,
    }

    impl TestPatch {
        pub(crate) fn solid(left: u16, top: u16, width: u16, height: u16, color: [u8; 3]) -> Self {
            Self {
                left,
                top,
                width,
                height,
                color,
                delay: 5,
                dispose: gif::DisposalMethod::Keep,
            }
        }
    }

    /// Encode a GIF with the given logical screen and patches
    pub(crate) fn encode_gif(width: u16, height: u16, patches: &[TestPatch]) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut bytes, width, height, &[]).unwrap();
            for patch in patches {
                let mut rgba: Vec<u8> = (0..patch.width as usize * patch.height as usize)
                    .flat_map(|_| [patch.color[0], patch.color[1], patch.color[2], 0xff])
                    .collect();
                let mut frame = gif::Frame::from_rgba_speed(patch.width, patch.height, &mut rgba, 10);
                frame.left = patch.left;
                frame.top = patch.top;
                frame.delay = patch.delay;
                frame.dispose = patch.dispose;
                encoder.write_frame(&frame).unwrap();
            }
        }
        bytes
    }

    fn rgba(color: [u8; 3]) -> Rgba<u8> {
        Rgba([color[0], color[1], color[2], 0xff])
    }

    fn inside(patch: &TestPatch, x: u32, y: u32) -> bool {
        let (left, top) = (patch.left as u32, patch.top as u32);
        x >= left && x < left + patch.width as u32 && y >= top && y < top + patch.height as u32
    }

    fn expect_sequence(source: DecodedSource) -> Sequence {
        match source {
            DecodedSource::Animated(sequence) => sequence,
            other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn non_gif_is_wrapped_without_decoding() {
        let bytes = b"not really a png".to_vec();
        let decoded = decode(&bytes, "image/png").unwrap();
        assert_eq!(
            decoded,
            DecodedSource::Still(StillImage::Encoded {
                bytes,
                mime: "image/png".to_string()
            })
        );
    }

    #[test]
    fn each_frame_patches_only_its_rectangle() {
        let patches = [
            TestPatch::solid(0, 0, 8, 8, [10, 20, 30]),
            TestPatch::solid(1, 1, 3, 2, [200, 0, 0]),
            TestPatch::solid(2, 0, 4, 4, [0, 200, 0]),
            TestPatch::solid(6, 5, 2, 3, [0, 0, 200]),
        ];
        let bytes = encode_gif(8, 8, &patches);

        let sequence = expect_sequence(decode(&bytes, GIF_MIME).unwrap());
        assert_eq!(sequence.len(), patches.len());

        for (i, patch) in patches.iter().enumerate() {
            let frame = sequence.frames()[i].pixels();
            assert_eq!(frame.dimensions(), (8, 8));
            for (x, y, pixel) in frame.enumerate_pixels() {
                if inside(patch, x, y) {
                    assert_eq!(*pixel, rgba(patch.color), "frame {i} at ({x}, {y})");
                } else if i > 0 {
                    let previous = sequence.frames()[i - 1].pixels();
                    assert_eq!(pixel, previous.get_pixel(x, y), "frame {i} at ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn uses_first_frame_delay() {
        let mut first = TestPatch::solid(0, 0, 2, 2, [1, 2, 3]);
        first.delay = 7;
        let mut second = TestPatch::solid(0, 0, 2, 2, [4, 5, 6]);
        second.delay = 50;
        let bytes = encode_gif(2, 2, &[first, second]);

        let sequence = expect_sequence(decode(&bytes, GIF_MIME).unwrap());
        assert_eq!(sequence.delay_ms(), 70);
    }

    #[test]
    fn zero_delay_falls_back_to_default() {
        let mut first = TestPatch::solid(0, 0, 2, 2, [1, 2, 3]);
        first.delay = 0;
        let second = TestPatch::solid(0, 0, 2, 2, [4, 5, 6]);
        let bytes = encode_gif(2, 2, &[first, second]);

        let sequence = expect_sequence(decode(&bytes, GIF_MIME).unwrap());
        assert_eq!(sequence.delay_ms(), DEFAULT_FRAME_DELAY_MS);
    }

    #[test]
    fn background_disposal_clears_patch_for_next_frame() {
        let mut first = TestPatch::solid(0, 0, 4, 4, [9, 9, 9]);
        first.dispose = gif::DisposalMethod::Background;
        let second = TestPatch::solid(0, 0, 1, 1, [50, 60, 70]);
        let bytes = encode_gif(4, 4, &[first, second]);

        let sequence = expect_sequence(decode(&bytes, GIF_MIME).unwrap());
        let frame = sequence.frames()[1].pixels();
        assert_eq!(*frame.get_pixel(0, 0), rgba([50, 60, 70]));
        assert_eq!(*frame.get_pixel(3, 3), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn previous_disposal_restores_canvas() {
        let base = TestPatch::solid(0, 0, 4, 4, [9, 9, 9]);
        let mut flash = TestPatch::solid(0, 0, 2, 2, [255, 255, 0]);
        flash.dispose = gif::DisposalMethod::Previous;
        let tail = TestPatch::solid(3, 3, 1, 1, [1, 1, 1]);
        let bytes = encode_gif(4, 4, &[base, flash, tail]);

        let sequence = expect_sequence(decode(&bytes, GIF_MIME).unwrap());
        assert_eq!(*sequence.frames()[1].pixels().get_pixel(0, 0), rgba([255, 255, 0]));
        assert_eq!(*sequence.frames()[2].pixels().get_pixel(0, 0), rgba([9, 9, 9]));
    }

    #[test]
    fn zero_frames_is_empty() {
        let bytes = encode_gif(4, 4, &[]);
        assert_eq!(decode(&bytes, GIF_MIME), Err(DecodeError::Empty));
    }

    /// Header and logical screen descriptor for a 4x4 screen
    fn screen(flags: u8) -> Vec<u8> {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&[4, 0, 4, 0, flags, 0, 0]);
        bytes
    }

    #[test]
    fn trailer_only_stream_is_empty() {
        let mut bare = screen(0x00);
        bare.push(0x3b);
        assert_eq!(decode(&bare, GIF_MIME), Err(DecodeError::Empty));

        // Two-entry global color table
        let mut with_table = screen(0x80);
        with_table.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        with_table.push(0x3b);
        assert_eq!(decode(&with_table, GIF_MIME), Err(DecodeError::Empty));

        // Comment extension before the trailer
        let mut with_comment = screen(0x00);
        with_comment.extend_from_slice(&[0x21, 0xfe, 2, b'h', b'i', 0]);
        with_comment.push(0x3b);
        assert_eq!(decode(&with_comment, GIF_MIME), Err(DecodeError::Empty));
    }

    #[test]
    fn frameless_stream_without_trailer_is_malformed() {
        let mut missing_trailer = screen(0x80);
        missing_trailer.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        assert!(matches!(
            decode(&missing_trailer, GIF_MIME),
            Err(DecodeError::Malformed(_))
        ));

        // Color table flagged but cut short
        let mut short_table = screen(0x80);
        short_table.extend_from_slice(&[0, 0, 0x3b]);
        assert!(matches!(
            decode(&short_table, GIF_MIME),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_screen_is_rejected() {
        let patches = [
            TestPatch::solid(0, 0, 1, 1, [1, 1, 1]),
            TestPatch::solid(0, 0, 1, 1, [2, 2, 2]),
        ];
        let bytes = encode_gif(40000, 40000, &patches);
        assert!(matches!(decode(&bytes, GIF_MIME), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn transparent_patch_pixels_replace_the_canvas() {
        let mut bytes = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut bytes, 2, 1, &[]).unwrap();
            let mut opaque = vec![9, 9, 9, 255, 9, 9, 9, 255];
            encoder
                .write_frame(&gif::Frame::from_rgba_speed(2, 1, &mut opaque, 10))
                .unwrap();
            let mut holed = vec![200, 0, 0, 255, 0, 0, 0, 0];
            encoder
                .write_frame(&gif::Frame::from_rgba_speed(2, 1, &mut holed, 10))
                .unwrap();
        }

        let sequence = expect_sequence(decode(&bytes, GIF_MIME).unwrap());
        let frame = sequence.frames()[1].pixels();
        assert_eq!(*frame.get_pixel(0, 0), rgba([200, 0, 0]));
        assert_eq!(frame.get_pixel(1, 0)[3], 0);
    }

    #[test]
    fn single_frame_is_still_image() {
        let bytes = encode_gif(3, 3, &[TestPatch::solid(0, 0, 3, 3, [7, 8, 9])]);
        match decode(&bytes, GIF_MIME).unwrap() {
            DecodedSource::Still(StillImage::Decoded(frame)) => {
                assert_eq!(frame.dimensions(), (3, 3));
                assert_eq!(*frame.pixels().get_pixel(1, 1), rgba([7, 8, 9]));
            }
            other => panic!("expected a decoded still, got {other:?}"),
        }
    }

    #[test]
    fn patch_outside_screen_is_malformed() {
        let patches = [
            TestPatch::solid(0, 0, 4, 4, [1, 1, 1]),
            TestPatch::solid(2, 2, 4, 4, [2, 2, 2]),
        ];
        let bytes = encode_gif(4, 4, &patches);
        assert!(matches!(decode(&bytes, GIF_MIME), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn truncated_header_is_malformed() {
        let bytes = encode_gif(4, 4, &[TestPatch::solid(0, 0, 4, 4, [1, 1, 1])]);
        assert!(matches!(decode(&bytes[..8], GIF_MIME), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b"GIF", GIF_MIME), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn frame_selection_wraps_around() {
        let frames = vec![
            Frame::new(RgbaImage::new(1, 1)),
            Frame::new(RgbaImage::new(1, 1)),
            Frame::new(RgbaImage::new(1, 1)),
        ];
        let sequence = Sequence::new(frames, 100).unwrap();
        assert_eq!(sequence.frame_index_at(0.0), 0);
        assert_eq!(sequence.frame_index_at(99.9), 0);
        assert_eq!(sequence.frame_index_at(100.0), 1);
        assert_eq!(sequence.frame_index_at(250.0), 2);
        assert_eq!(sequence.frame_index_at(300.0), 0);
        assert_eq!(sequence.frame_index_at(-5.0), 0);
    }

    #[test]
    fn sequence_rejects_short_or_mismatched_frames() {
        let one = vec![Frame::new(RgbaImage::new(2, 2))];
        assert_eq!(Sequence::new(one, 10), Err(SequenceError::TooShort(1)));

        let mixed = vec![Frame::new(RgbaImage::new(2, 2)), Frame::new(RgbaImage::new(3, 2))];
        assert!(matches!(
            Sequence::new(mixed, 10),
            Err(SequenceError::MismatchedFrame { index: 1, .. })
        ));
    }
}
