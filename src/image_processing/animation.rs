//! Frame-at-a-time GIF decoding and encoding.
//!
//! [`GifFrames`] turns a GIF byte stream into a lazy sequence of fully
//! composited canvas frames, applying each frame's disposal before the next
//! one is drawn. [`GifSequenceWriter`] accepts transformed frames one by one,
//! so an animation never has to be held in memory as a whole.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Read, Write};

use image::{Rgba, RgbaImage};
use tracing::debug;

use super::composite::blend_over;
use super::format::OutputFormat;
use crate::error::{Result, SymmetryError};

/// Delay used when a frame does not specify one.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// GIF quantizer speed accepted by the encoder (1 = best, 30 = fastest).
pub const GIF_SPEED_RANGE: std::ops::RangeInclusive<i32> = 1..=30;

/// What happens to a frame's area before the next frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// Leave the frame in place
    Keep,
    /// Clear the frame's rectangle to transparent
    Background,
    /// Restore the canvas to its state before the frame was drawn
    Previous,
}

impl From<gif::DisposalMethod> for Disposal {
    fn from(method: gif::DisposalMethod) -> Self {
        match method {
            gif::DisposalMethod::Any | gif::DisposalMethod::Keep => Disposal::Keep,
            gif::DisposalMethod::Background => Disposal::Background,
            gif::DisposalMethod::Previous => Disposal::Previous,
        }
    }
}

impl From<Disposal> for gif::DisposalMethod {
    fn from(disposal: Disposal) -> Self {
        match disposal {
            Disposal::Keep => gif::DisposalMethod::Keep,
            Disposal::Background => gif::DisposalMethod::Background,
            Disposal::Previous => gif::DisposalMethod::Previous,
        }
    }
}

/// Per-frame timing metadata carried through the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub delay_ms: u32,
    pub disposal: Disposal,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_FRAME_DELAY_MS,
            disposal: Disposal::Keep,
        }
    }
}

impl FrameTiming {
    /// Build timing from a GIF delay in hundredths of a second.
    /// A zero delay means "unspecified" and becomes the default.
    pub fn from_centiseconds(delay: u16, disposal: Disposal) -> Self {
        let delay_ms = if delay == 0 {
            DEFAULT_FRAME_DELAY_MS
        } else {
            u32::from(delay) * 10
        };
        Self { delay_ms, disposal }
    }

    /// GIF delay in hundredths of a second, rounded, never zero.
    pub fn centiseconds(&self) -> u16 {
        ((self.delay_ms + 5) / 10).clamp(1, u32::from(u16::MAX)) as u16
    }
}

/// One composited frame of an animation.
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    pub index: usize,
    pub image: RgbaImage,
    pub timing: FrameTiming,
}

/// Disposal still owed by the previously drawn frame.
struct PendingDisposal {
    disposal: Disposal,
    rect: (u32, u32, u32, u32),
    snapshot: Option<RgbaImage>,
}

/// Lazy, finite, non-restartable sequence of composited GIF frames.
pub struct GifFrames<R: Read> {
    decoder: gif::Decoder<R>,
    canvas: RgbaImage,
    pending: Option<PendingDisposal>,
    index: usize,
    finished: bool,
}

impl<R: Read> GifFrames<R> {
    /// Read the GIF header and logical screen; no frame is decoded yet.
    pub fn new(reader: R) -> Result<Self> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let decoder = options.read_info(reader).map_err(SymmetryError::decode)?;

        let width = u32::from(decoder.width());
        let height = u32::from(decoder.height());
        if width == 0 || height == 0 {
            return Err(SymmetryError::Decode(format!(
                "GIF logical screen is {}x{}",
                width, height
            )));
        }

        Ok(Self {
            decoder,
            canvas: RgbaImage::new(width, height),
            pending: None,
            index: 0,
            finished: false,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn apply_pending_disposal(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match pending.disposal {
            Disposal::Keep => {}
            Disposal::Background => {
                let (left, top, width, height) = pending.rect;
                for y in top..(top + height).min(self.canvas.height()) {
                    for x in left..(left + width).min(self.canvas.width()) {
                        self.canvas.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                    }
                }
            }
            Disposal::Previous => {
                if let Some(snapshot) = pending.snapshot {
                    self.canvas = snapshot;
                }
            }
        }
    }

    fn next_frame(&mut self) -> Result<Option<AnimationFrame>> {
        self.apply_pending_disposal();

        let Some(frame) = self.decoder.read_next_frame().map_err(SymmetryError::decode)? else {
            return Ok(None);
        };

        let left = u32::from(frame.left);
        let top = u32::from(frame.top);
        let width = u32::from(frame.width);
        let height = u32::from(frame.height);
        let timing = FrameTiming::from_centiseconds(frame.delay, frame.dispose.into());

        let expected = (width * height * 4) as usize;
        if frame.buffer.len() < expected {
            return Err(SymmetryError::Decode(format!(
                "frame {} holds {} bytes, expected {}",
                self.index,
                frame.buffer.len(),
                expected
            )));
        }

        let snapshot = match timing.disposal {
            Disposal::Previous => Some(self.canvas.clone()),
            _ => None,
        };

        for (i, px) in frame.buffer[..expected].chunks_exact(4).enumerate() {
            let x = left + (i as u32 % width);
            let y = top + (i as u32 / width);
            if x < self.canvas.width() && y < self.canvas.height() {
                let src = Rgba([px[0], px[1], px[2], px[3]]);
                let blended = blend_over(self.canvas.get_pixel(x, y), &src);
                self.canvas.put_pixel(x, y, blended);
            }
        }

        self.pending = Some(PendingDisposal {
            disposal: timing.disposal,
            rect: (left, top, width, height),
            snapshot,
        });

        let index = self.index;
        self.index += 1;
        debug!(
            index,
            delay_ms = timing.delay_ms,
            disposal = ?timing.disposal,
            "Decoded animation frame"
        );

        Ok(Some(AnimationFrame {
            index,
            image: self.canvas.clone(),
            timing,
        }))
    }
}

impl<R: Read> Iterator for GifFrames<R> {
    type Item = Result<AnimationFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Incremental GIF writer for full-canvas frames.
pub struct GifSequenceWriter<W: Write> {
    encoder: gif::Encoder<W>,
    width: u16,
    height: u16,
    speed: i32,
    animated: bool,
}

impl<W: Write> GifSequenceWriter<W> {
    /// Start a GIF of the given size. Animated output loops forever.
    pub fn new(writer: W, width: u32, height: u32, speed: i32, animated: bool) -> Result<Self> {
        let too_large = |_| {
            SymmetryError::encode(
                OutputFormat::Gif,
                format!("{}x{} exceeds the 65535 pixel GIF limit", width, height),
            )
        };
        let gif_width = u16::try_from(width).map_err(too_large)?;
        let gif_height = u16::try_from(height).map_err(too_large)?;

        let mut encoder = gif::Encoder::new(writer, gif_width, gif_height, &[])
            .map_err(|e| SymmetryError::encode(OutputFormat::Gif, e))?;
        if animated {
            encoder
                .set_repeat(gif::Repeat::Infinite)
                .map_err(|e| SymmetryError::encode(OutputFormat::Gif, e))?;
        }

        Ok(Self {
            encoder,
            width: gif_width,
            height: gif_height,
            speed: speed.clamp(*GIF_SPEED_RANGE.start(), *GIF_SPEED_RANGE.end()),
            animated,
        })
    }

    /// Append one frame. Animated frames are disposed to background so each
    /// full-canvas frame replaces the previous one.
    pub fn write_frame(&mut self, image: &RgbaImage, timing: Option<FrameTiming>) -> Result<()> {
        if image.width() != u32::from(self.width) || image.height() != u32::from(self.height) {
            return Err(SymmetryError::encode(
                OutputFormat::Gif,
                format!(
                    "frame is {}x{} but the animation is {}x{}",
                    image.width(),
                    image.height(),
                    self.width,
                    self.height
                ),
            ));
        }

        let mut frame = match index_exact(image) {
            Some(indexed) => gif::Frame {
                width: self.width,
                height: self.height,
                buffer: Cow::Owned(indexed.indices),
                palette: Some(indexed.palette),
                transparent: indexed.transparent,
                ..gif::Frame::default()
            },
            None => {
                let mut pixels = image.as_raw().clone();
                gif::Frame::from_rgba_speed(self.width, self.height, &mut pixels, self.speed)
            }
        };

        match timing {
            Some(timing) if self.animated => {
                frame.delay = timing.centiseconds();
                frame.dispose = gif::DisposalMethod::Background;
            }
            _ => {
                frame.delay = 0;
                frame.dispose = gif::DisposalMethod::Keep;
            }
        }

        self.encoder
            .write_frame(&frame)
            .map_err(|e| SymmetryError::encode(OutputFormat::Gif, e))
    }

    /// Write the GIF trailer and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.encoder
            .into_inner()
            .map_err(|e| SymmetryError::encode(OutputFormat::Gif, e))
    }
}

struct IndexedFrame {
    palette: Vec<u8>,
    indices: Vec<u8>,
    transparent: Option<u8>,
}

/// Build an exact palette when the frame uses at most 256 distinct colors
/// (fully transparent pixels share one reserved entry).
fn index_exact(image: &RgbaImage) -> Option<IndexedFrame> {
    let has_transparent = image.pixels().any(|p| p.0[3] == 0);
    let mut palette: Vec<u8> = Vec::new();
    let mut lookup: HashMap<[u8; 3], u8> = HashMap::new();

    let transparent = if has_transparent {
        palette.extend_from_slice(&[0, 0, 0]);
        Some(0u8)
    } else {
        None
    };

    let mut indices = Vec::with_capacity((image.width() * image.height()) as usize);
    for pixel in image.pixels() {
        if pixel.0[3] == 0 {
            indices.push(0);
            continue;
        }
        let rgb = [pixel.0[0], pixel.0[1], pixel.0[2]];
        let index = match lookup.get(&rgb) {
            Some(&index) => index,
            None => {
                let next = palette.len() / 3;
                if next > 255 {
                    return None;
                }
                palette.extend_from_slice(&rgb);
                lookup.insert(rgb, next as u8);
                next as u8
            }
        };
        indices.push(index);
    }

    Some(IndexedFrame {
        palette,
        indices,
        transparent,
    })
}

/// Outcome of walking a GIF's block structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GifScan {
    pub frames: usize,
    /// The walk ended on the trailer block rather than on damaged or
    /// truncated data (or an early stop at the frame limit)
    pub reached_trailer: bool,
}

/// Walk GIF blocks and count image descriptors, without LZW decoding.
///
/// Stops early once `limit` frames have been seen. Malformed or truncated
/// data yields the number of frames found before the damage.
pub fn scan_gif(data: &[u8], limit: Option<usize>) -> GifScan {
    let mut scan = GifScan::default();
    if data.len() < 13 || (&data[0..6] != b"GIF89a" && &data[0..6] != b"GIF87a") {
        return scan;
    }

    let mut i = 13usize;

    // Global color table
    let flags = data[10];
    if flags & 0x80 != 0 {
        i = i.saturating_add(3 * (1 << ((flags & 0x07) + 1)));
    }

    while i < data.len() {
        match data[i] {
            0x21 => {
                // Extension: introducer, label, then data sub-blocks
                i = skip_sub_blocks(data, i + 2);
            }
            0x2C => {
                scan.frames += 1;
                if limit.is_some_and(|limit| scan.frames >= limit) {
                    return scan;
                }
                if i + 10 > data.len() {
                    break;
                }
                let local_flags = data[i + 9];
                i += 10;
                if local_flags & 0x80 != 0 {
                    i = i.saturating_add(3 * (1 << ((local_flags & 0x07) + 1)));
                }
                // LZW minimum code size, then image data sub-blocks
                i = skip_sub_blocks(data, i.saturating_add(1));
            }
            0x3B => {
                scan.reached_trailer = true;
                break;
            }
            _ => break,
        }
    }

    scan
}

/// Number of frames a GIF declares. See [`scan_gif`].
pub fn count_gif_frames(data: &[u8], limit: Option<usize>) -> usize {
    scan_gif(data, limit).frames
}

/// Skip a chain of data sub-blocks starting at `i`, returning the index
/// after the block terminator.
fn skip_sub_blocks(data: &[u8], mut i: usize) -> usize {
    while let Some(&size) = data.get(i) {
        if size == 0 {
            return i + 1;
        }
        i = i.saturating_add(1 + size as usize);
    }
    data.len()
}
