//! Container sniffing, color modes and output format negotiation.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, ImageFormat, Rgba, RgbaImage};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

use super::animation::{self, GifSequenceWriter};
use super::composite::{blend_over, flatten_onto, WHITE};
use super::metadata;
use super::ProcessingConfig;
use crate::error::{Result, SymmetryError};

/// Formats the engine can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    #[strum(to_string = "png")]
    Png,
    #[strum(to_string = "jpeg", serialize = "jpg")]
    Jpeg,
    #[strum(to_string = "webp")]
    WebP,
    #[strum(to_string = "gif")]
    Gif,
}

impl OutputFormat {
    /// Parse a caller supplied format hint such as `"png"` or `"JPG"`.
    pub fn parse_hint(hint: &str) -> Result<Self> {
        hint.trim()
            .trim_start_matches('.')
            .parse()
            .map_err(|_| SymmetryError::UnsupportedFormat(hint.to_string()))
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(OutputFormat::Png),
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::WebP => Some(OutputFormat::WebP),
            ImageFormat::Gif => Some(OutputFormat::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn supports_alpha(self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }

    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg)
    }

    /// Whether this container can hold a timed multi-frame sequence.
    pub fn supports_animation(self) -> bool {
        matches!(self, OutputFormat::Gif)
    }

    /// Whether an EXIF block can be embedded on encode.
    pub fn carries_exif(self) -> bool {
        matches!(self, OutputFormat::Png | OutputFormat::Jpeg)
    }
}

/// Bit depth of a color mode's channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDepth {
    Eight,
    Sixteen,
    Float,
}

/// Closed set of pixel layouts the transform understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Gray8,
    GrayAlpha8,
    Rgb8,
    Rgba8,
    Gray16,
    GrayAlpha16,
    Rgb16,
    Rgba16,
    Rgb32F,
    Rgba32F,
    /// Palette stored without transparency; decoded as 8-bit RGB
    Indexed,
}

impl ColorMode {
    /// Color mode of a decoded image.
    pub fn of(image: &DynamicImage) -> Result<Self> {
        let mode = match image {
            DynamicImage::ImageLuma8(_) => ColorMode::Gray8,
            DynamicImage::ImageLumaA8(_) => ColorMode::GrayAlpha8,
            DynamicImage::ImageRgb8(_) => ColorMode::Rgb8,
            DynamicImage::ImageRgba8(_) => ColorMode::Rgba8,
            DynamicImage::ImageLuma16(_) => ColorMode::Gray16,
            DynamicImage::ImageLumaA16(_) => ColorMode::GrayAlpha16,
            DynamicImage::ImageRgb16(_) => ColorMode::Rgb16,
            DynamicImage::ImageRgba16(_) => ColorMode::Rgba16,
            DynamicImage::ImageRgb32F(_) => ColorMode::Rgb32F,
            DynamicImage::ImageRgba32F(_) => ColorMode::Rgba32F,
            other => {
                return Err(SymmetryError::UnsupportedMode(format!(
                    "{:?}",
                    other.color()
                )))
            }
        };
        Ok(mode)
    }

    /// Mode of a decoded still, taking the container's palette flag into account.
    pub fn detect(image: &DynamicImage, info: &InputInfo) -> Result<Self> {
        let mode = Self::of(image)?;
        if info.indexed && mode == ColorMode::Rgb8 {
            Ok(ColorMode::Indexed)
        } else {
            Ok(mode)
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            ColorMode::GrayAlpha8
                | ColorMode::Rgba8
                | ColorMode::GrayAlpha16
                | ColorMode::Rgba16
                | ColorMode::Rgba32F
        )
    }

    pub fn depth(self) -> ChannelDepth {
        match self {
            ColorMode::Gray8
            | ColorMode::GrayAlpha8
            | ColorMode::Rgb8
            | ColorMode::Rgba8
            | ColorMode::Indexed => ChannelDepth::Eight,
            ColorMode::Gray16 | ColorMode::GrayAlpha16 | ColorMode::Rgb16 | ColorMode::Rgba16 => {
                ChannelDepth::Sixteen
            }
            ColorMode::Rgb32F | ColorMode::Rgba32F => ChannelDepth::Float,
        }
    }
}

/// What the container headers say about an input, gathered without
/// decoding any pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputInfo {
    pub format: ImageFormat,
    /// Number of frames the container declares (1 for single-image formats)
    pub frame_count: usize,
    /// Palette-based storage without a transparency entry
    pub indexed: bool,
}

impl InputInfo {
    /// True when the input must be processed as an animated sequence.
    ///
    /// Requires more than one frame and an animation-capable container,
    /// judged by the hint when one is given, else by the detected format.
    pub fn is_animated(&self, hint: Option<OutputFormat>) -> bool {
        let container = hint.or_else(|| OutputFormat::from_image_format(self.format));
        self.frame_count > 1 && container.is_some_and(OutputFormat::supports_animation)
    }
}

/// Sniff the container format, frame count and palette flag.
pub fn detect_input(bytes: &[u8]) -> Result<InputInfo> {
    let format = image::guess_format(bytes).map_err(SymmetryError::decode)?;

    let (frame_count, indexed) = match format {
        ImageFormat::Gif => (animation::count_gif_frames(bytes, None), false),
        ImageFormat::Png => (1, png_is_opaque_palette(bytes)),
        _ => (1, false),
    };

    debug!(?format, frame_count, indexed, "Detected input container");
    Ok(InputInfo {
        format,
        frame_count,
        indexed,
    })
}

/// True for a PNG whose IHDR declares a palette (color type 3) and which
/// carries no tRNS chunk before its image data.
fn png_is_opaque_palette(bytes: &[u8]) -> bool {
    const SIGNATURE_LEN: usize = 8;
    // Signature, IHDR length + type, then 9 bytes into the IHDR payload
    const COLOR_TYPE_OFFSET: usize = SIGNATURE_LEN + 8 + 9;

    if bytes.get(COLOR_TYPE_OFFSET) != Some(&3) {
        return false;
    }

    let mut offset = SIGNATURE_LEN;
    while let Some(header) = bytes.get(offset..offset + 8) {
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        match &header[4..8] {
            b"tRNS" => return false,
            b"IDAT" | b"IEND" => return true,
            _ => {}
        }
        // length + type + data + crc
        offset = match offset.checked_add(12 + length) {
            Some(next) => next,
            None => return false,
        };
    }
    true
}

/// The negotiated encoding for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChoice {
    pub format: OutputFormat,
    pub animated: bool,
    /// Transparency must be composited onto white before encoding
    pub flatten_alpha: bool,
    pub carry_exif: bool,
}

/// Decide how the transformed image will be encoded.
///
/// Animated inputs keep their animated container; stills default to PNG
/// unless the hint asks for something else.
pub fn decide_output_format(
    input: &InputInfo,
    animated: bool,
    hint: Option<OutputFormat>,
) -> FormatChoice {
    let format = if animated {
        OutputFormat::from_image_format(input.format)
            .filter(|f| f.supports_animation())
            .unwrap_or(OutputFormat::Gif)
    } else {
        hint.unwrap_or(OutputFormat::Png)
    };

    FormatChoice {
        format,
        animated,
        flatten_alpha: !format.supports_alpha(),
        carry_exif: !animated && format.carries_exif(),
    }
}

/// Convert a transformed still into a layout the target encoder accepts.
pub fn adapt_for_target(image: DynamicImage, format: OutputFormat) -> DynamicImage {
    let color = image.color();
    match format {
        OutputFormat::Png => match image {
            DynamicImage::ImageRgb32F(_) => DynamicImage::ImageRgb16(image.to_rgb16()),
            DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgba16(image.to_rgba16()),
            other => other,
        },
        OutputFormat::Jpeg => {
            let grayscale = matches!(
                color,
                ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
            );
            let opaque = if color.has_alpha() {
                DynamicImage::ImageRgba8(flatten_onto(&image.to_rgba8(), WHITE))
            } else {
                image
            };
            if grayscale {
                DynamicImage::ImageLuma8(opaque.to_luma8())
            } else {
                DynamicImage::ImageRgb8(opaque.to_rgb8())
            }
        }
        OutputFormat::Gif if color.has_alpha() => {
            DynamicImage::ImageRgba8(binarize_alpha(&image.to_rgba8()))
        }
        OutputFormat::WebP | OutputFormat::Gif => {
            if color.has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            }
        }
    }
}

/// Alpha at or above this value is treated as opaque in GIF output.
const GIF_ALPHA_THRESHOLD: u8 = 128;

/// Reduce partial transparency to the on/off transparency GIF can store.
/// Mostly transparent pixels are cleared, the rest are composited onto
/// white so their color is not lost.
fn binarize_alpha(image: &RgbaImage) -> RgbaImage {
    let white = Rgba([255, 255, 255, 255]);
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        match pixel.0[3] {
            255 => *pixel,
            alpha if alpha < GIF_ALPHA_THRESHOLD => Rgba([0, 0, 0, 0]),
            _ => blend_over(&white, pixel),
        }
    })
}

/// An encoded still and whether the EXIF block made it into the output.
#[derive(Debug)]
pub struct EncodedStill {
    pub bytes: Vec<u8>,
    pub exif_preserved: bool,
}

/// Encode a transformed still according to the negotiated choice.
pub fn encode_still(
    image: DynamicImage,
    choice: &FormatChoice,
    config: &ProcessingConfig,
    exif: Option<&[u8]>,
) -> Result<EncodedStill> {
    let format = choice.format;
    let image = adapt_for_target(image, format);
    debug!(%format, color = ?image.color(), "Encoding still");

    let mut bytes = Vec::new();
    match format {
        OutputFormat::Png => image
            .write_with_encoder(PngEncoder::new(&mut bytes))
            .map_err(|e| SymmetryError::encode(format, e))?,
        OutputFormat::Jpeg => image
            .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, config.jpeg_quality))
            .map_err(|e| SymmetryError::encode(format, e))?,
        OutputFormat::WebP => image
            .write_with_encoder(WebPEncoder::new_lossless(&mut bytes))
            .map_err(|e| SymmetryError::encode(format, e))?,
        OutputFormat::Gif => {
            let rgba = image.to_rgba8();
            let mut writer =
                GifSequenceWriter::new(&mut bytes, rgba.width(), rgba.height(), config.gif_speed, false)?;
            writer.write_frame(&rgba, None)?;
            writer.finish()?;
        }
    }

    match exif {
        Some(exif) if choice.carry_exif => {
            let (bytes, exif_preserved) = metadata::embed_exif(format, bytes, exif)?;
            Ok(EncodedStill {
                bytes,
                exif_preserved,
            })
        }
        _ => Ok(EncodedStill {
            bytes,
            exif_preserved: false,
        }),
    }
}
