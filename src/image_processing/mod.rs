pub mod animation;
pub mod composite;
pub mod direction;
pub mod format;
pub mod metadata;
pub mod mirror;
pub mod orientation;

use std::io::Cursor;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::debug;

use crate::error::{Result, SymmetryError};
use animation::{GifFrames, GifSequenceWriter, GIF_SPEED_RANGE};
use direction::Direction;
use format::{decide_output_format, detect_input, encode_still, ColorMode, FormatChoice, InputInfo, OutputFormat};
use orientation::ExifOrientation;

/// Encoder and metadata settings shared by every request an engine serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingConfig {
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// GIF quantizer speed, 1 (best) to 30 (fastest)
    pub gif_speed: i32,
    /// Apply the EXIF orientation before mirroring
    pub auto_orient: bool,
    /// Carry the input's EXIF block into PNG and JPEG outputs
    pub preserve_exif: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            gif_speed: 10,
            auto_orient: false,
            preserve_exif: true,
        }
    }
}

impl ProcessingConfig {
    /// Clamp every setting into the range its encoder accepts.
    pub fn normalized(self) -> Self {
        Self {
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
            gif_speed: self.gif_speed.clamp(*GIF_SPEED_RANGE.start(), *GIF_SPEED_RANGE.end()),
            ..self
        }
    }
}

/// One mirror request: the encoded input, the half to keep and an optional
/// output format hint.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub bytes: Vec<u8>,
    pub direction: Direction,
    pub format_hint: Option<OutputFormat>,
}

impl TransformRequest {
    pub fn new(bytes: Vec<u8>, direction: Direction) -> Self {
        Self {
            bytes,
            direction,
            format_hint: None,
        }
    }

    pub fn with_format_hint(mut self, hint: OutputFormat) -> Self {
        self.format_hint = Some(hint);
        self
    }

    /// Parse a textual hint such as "jpg" or "webp".
    pub fn with_format_hint_str(self, hint: &str) -> Result<Self> {
        Ok(self.with_format_hint(OutputFormat::parse_hint(hint)?))
    }
}

/// Reported after each frame has been transformed and handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    pub index: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct ProcessingResult {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    pub animated: bool,
    pub exif_preserved: bool,
    pub processing_time: Duration,
}

/// Stateless mirror engine. Safe to share between threads.
pub struct SymmetryEngine {
    config: ProcessingConfig,
}

impl SymmetryEngine {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Mirror an encoded image and return the re-encoded result.
    pub fn process(&self, request: &TransformRequest) -> Result<ProcessingResult> {
        self.process_with_progress(request, |_| {})
    }

    /// Like [`SymmetryEngine::process`], calling `progress` once per
    /// transformed frame.
    pub fn process_with_progress<F>(&self, request: &TransformRequest, mut progress: F) -> Result<ProcessingResult>
    where
        F: FnMut(FrameProgress),
    {
        let start_time = Instant::now();
        let info = detect_input(&request.bytes)?;
        if info.format == image::ImageFormat::Gif
            && info.frame_count == 0
            && animation::scan_gif(&request.bytes, None).reached_trailer
        {
            // A complete GIF that never declares an image
            return Err(SymmetryError::EmptyImage);
        }
        let animated = info.is_animated(request.format_hint);
        let choice = decide_output_format(&info, animated, request.format_hint);

        debug!(
            direction = %request.direction,
            input = ?info.format,
            output = %choice.format,
            animated,
            "Processing request"
        );

        let mut result = if animated {
            self.process_animation(request, &info, &choice, &mut progress)?
        } else {
            self.process_still(request, &info, &choice, &mut progress)?
        };
        result.processing_time = start_time.elapsed();
        Ok(result)
    }

    fn process_still<F>(
        &self,
        request: &TransformRequest,
        info: &InputInfo,
        choice: &FormatChoice,
        progress: &mut F,
    ) -> Result<ProcessingResult>
    where
        F: FnMut(FrameProgress),
    {
        let (mut image, mode) = decode_still(&request.bytes, info)?;

        let wants_exif = self.config.preserve_exif || self.config.auto_orient;
        let mut exif = if wants_exif {
            metadata::extract_exif(&request.bytes)
        } else {
            None
        };

        if self.config.auto_orient {
            if let Some(block) = exif.as_mut() {
                let orientation = orientation::read_orientation(block);
                if orientation.needs_transform() {
                    debug!(orientation = orientation.description(), "Applying EXIF orientation");
                    image = orientation::apply_rotation(image, orientation);
                    orientation::reset_orientation_tag(block);
                }
            }
        }

        let mirrored = mirror::mirror_frame_as(&image, mode, request.direction);
        let (width, height) = (mirrored.width(), mirrored.height());

        let carried = if self.config.preserve_exif {
            exif.as_deref()
        } else {
            None
        };
        let encoded = encode_still(mirrored, choice, &self.config, carried)?;
        progress(FrameProgress { index: 0, total: 1 });

        Ok(ProcessingResult {
            bytes: encoded.bytes,
            format: choice.format,
            width,
            height,
            frame_count: 1,
            animated: false,
            exif_preserved: encoded.exif_preserved,
            processing_time: Duration::ZERO,
        })
    }

    fn process_animation<F>(
        &self,
        request: &TransformRequest,
        info: &InputInfo,
        choice: &FormatChoice,
        progress: &mut F,
    ) -> Result<ProcessingResult>
    where
        F: FnMut(FrameProgress),
    {
        let frames = GifFrames::new(Cursor::new(request.bytes.as_slice()))?;
        let (width, height) = frames.dimensions();

        let mut bytes = Vec::new();
        let mut writer = GifSequenceWriter::new(&mut bytes, width, height, self.config.gif_speed, true)?;

        let mut written = 0usize;
        for frame in frames {
            let frame = frame?;
            let mirrored = mirror::mirror_buffer(&frame.image, request.direction);
            writer.write_frame(&mirrored, Some(frame.timing))?;
            written += 1;
            progress(FrameProgress {
                index: frame.index,
                total: info.frame_count.max(written),
            });
        }

        if written == 0 {
            return Err(SymmetryError::EmptyImage);
        }
        writer.finish()?;

        debug!(frames = written, bytes = bytes.len(), "Encoded animation");
        Ok(ProcessingResult {
            bytes,
            format: choice.format,
            width,
            height,
            frame_count: written,
            animated: true,
            exif_preserved: false,
            processing_time: Duration::ZERO,
        })
    }
}

/// Decode a single image, taking only the first frame of multi-frame GIFs.
fn decode_still(bytes: &[u8], info: &InputInfo) -> Result<(DynamicImage, ColorMode)> {
    if info.format == image::ImageFormat::Gif {
        let first = GifFrames::new(Cursor::new(bytes))?
            .next()
            .ok_or(SymmetryError::EmptyImage)??;
        return Ok((DynamicImage::ImageRgba8(first.image), ColorMode::Rgba8));
    }

    let image = image::load_from_memory_with_format(bytes, info.format).map_err(SymmetryError::decode)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(SymmetryError::EmptyImage);
    }
    let mode = ColorMode::detect(&image, info)?;
    Ok((image, mode))
}

/// True when the EXIF orientation of `bytes` asks for a pixel transform.
pub fn needs_orientation(bytes: &[u8]) -> bool {
    metadata::extract_exif(bytes)
        .map(|exif| orientation::read_orientation(&exif))
        .is_some_and(|o: ExifOrientation| o.needs_transform())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::animation::tests::build_gif;
    use crate::image_processing::metadata::tests::orientation_exif;
    use image::codecs::png::PngEncoder;
    use image::{ColorType, Rgba, RgbaImage};

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image.clone())
            .write_with_encoder(PngEncoder::new(&mut bytes))
            .unwrap();
        bytes
    }

    fn asymmetric(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([(x * 40) as u8, (y * 40) as u8, 7, 255]))
    }

    fn engine() -> SymmetryEngine {
        SymmetryEngine::new(ProcessingConfig::default())
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).unwrap()
    }

    #[test]
    fn test_left_and_right_differ() {
        let input = png_bytes(&asymmetric(6, 3));
        let left = engine().process(&TransformRequest::new(input.clone(), Direction::Left)).unwrap();
        let right = engine().process(&TransformRequest::new(input, Direction::Right)).unwrap();
        assert_ne!(decode(&left.bytes).to_rgba8(), decode(&right.bytes).to_rgba8());
        assert_eq!(left.format, OutputFormat::Png);
        assert_eq!((left.width, left.height), (6, 3));
    }

    #[test]
    fn test_dimensions_preserved_for_every_direction() {
        use strum::IntoEnumIterator;
        let input = png_bytes(&asymmetric(5, 7));
        for direction in Direction::iter() {
            let result = engine().process(&TransformRequest::new(input.clone(), direction)).unwrap();
            let output = decode(&result.bytes);
            assert_eq!((output.width(), output.height()), (5, 7));
        }
    }

    #[test]
    fn test_transparent_source_half_gives_transparent_output() {
        let mut image = asymmetric(4, 2);
        for y in 0..2 {
            for x in 0..2 {
                image.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        let result = engine()
            .process(&TransformRequest::new(png_bytes(&image), Direction::Left))
            .unwrap();
        let output = decode(&result.bytes).to_rgba8();
        assert!(output.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_single_pixel_is_identity() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([12, 34, 56, 200]));
        let result = engine()
            .process(&TransformRequest::new(png_bytes(&image), Direction::Right))
            .unwrap();
        assert_eq!(decode(&result.bytes).to_rgba8(), image);
    }

    #[test]
    fn test_truncated_input_is_a_decode_error() {
        let bytes = png_bytes(&asymmetric(8, 8));
        let truncated = bytes[..20].to_vec();
        let result = engine().process(&TransformRequest::new(truncated, Direction::Left));
        assert!(matches!(result, Err(SymmetryError::Decode(_))));
    }

    #[test]
    fn test_unknown_hint_is_rejected() {
        let request = TransformRequest::new(Vec::new(), Direction::Left).with_format_hint_str("tga");
        assert!(matches!(request, Err(SymmetryError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_jpeg_hint_flattens_transparency_on_white() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        let request = TransformRequest::new(png_bytes(&image), Direction::Left).with_format_hint(OutputFormat::Jpeg);
        let result = engine().process(&request).unwrap();
        assert_eq!(result.format, OutputFormat::Jpeg);

        let output = decode(&result.bytes);
        assert!(!output.color().has_alpha());
        assert!(output.to_rgb8().pixels().all(|p| p.0.iter().all(|&c| c >= 250)));
    }

    #[test]
    fn test_animation_keeps_frame_delays() {
        let frames = vec![
            (asymmetric(4, 4), 10),
            (RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255])), 20),
            (RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])), 15),
        ];
        let input = build_gif(&frames);

        let mut seen = Vec::new();
        let result = engine()
            .process_with_progress(&TransformRequest::new(input, Direction::Left), |p| seen.push(p))
            .unwrap();
        assert!(result.animated);
        assert_eq!(result.format, OutputFormat::Gif);
        assert_eq!(result.frame_count, 3);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], FrameProgress { index: 2, total: 3 });

        let decoded: Vec<_> = GifFrames::new(Cursor::new(result.bytes.as_slice()))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let delays: Vec<u32> = decoded.iter().map(|f| f.timing.delay_ms).collect();
        assert_eq!(delays, vec![100, 200, 150]);

        // First frame was mirrored: column 3 repeats column 0
        let first = &decoded[0].image;
        assert_eq!(first.get_pixel(3, 1), first.get_pixel(0, 1));
        assert_eq!(first.get_pixel(0, 1).0[0], 0);
    }

    #[test]
    fn test_animation_with_still_hint_takes_first_frame() {
        let frames = vec![
            (RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])), 10),
            (RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255])), 10),
        ];
        let request = TransformRequest::new(build_gif(&frames), Direction::Top).with_format_hint(OutputFormat::Png);
        let result = engine().process(&request).unwrap();
        assert!(!result.animated);
        assert_eq!(result.frame_count, 1);
        assert_eq!(decode(&result.bytes).to_rgba8().get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_gif_without_frames_is_empty() {
        let mut bytes = Vec::new();
        {
            let _encoder = gif::Encoder::new(&mut bytes, 4, 4, &[]).unwrap();
        }
        let result = engine().process(&TransformRequest::new(bytes.clone(), Direction::Left));
        assert!(matches!(result, Err(SymmetryError::EmptyImage)));

        let hinted = TransformRequest::new(bytes, Direction::Left).with_format_hint(OutputFormat::Png);
        assert!(matches!(engine().process(&hinted), Err(SymmetryError::EmptyImage)));
    }

    #[test]
    fn test_truncated_frameless_gif_is_a_decode_error() {
        let mut bytes = Vec::new();
        {
            let _encoder = gif::Encoder::new(&mut bytes, 4, 4, &[]).unwrap();
        }
        bytes.pop();
        let result = engine().process(&TransformRequest::new(bytes, Direction::Left));
        assert!(matches!(result, Err(SymmetryError::Decode(_))));
    }

    #[test]
    fn test_exif_survives_png_round_trip() {
        let blob = orientation_exif(6);
        let (input, _) = metadata::embed_exif(OutputFormat::Png, png_bytes(&asymmetric(4, 2)), &blob).unwrap();

        let result = engine().process(&TransformRequest::new(input.clone(), Direction::Left)).unwrap();
        assert!(result.exif_preserved);
        assert_eq!(metadata::extract_exif(&result.bytes), Some(blob));

        let stripped = SymmetryEngine::new(ProcessingConfig {
            preserve_exif: false,
            ..ProcessingConfig::default()
        });
        let result = stripped.process(&TransformRequest::new(input, Direction::Left)).unwrap();
        assert!(!result.exif_preserved);
        assert_eq!(metadata::extract_exif(&result.bytes), None);
    }

    #[test]
    fn test_auto_orient_rotates_and_resets_tag() {
        let blob = orientation_exif(6);
        let (input, _) = metadata::embed_exif(OutputFormat::Png, png_bytes(&asymmetric(4, 2)), &blob).unwrap();
        assert!(needs_orientation(&input));

        let engine = SymmetryEngine::new(ProcessingConfig {
            auto_orient: true,
            ..ProcessingConfig::default()
        });
        let result = engine.process(&TransformRequest::new(input, Direction::Left)).unwrap();
        assert_eq!((result.width, result.height), (2, 4));

        let exif = metadata::extract_exif(&result.bytes).unwrap();
        assert_eq!(orientation::read_orientation(&exif), ExifOrientation::TopLeft);
        assert!(!needs_orientation(&result.bytes));
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SymmetryEngine>();
    }

    #[test]
    fn test_config_is_normalized() {
        let engine = SymmetryEngine::new(ProcessingConfig {
            jpeg_quality: 0,
            gif_speed: 99,
            ..ProcessingConfig::default()
        });
        assert_eq!(engine.config().jpeg_quality, 1);
        assert_eq!(engine.config().gif_speed, 30);
    }

    #[test]
    fn test_gray_input_keeps_mode() {
        let gray = image::GrayImage::from_fn(4, 4, |x, _| image::Luma([x as u8 * 60]));
        let mut input = Vec::new();
        DynamicImage::ImageLuma8(gray)
            .write_with_encoder(PngEncoder::new(&mut input))
            .unwrap();
        let result = engine().process(&TransformRequest::new(input, Direction::Right)).unwrap();
        assert_eq!(decode(&result.bytes).color(), ColorType::L8);
    }
}
