//! The half-image mirror transform.
//!
//! A frame is split at `floor(len / 2)` along the direction's axis. The
//! source half is kept where it is and its reflection replaces the other
//! half. Both halves are pasted onto a fully transparent canvas with the
//! "over" operator, so partially transparent pixels keep their exact
//! color and alpha.

use image::{DynamicImage, ImageBuffer, Pixel, Rgba};
use tracing::debug;

use super::composite::{composite_over, flatten_onto, Channel, RgbaBuffer, WHITE};
use super::direction::{Axis, Direction};
use super::format::{ChannelDepth, ColorMode};
use crate::error::Result;

/// Mirror an RGBA buffer. The output always has the input's dimensions.
pub fn mirror_buffer<T>(source: &RgbaBuffer<T>, direction: Direction) -> RgbaBuffer<T>
where
    T: Channel,
    Rgba<T>: Pixel<Subpixel = T>,
{
    let (width, height) = source.dimensions();
    let len = direction.axis_len(width, height);
    if len / 2 == 0 {
        return source.clone();
    }

    let (start, end) = direction.source_span(len);
    let (dest_start, dest_end) = if direction.source_is_leading() {
        (end, len)
    } else {
        (0, start)
    };

    let kept: RgbaBuffer<T> = match direction.axis() {
        Axis::Horizontal => {
            ImageBuffer::from_fn(end - start, height, |x, y| *source.get_pixel(start + x, y))
        }
        Axis::Vertical => {
            ImageBuffer::from_fn(width, end - start, |x, y| *source.get_pixel(x, start + y))
        }
    };

    let reflected: RgbaBuffer<T> = match direction.axis() {
        Axis::Horizontal => ImageBuffer::from_fn(dest_end - dest_start, height, |x, y| {
            *source.get_pixel(direction.source_index(len, dest_start + x), y)
        }),
        Axis::Vertical => ImageBuffer::from_fn(width, dest_end - dest_start, |x, y| {
            *source.get_pixel(x, direction.source_index(len, dest_start + y))
        }),
    };

    let mut canvas: RgbaBuffer<T> = ImageBuffer::new(width, height);
    match direction.axis() {
        Axis::Horizontal => {
            composite_over(&mut canvas, &kept, start, 0);
            composite_over(&mut canvas, &reflected, dest_start, 0);
        }
        Axis::Vertical => {
            composite_over(&mut canvas, &kept, 0, start);
            composite_over(&mut canvas, &reflected, 0, dest_start);
        }
    }
    canvas
}

/// Mirror a decoded frame, keeping its own color mode.
pub fn mirror_frame(frame: &DynamicImage, direction: Direction) -> Result<DynamicImage> {
    let mode = ColorMode::of(frame)?;
    Ok(mirror_frame_as(frame, mode, direction))
}

/// Mirror a frame whose original mode is known (for example a palette image
/// the decoder already expanded to RGB).
pub fn mirror_frame_as(frame: &DynamicImage, mode: ColorMode, direction: Direction) -> DynamicImage {
    debug!(
        %direction,
        ?mode,
        width = frame.width(),
        height = frame.height(),
        "Mirroring frame"
    );

    match mode.depth() {
        ChannelDepth::Eight => {
            let mirrored = mirror_buffer(&frame.to_rgba8(), direction);
            restore_mode(DynamicImage::ImageRgba8(mirrored), mode)
        }
        ChannelDepth::Sixteen => {
            let mirrored = mirror_buffer(&frame.to_rgba16(), direction);
            restore_mode(DynamicImage::ImageRgba16(mirrored), mode)
        }
        ChannelDepth::Float => {
            let mirrored = mirror_buffer(&frame.to_rgba32f(), direction);
            restore_mode(DynamicImage::ImageRgba32F(mirrored), mode)
        }
    }
}

/// Convert a working RGBA result back to the frame's original mode.
///
/// Alpha modes pass through. Palette images are flattened onto white before
/// becoming RGB, every other opaque mode simply drops its alpha channel.
pub fn restore_mode(working: DynamicImage, mode: ColorMode) -> DynamicImage {
    match mode {
        ColorMode::Rgba8 | ColorMode::Rgba16 | ColorMode::Rgba32F => working,
        ColorMode::GrayAlpha8 => DynamicImage::ImageLumaA8(working.to_luma_alpha8()),
        ColorMode::GrayAlpha16 => DynamicImage::ImageLumaA16(working.to_luma_alpha16()),
        ColorMode::Gray8 => DynamicImage::ImageLuma8(working.to_luma8()),
        ColorMode::Gray16 => DynamicImage::ImageLuma16(working.to_luma16()),
        ColorMode::Rgb8 => DynamicImage::ImageRgb8(working.to_rgb8()),
        ColorMode::Rgb16 => DynamicImage::ImageRgb16(working.to_rgb16()),
        ColorMode::Rgb32F => DynamicImage::ImageRgb32F(working.to_rgb32f()),
        ColorMode::Indexed => {
            let flat = flatten_onto(&working.to_rgba8(), WHITE);
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(flat).to_rgb8())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
    use strum::IntoEnumIterator;

    /// Opaque row where each column's red channel is its index.
    fn columns(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]))
    }

    fn red_row(image: &RgbaImage, y: u32) -> Vec<u8> {
        (0..image.width()).map(|x| image.get_pixel(x, y).0[0]).collect()
    }

    fn green_column(image: &RgbaImage, x: u32) -> Vec<u8> {
        (0..image.height()).map(|y| image.get_pixel(x, y).0[1]).collect()
    }

    #[test]
    fn test_left_even_width() {
        let out = mirror_buffer(&columns(4, 2), Direction::Left);
        assert_eq!(red_row(&out, 0), vec![0, 1, 1, 0]);
        assert_eq!(red_row(&out, 1), vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_left_odd_width() {
        let out = mirror_buffer(&columns(5, 1), Direction::Left);
        assert_eq!(red_row(&out, 0), vec![0, 1, 1, 1, 0]);
    }

    #[test]
    fn test_right_odd_width() {
        let out = mirror_buffer(&columns(5, 1), Direction::Right);
        assert_eq!(red_row(&out, 0), vec![4, 3, 2, 3, 4]);
    }

    #[test]
    fn test_top_and_bottom() {
        let source = columns(2, 4);
        assert_eq!(green_column(&mirror_buffer(&source, Direction::Top), 0), vec![0, 1, 1, 0]);
        assert_eq!(green_column(&mirror_buffer(&source, Direction::Bottom), 1), vec![3, 2, 2, 3]);
    }

    #[test]
    fn test_output_keeps_dimensions() {
        let source = columns(7, 3);
        for direction in Direction::iter() {
            assert_eq!(mirror_buffer(&source, direction).dimensions(), (7, 3));
        }
    }

    #[test]
    fn test_single_column_is_identity() {
        let source = columns(1, 3);
        assert_eq!(mirror_buffer(&source, Direction::Left), source);
        assert_eq!(mirror_buffer(&source, Direction::Right), source);
        // The vertical axis still has room to split
        assert_ne!(mirror_buffer(&source, Direction::Top), source);
    }

    #[test]
    fn test_mirroring_twice_is_stable() {
        let source = columns(6, 4);
        for direction in Direction::iter() {
            let once = mirror_buffer(&source, direction);
            let twice = mirror_buffer(&once, direction);
            assert_eq!(once, twice, "{direction} should be idempotent");
        }
    }

    #[test]
    fn test_result_is_symmetric() {
        let source = columns(6, 1);
        let out = mirror_buffer(&source, Direction::Right);
        for x in 0..6 {
            assert_eq!(out.get_pixel(x, 0), out.get_pixel(5 - x, 0));
        }
    }

    #[test]
    fn test_partial_alpha_survives_exactly() {
        let mut source = RgbaImage::new(4, 1);
        source.put_pixel(0, 0, Rgba([200, 17, 99, 77]));
        source.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let out = mirror_buffer(&source, Direction::Left);
        assert_eq!(out.get_pixel(0, 0), &Rgba([200, 17, 99, 77]));
        assert_eq!(out.get_pixel(3, 0), &Rgba([200, 17, 99, 77]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(out.get_pixel(2, 0), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_frame_keeps_gray_mode() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_fn(4, 1, |x, _| Luma([x as u8 * 50])));
        let out = mirror_frame(&gray, Direction::Left).unwrap();
        let DynamicImage::ImageLuma8(buffer) = out else {
            panic!("expected an 8-bit gray result");
        };
        let row: Vec<u8> = buffer.pixels().map(|p| p.0[0]).collect();
        assert_eq!(row, vec![0, 50, 50, 0]);
    }

    #[test]
    fn test_frame_keeps_sixteen_bit_depth() {
        let deep = DynamicImage::ImageRgb16(ImageBuffer::from_fn(2, 1, |x, _| {
            Rgb([if x == 0 { 1000u16 } else { 60000 }, 0, 0])
        }));
        let out = mirror_frame(&deep, Direction::Right).unwrap();
        let DynamicImage::ImageRgb16(buffer) = out else {
            panic!("expected a 16-bit RGB result");
        };
        assert_eq!(buffer.get_pixel(0, 0).0[0], 60000);
        assert_eq!(buffer.get_pixel(1, 0).0[0], 60000);
    }

    #[test]
    fn test_indexed_restores_to_rgb() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 2, Rgb([9, 8, 7])));
        let out = mirror_frame_as(&rgb, ColorMode::Indexed, Direction::Bottom);
        assert_eq!(out.color(), image::ColorType::Rgb8);
        assert!(out.to_rgb8().pixels().all(|p| p.0 == [9, 8, 7]));
    }

    #[test]
    fn test_alpha_mode_passes_through() {
        let rgba = DynamicImage::ImageRgba8(columns(4, 4));
        let out = mirror_frame(&rgba, Direction::Top).unwrap();
        assert_eq!(out.color(), image::ColorType::Rgba8);
    }
}
