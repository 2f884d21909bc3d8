use exif::{In, Reader, Tag, Value};
use image::DynamicImage;
use tracing::debug;

/// EXIF orientation values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifOrientation {
    /// No orientation specified or undefined
    Undefined = 0,
    /// Normal orientation (0 degrees)
    TopLeft = 1,
    /// Horizontally flipped
    TopRight = 2,
    /// Rotated 180 degrees
    BottomRight = 3,
    /// Vertically flipped
    BottomLeft = 4,
    /// Transposed (mirrored along the main diagonal)
    LeftTop = 5,
    /// Needs a 90 degree clockwise rotation to display
    RightTop = 6,
    /// Transversed (mirrored along the anti-diagonal)
    RightBottom = 7,
    /// Needs a 90 degree counter-clockwise rotation to display
    LeftBottom = 8,
}

impl From<u32> for ExifOrientation {
    fn from(value: u32) -> Self {
        match value {
            1 => ExifOrientation::TopLeft,
            2 => ExifOrientation::TopRight,
            3 => ExifOrientation::BottomRight,
            4 => ExifOrientation::BottomLeft,
            5 => ExifOrientation::LeftTop,
            6 => ExifOrientation::RightTop,
            7 => ExifOrientation::RightBottom,
            8 => ExifOrientation::LeftBottom,
            _ => ExifOrientation::Undefined,
        }
    }
}

impl ExifOrientation {
    pub fn description(&self) -> &'static str {
        match self {
            ExifOrientation::Undefined => "Undefined",
            ExifOrientation::TopLeft => "Normal",
            ExifOrientation::TopRight => "Horizontally flipped",
            ExifOrientation::BottomRight => "Rotated 180°",
            ExifOrientation::BottomLeft => "Vertically flipped",
            ExifOrientation::LeftTop => "Transposed",
            ExifOrientation::RightTop => "Rotated 90° CW",
            ExifOrientation::RightBottom => "Transversed",
            ExifOrientation::LeftBottom => "Rotated 90° CCW",
        }
    }

    /// True if applying this orientation changes the pixel grid.
    pub fn needs_transform(&self) -> bool {
        !matches!(self, ExifOrientation::Undefined | ExifOrientation::TopLeft)
    }
}

/// Read the orientation tag from a raw EXIF (TIFF) block.
pub fn read_orientation(exif: &[u8]) -> ExifOrientation {
    let parsed = match Reader::new().read_raw(exif.to_vec()) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!("Unreadable EXIF block: {}", err);
            return ExifOrientation::Undefined;
        }
    };

    match parsed.get_field(Tag::Orientation, In::PRIMARY) {
        Some(field) => match &field.value {
            Value::Short(values) if !values.is_empty() => ExifOrientation::from(values[0] as u32),
            _ => ExifOrientation::Undefined,
        },
        None => ExifOrientation::Undefined,
    }
}

/// Apply the pixel transform an orientation describes, producing an
/// upright image.
pub fn apply_rotation(image: DynamicImage, orientation: ExifOrientation) -> DynamicImage {
    match orientation {
        ExifOrientation::Undefined | ExifOrientation::TopLeft => image,
        ExifOrientation::TopRight => image.fliph(),
        ExifOrientation::BottomRight => image.rotate180(),
        ExifOrientation::BottomLeft => image.flipv(),
        ExifOrientation::LeftTop => image.rotate90().fliph(),
        ExifOrientation::RightTop => image.rotate90(),
        ExifOrientation::RightBottom => image.rotate270().fliph(),
        ExifOrientation::LeftBottom => image.rotate270(),
    }
}

/// Rewrite the orientation tag in a raw EXIF block to "normal" in place.
///
/// Returns false when the block has no IFD0 orientation entry to patch.
pub fn reset_orientation_tag(exif: &mut [u8]) -> bool {
    let little_endian = match exif.get(0..2) {
        Some(b"II") => true,
        Some(b"MM") => false,
        _ => return false,
    };
    let read_u16 = |bytes: &[u8], at: usize| -> Option<u16> {
        let raw = [*bytes.get(at)?, *bytes.get(at + 1)?];
        Some(if little_endian {
            u16::from_le_bytes(raw)
        } else {
            u16::from_be_bytes(raw)
        })
    };
    let read_u32 = |bytes: &[u8], at: usize| -> Option<u32> {
        let raw = [
            *bytes.get(at)?,
            *bytes.get(at + 1)?,
            *bytes.get(at + 2)?,
            *bytes.get(at + 3)?,
        ];
        Some(if little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    };

    let Some(ifd) = read_u32(exif, 4).map(|offset| offset as usize) else {
        return false;
    };
    let Some(entries) = read_u16(exif, ifd) else {
        return false;
    };

    for n in 0..entries as usize {
        let entry = ifd + 2 + n * 12;
        if read_u16(exif, entry) != Some(Tag::Orientation.number()) {
            continue;
        }
        // SHORT, count 1: the value sits in the first two bytes of the slot
        if read_u16(exif, entry + 2) != Some(3) || exif.len() < entry + 10 {
            return false;
        }
        let one = if little_endian {
            1u16.to_le_bytes()
        } else {
            1u16.to_be_bytes()
        };
        exif[entry + 8..entry + 10].copy_from_slice(&one);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::metadata::tests::orientation_exif;
    use image::{Rgb, RgbImage};

    /// 3x2 image whose pixels encode their own coordinates.
    fn coordinate_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8, y as u8, 0])))
    }

    fn at(image: &DynamicImage, x: u32, y: u32) -> (u8, u8) {
        let p = image.to_rgb8().get_pixel(x, y).0;
        (p[0], p[1])
    }

    #[test]
    fn test_from_u32() {
        assert_eq!(ExifOrientation::from(1), ExifOrientation::TopLeft);
        assert_eq!(ExifOrientation::from(6), ExifOrientation::RightTop);
        assert_eq!(ExifOrientation::from(0), ExifOrientation::Undefined);
        assert_eq!(ExifOrientation::from(99), ExifOrientation::Undefined);
        assert!(!ExifOrientation::TopLeft.needs_transform());
        assert!(ExifOrientation::LeftBottom.needs_transform());
    }

    #[test]
    fn test_read_orientation() {
        assert_eq!(read_orientation(&orientation_exif(6)), ExifOrientation::RightTop);
        assert_eq!(read_orientation(&orientation_exif(3)), ExifOrientation::BottomRight);
        assert_eq!(read_orientation(b"garbage"), ExifOrientation::Undefined);
    }

    #[test]
    fn test_rotate_clockwise() {
        let rotated = apply_rotation(coordinate_image(), ExifOrientation::RightTop);
        assert_eq!((rotated.width(), rotated.height()), (2, 3));
        // The bottom-left source pixel lands at the top-left
        assert_eq!(at(&rotated, 0, 0), (0, 1));
        assert_eq!(at(&rotated, 1, 0), (0, 0));
    }

    #[test]
    fn test_transpose_and_transverse() {
        // Transpose: output (x, y) comes from source (y, x)
        let transposed = apply_rotation(coordinate_image(), ExifOrientation::LeftTop);
        assert_eq!((transposed.width(), transposed.height()), (2, 3));
        assert_eq!(at(&transposed, 0, 0), (0, 0));
        assert_eq!(at(&transposed, 1, 2), (2, 1));

        // Transverse: output (x, y) comes from source (W-1-y, H-1-x)
        let transversed = apply_rotation(coordinate_image(), ExifOrientation::RightBottom);
        assert_eq!(at(&transversed, 0, 0), (2, 1));
        assert_eq!(at(&transversed, 1, 2), (0, 0));
    }

    #[test]
    fn test_reset_orientation_tag() {
        let mut blob = orientation_exif(8);
        assert!(reset_orientation_tag(&mut blob));
        assert_eq!(read_orientation(&blob), ExifOrientation::TopLeft);

        let mut junk = b"II\x2a\x00".to_vec();
        assert!(!reset_orientation_tag(&mut junk));
    }
}
