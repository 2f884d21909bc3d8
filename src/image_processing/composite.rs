//! Alpha compositing on RGBA buffers of any supported channel depth.
//!
//! All pasting done by the mirror transform goes through [`composite_over`],
//! which applies the standard "over" operator:
//! `out = src·αs + dst·αd·(1 − αs)`, normalized by the resulting alpha.

use image::{ImageBuffer, Pixel, Primitive, Rgba};

/// Opaque white, the background used when transparency has to go.
pub const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

/// A channel type the compositor can convert to and from unit range.
pub trait Channel: Primitive {
    fn to_unit(self) -> f32;
    fn from_unit(value: f32) -> Self;
}

impl Channel for u8 {
    fn to_unit(self) -> f32 {
        f32::from(self) / 255.0
    }

    fn from_unit(value: f32) -> Self {
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

impl Channel for u16 {
    fn to_unit(self) -> f32 {
        f32::from(self) / 65535.0
    }

    fn from_unit(value: f32) -> Self {
        (value.clamp(0.0, 1.0) * 65535.0).round() as u16
    }
}

impl Channel for f32 {
    fn to_unit(self) -> f32 {
        self
    }

    fn from_unit(value: f32) -> Self {
        value
    }
}

pub type RgbaBuffer<T> = ImageBuffer<Rgba<T>, Vec<T>>;

/// Composite `src` over `dst` and return the resulting pixel.
pub fn blend_over<T: Channel>(dst: &Rgba<T>, src: &Rgba<T>) -> Rgba<T> {
    let src_alpha = src.0[3].to_unit();
    if src_alpha >= 1.0 {
        return *src;
    }
    if src_alpha <= 0.0 {
        return *dst;
    }

    let dst_alpha = dst.0[3].to_unit();
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha <= 0.0 {
        return Rgba([T::from_unit(0.0); 4]);
    }

    let mut out = [T::from_unit(0.0); 4];
    for c in 0..3 {
        let premultiplied =
            src.0[c].to_unit() * src_alpha + dst.0[c].to_unit() * dst_alpha * (1.0 - src_alpha);
        out[c] = T::from_unit(premultiplied / out_alpha);
    }
    out[3] = T::from_unit(out_alpha);
    Rgba(out)
}

/// Paste `layer` onto `canvas` at (`x`, `y`), using the layer's own alpha
/// as the paste mask. Pixels falling outside the canvas are ignored.
pub fn composite_over<T>(canvas: &mut RgbaBuffer<T>, layer: &RgbaBuffer<T>, x: u32, y: u32)
where
    T: Channel,
    Rgba<T>: Pixel<Subpixel = T>,
{
    for (dx, dy, pixel) in layer.enumerate_pixels() {
        let target_x = x + dx;
        let target_y = y + dy;
        if target_x < canvas.width() && target_y < canvas.height() {
            let blended = blend_over(canvas.get_pixel(target_x, target_y), pixel);
            canvas.put_pixel(target_x, target_y, blended);
        }
    }
}

/// Composite the image onto an opaque background color, leaving every
/// pixel fully opaque.
pub fn flatten_onto<T>(image: &RgbaBuffer<T>, background: [f32; 3]) -> RgbaBuffer<T>
where
    T: Channel,
    Rgba<T>: Pixel<Subpixel = T>,
{
    let backdrop = Rgba([
        T::from_unit(background[0]),
        T::from_unit(background[1]),
        T::from_unit(background[2]),
        T::from_unit(1.0),
    ]);
    let mut flattened = ImageBuffer::from_pixel(image.width(), image.height(), backdrop);
    composite_over(&mut flattened, image, 0, 0);
    flattened
}

/// True if any pixel is less than fully opaque.
pub fn has_transparency<T>(image: &RgbaBuffer<T>) -> bool
where
    T: Channel,
    Rgba<T>: Pixel<Subpixel = T>,
{
    image.pixels().any(|p| p.0[3].to_unit() < 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_opaque_source_replaces_destination() {
        let dst = Rgba([10u8, 20, 30, 255]);
        let src = Rgba([200u8, 100, 50, 255]);
        assert_eq!(blend_over(&dst, &src), src);
    }

    #[test]
    fn test_transparent_source_keeps_destination() {
        let dst = Rgba([10u8, 20, 30, 128]);
        let src = Rgba([200u8, 100, 50, 0]);
        assert_eq!(blend_over(&dst, &src), dst);
    }

    #[test]
    fn test_half_alpha_over_opaque() {
        let dst = Rgba([0u8, 0, 0, 255]);
        let src = Rgba([255u8, 255, 255, 128]);
        let out = blend_over(&dst, &src);
        // 255 * 128/255 = 128
        assert_eq!(out, Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn test_partial_alpha_over_transparent_is_exact() {
        let dst = Rgba([0u8, 0, 0, 0]);
        let src = Rgba([200u8, 17, 99, 77]);
        assert_eq!(blend_over(&dst, &src), src);
    }

    #[test]
    fn test_sixteen_bit_blend() {
        let dst = Rgba([0u16, 0, 0, 65535]);
        let src = Rgba([65535u16, 0, 0, 32768]);
        let out = blend_over(&dst, &src);
        assert_eq!(out.0[3], 65535);
        assert!((out.0[0] as i32 - 32768).abs() <= 1);
    }

    #[test]
    fn test_composite_over_ignores_out_of_bounds() {
        let mut canvas = RgbaImage::new(4, 4);
        let layer = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));
        composite_over(&mut canvas, &layer, 2, 2);
        assert_eq!(canvas.get_pixel(3, 3), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(1, 1), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_flatten_onto_white() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        image.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let flat = flatten_onto(&image, WHITE);
        assert_eq!(flat.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgba([0, 0, 255, 255]));
        assert!(!has_transparency(&flat));
        assert!(has_transparency(&image));
    }
}
