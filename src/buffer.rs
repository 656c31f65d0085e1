//! Pixel Buffer Primitives
//!
//! Every layer the engine owns is an `image::RgbaImage`: a row-major grid of
//! RGBA8 pixels stored with **straight** (non-premultiplied) alpha. This is
//! the format images are decoded into and the format masks are persisted in.
//!
//! Premultiplied values only exist transiently inside source-over
//! compositing (`premultiply` -> blend -> `unpremultiply`); they are never
//! stored in a layer.

use image::{Rgba, RgbaImage};
use crate::error::{CensorError, Result};

/// The buffer type shared by all layers.
pub type PixelBuffer = RgbaImage;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Fully transparent buffer of the given size.
pub fn transparent(width: u32, height: u32) -> PixelBuffer {
    RgbaImage::from_pixel(width, height, TRANSPARENT)
}

/// True when the buffer holds no pixels at all (zero width or zero height).
pub fn is_empty(buf: &PixelBuffer) -> bool {
    buf.width() == 0 || buf.height() == 0
}

/// Fail with `DimensionMismatch` unless `actual` has the `expected` size.
pub fn check_dimensions(expected: (u32, u32), actual: (u32, u32)) -> Result<()> {
    if expected != actual {
        return Err(CensorError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Linear interpolation between two 8-bit channel values.
///
/// `weight` is the share of `top` in 0..=255. The result is
/// `round(weight/255 * top + (1 - weight/255) * base)`, exact at both ends:
/// weight 0 yields `base`, weight 255 yields `top`.
#[inline]
pub fn lerp_channel(base: u8, top: u8, weight: u8) -> u8 {
    let w = weight as u32;
    // numerator / 255 can never land exactly on .5, so +127 is round-to-nearest
    ((top as u32 * w + base as u32 * (255 - w) + 127) / 255) as u8
}

/// Straight alpha -> premultiplied alpha (rounded).
#[inline]
pub fn premultiply(px: Rgba<u8>) -> Rgba<u8> {
    let a = px[3] as u32;
    let mul = |c: u8| ((c as u32 * a + 127) / 255) as u8;
    Rgba([mul(px[0]), mul(px[1]), mul(px[2]), px[3]])
}

/// Premultiplied alpha -> straight alpha (rounded). Alpha 0 maps to transparent black.
#[inline]
pub fn unpremultiply(px: Rgba<u8>) -> Rgba<u8> {
    let a = px[3] as u32;
    if a == 0 {
        return TRANSPARENT;
    }
    let div = |c: u8| ((c as u32 * 255 + a / 2) / a).min(255) as u8;
    Rgba([div(px[0]), div(px[1]), div(px[2]), px[3]])
}

/// Porter-Duff source-over of one straight-alpha pixel onto another.
pub fn source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }
    let s = premultiply(src);
    let d = premultiply(dst);
    let inv = 255 - s[3] as u32;
    let over = |sc: u8, dc: u8| (sc as u32 + (dc as u32 * inv + 127) / 255).min(255) as u8;
    unpremultiply(Rgba([
        over(s[0], d[0]),
        over(s[1], d[1]),
        over(s[2], d[2]),
        over(s[3], d[3]),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_buffer() {
        let buf = transparent(4, 3);
        assert_eq!(buf.dimensions(), (4, 3));
        assert!(buf.pixels().all(|p| *p == TRANSPARENT));
        assert!(!is_empty(&buf));
        assert!(is_empty(&transparent(0, 7)));
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions((3, 4), (3, 4)).is_ok());
        match check_dimensions((3, 4), (4, 3)) {
            Err(CensorError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, (3, 4));
                assert_eq!(actual, (4, 3));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_lerp_channel_endpoints() {
        for base in [0u8, 17, 128, 255] {
            for top in [0u8, 99, 200, 255] {
                assert_eq!(lerp_channel(base, top, 0), base);
                assert_eq!(lerp_channel(base, top, 255), top);
            }
        }
        assert_eq!(lerp_channel(0, 255, 128), 128);
        assert_eq!(lerp_channel(0, 255, 127), 127);
    }

    #[test]
    fn test_premultiply() {
        assert_eq!(premultiply(Rgba([200, 100, 50, 255])), Rgba([200, 100, 50, 255]));
        assert_eq!(premultiply(Rgba([200, 100, 50, 0])), Rgba([0, 0, 0, 0]));
        assert_eq!(premultiply(Rgba([255, 255, 255, 128])), Rgba([128, 128, 128, 128]));
        assert_eq!(unpremultiply(Rgba([128, 128, 128, 128])), Rgba([255, 255, 255, 128]));
        assert_eq!(unpremultiply(Rgba([10, 10, 10, 0])), TRANSPARENT);
    }

    #[test]
    fn test_source_over() {
        let dst = Rgba([10, 20, 30, 255]);
        assert_eq!(source_over(dst, Rgba([1, 2, 3, 0])), dst);
        assert_eq!(source_over(dst, Rgba([1, 2, 3, 255])), Rgba([1, 2, 3, 255]));

        // Half-covered black over opaque white lands on mid gray
        let out = source_over(Rgba([255, 255, 255, 255]), Rgba([0, 0, 0, 128]));
        assert_eq!(out[3], 255);
        assert!((out[0] as i32 - 127).abs() <= 1);
    }
}
