//! Layer Compositing
//!
//! Two contracts live here:
//!
//! 1. `compose` / `compose_region` - the true per-pixel blend that produces
//!    the final preview: `out = lerp(base, censored, mask_alpha / 255)` on every
//!    channel, exact at alpha 0 (base) and 255 (censored) and correctly rounded
//!    in between. This is what gets exported.
//! 2. `overlay_mask` - a display aid that draws the mask over the base photo
//!    with plain source-over so the user can see what they painted.
//!
//! Rows are blended in parallel with rayon; each call still finishes before it
//! returns.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::buffer::{self, lerp_channel};
use crate::error::Result;
use crate::geometry::Rect;

/// Which layer (or derived view) the renderer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    Original,
    FullyCensored,
    MaskOnly,
    MaskOnImage,
    #[default]
    FinalPreview,
}

impl DisplayMode {
    pub fn all() -> &'static [DisplayMode] {
        &[
            DisplayMode::Original,
            DisplayMode::FullyCensored,
            DisplayMode::MaskOnly,
            DisplayMode::MaskOnImage,
            DisplayMode::FinalPreview,
        ]
    }

    /// Only the fully censored image and the blended preview may be exported.
    pub fn is_export_target(self) -> bool {
        matches!(self, DisplayMode::FullyCensored | DisplayMode::FinalPreview)
    }

    pub fn label(self) -> &'static str {
        match self {
            DisplayMode::Original => "Original",
            DisplayMode::FullyCensored => "Fully censored",
            DisplayMode::MaskOnly => "Mask only",
            DisplayMode::MaskOnImage => "Mask on image",
            DisplayMode::FinalPreview => "Final preview",
        }
    }
}

/// Blend one pixel: `weight` is the mask coverage.
#[inline]
fn blend_pixel(base: &[u8], censored: &[u8], weight: u8, out: &mut [u8]) {
    match weight {
        0 => out.copy_from_slice(base),
        255 => out.copy_from_slice(censored),
        w => {
            for c in 0..4 {
                out[c] = lerp_channel(base[c], censored[c], w);
            }
        }
    }
}

fn check_layers(base: &RgbaImage, mask: &RgbaImage, censored: &RgbaImage) -> Result<()> {
    buffer::check_dimensions(base.dimensions(), mask.dimensions())?;
    buffer::check_dimensions(base.dimensions(), censored.dimensions())?;
    Ok(())
}

/// Build the final preview from scratch.
pub fn compose(base: &RgbaImage, mask: &RgbaImage, censored: &RgbaImage) -> Result<RgbaImage> {
    check_layers(base, mask, censored)?;
    let (width, height) = base.dimensions();
    let mut preview = RgbaImage::new(width, height);
    compose_region(&mut preview, base, mask, censored, Rect::full(width, height))?;
    Ok(preview)
}

/// Re-blend only `rect` of an existing preview. The rect is clipped to the image.
pub fn compose_region(
    preview: &mut RgbaImage,
    base: &RgbaImage,
    mask: &RgbaImage,
    censored: &RgbaImage,
    rect: Rect,
) -> Result<()> {
    check_layers(base, mask, censored)?;
    buffer::check_dimensions(base.dimensions(), preview.dimensions())?;

    let (width, height) = base.dimensions();
    let x0 = rect.x.min(width) as usize;
    let x1 = rect.right().min(width) as usize;
    let y0 = rect.y.min(height) as usize;
    let y1 = rect.bottom().min(height) as usize;
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    let row_len = width as usize * 4;
    let (base_raw, mask_raw, censored_raw) = (base.as_raw(), mask.as_raw(), censored.as_raw());
    let out: &mut [u8] = preview;

    out[y0 * row_len..y1 * row_len]
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(i, row)| {
            let offset = (y0 + i) * row_len;
            for x in x0..x1 {
                let px = x * 4;
                let at = offset + px;
                blend_pixel(
                    &base_raw[at..at + 4],
                    &censored_raw[at..at + 4],
                    mask_raw[at + 3],
                    &mut row[px..px + 4],
                );
            }
        });
    Ok(())
}

/// Base photo with the mask drawn on top (source-over, mask tint at mask alpha).
pub fn overlay_mask(base: &RgbaImage, mask: &RgbaImage) -> Result<RgbaImage> {
    buffer::check_dimensions(base.dimensions(), mask.dimensions())?;
    let (width, height) = base.dimensions();
    let mut out = base.clone();
    if width == 0 || height == 0 {
        return Ok(out);
    }

    let row_len = width as usize * 4;
    let mask_raw = mask.as_raw();
    let dst: &mut [u8] = &mut out;
    dst.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        let mask_row = &mask_raw[y * row_len..(y + 1) * row_len];
        for (px, m) in row.chunks_exact_mut(4).zip(mask_row.chunks_exact(4)) {
            let blended = buffer::source_over(
                Rgba([px[0], px[1], px[2], px[3]]),
                Rgba([m[0], m[1], m[2], m[3]]),
            );
            px.copy_from_slice(&blended.0);
        }
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CensorError;
    use image::ImageBuffer;

    fn base_image() -> RgbaImage {
        ImageBuffer::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 200, 255]))
    }

    fn censored_image() -> RgbaImage {
        ImageBuffer::from_fn(16, 16, |x, y| Rgba([255 - (y * 7) as u8, (x * 9) as u8, 10, 255]))
    }

    fn uniform_mask(alpha: u8) -> RgbaImage {
        ImageBuffer::from_pixel(16, 16, Rgba([0, 0, 0, alpha]))
    }

    #[test]
    fn test_zero_mask_yields_base() {
        let base = base_image();
        let out = compose(&base, &uniform_mask(0), &censored_image()).unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn test_full_mask_yields_censored() {
        let censored = censored_image();
        let out = compose(&base_image(), &uniform_mask(255), &censored).unwrap();
        assert_eq!(out, censored);
    }

    #[test]
    fn test_every_alpha_interpolates() {
        let base: RgbaImage = ImageBuffer::from_pixel(1, 1, Rgba([13, 200, 77, 255]));
        let censored: RgbaImage = ImageBuffer::from_pixel(1, 1, Rgba([240, 5, 77, 255]));
        for a in 0..=255u8 {
            let mask: RgbaImage = ImageBuffer::from_pixel(1, 1, Rgba([0, 0, 0, a]));
            let out = compose(&base, &mask, &censored).unwrap();
            let t = a as f64 / 255.0;
            for c in 0..3 {
                let expected = t * censored.get_pixel(0, 0)[c] as f64 + (1.0 - t) * base.get_pixel(0, 0)[c] as f64;
                let got = out.get_pixel(0, 0)[c] as f64;
                assert!((got - expected.round()).abs() <= 1.0, "alpha {} channel {}: {} vs {}", a, c, got, expected);
            }
        }
    }

    #[test]
    fn test_mask_tint_is_ignored_by_blend() {
        let base = base_image();
        let censored = censored_image();
        let tinted: RgbaImage = ImageBuffer::from_pixel(16, 16, Rgba([255, 0, 255, 255]));
        assert_eq!(compose(&base, &tinted, &censored).unwrap(), censored);
    }

    #[test]
    fn test_compose_region_only_touches_rect() {
        let base = base_image();
        let censored = censored_image();
        let mut preview = compose(&base, &uniform_mask(0), &censored).unwrap();
        let full = uniform_mask(255);
        compose_region(&mut preview, &base, &full, &censored, Rect::new(4, 4, 3, 2)).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                let inside = (4..7).contains(&x) && (4..6).contains(&y);
                let expected = if inside { censored.get_pixel(x, y) } else { base.get_pixel(x, y) };
                assert_eq!(preview.get_pixel(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_compose_region_clips() {
        let base = base_image();
        let censored = censored_image();
        let mut preview = base.clone();
        compose_region(&mut preview, &base, &uniform_mask(255), &censored, Rect::new(10, 10, 50, 50)).unwrap();
        assert_eq!(preview.get_pixel(15, 15), censored.get_pixel(15, 15));
        compose_region(&mut preview, &base, &uniform_mask(255), &censored, Rect::new(40, 40, 5, 5)).unwrap();
    }

    #[test]
    fn test_dimension_mismatch() {
        let small: RgbaImage = ImageBuffer::new(4, 4);
        assert!(matches!(
            compose(&base_image(), &small, &censored_image()),
            Err(CensorError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            overlay_mask(&base_image(), &small),
            Err(CensorError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_overlay_mask() {
        let base = base_image();
        assert_eq!(overlay_mask(&base, &uniform_mask(0)).unwrap(), base);

        let solid: RgbaImage = ImageBuffer::from_pixel(16, 16, Rgba([255, 0, 0, 255]));
        let out = overlay_mask(&base, &solid).unwrap();
        assert!(out.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn test_export_targets() {
        let exportable: Vec<_> = DisplayMode::all().iter().copied().filter(|m| m.is_export_target()).collect();
        assert_eq!(exportable, vec![DisplayMode::FullyCensored, DisplayMode::FinalPreview]);
    }
}
