//! Streaming Mean-Color Pixelization
//!
//! Reduces an image to uniform `block_size` x `block_size` blocks, each
//! painted with the mean color of the source pixels it covers, fully opaque.
//!
//! The source is scanned once, top to bottom. Per-block channel sums for the
//! current row-band are accumulated in a vector with one entry per block
//! column, so the working set is O(width) regardless of image height. When
//! the last row of a band has been read, the band is flushed straight into
//! the output with nearest-neighbor expansion (one template row, copied to
//! every row of the band) and the sums are reset.
//!
//! Blocks on the right and bottom edges are clipped to what remains of the
//! image, and their means divide by the true pixel count of the clipped
//! block: `width mod block` columns / `height mod block` rows when non-zero,
//! the full block size otherwise.

use image::RgbaImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// How a block mean is turned back into an 8-bit channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeanRounding {
    /// Round half up: `(sum + n/2) / n`
    #[default]
    Nearest,
    /// Integer division: `sum / n`
    Truncate,
}

impl MeanRounding {
    #[inline]
    fn divide(self, sum: u64, count: u64) -> u8 {
        let mean = match self {
            MeanRounding::Nearest => (sum + count / 2) / count,
            MeanRounding::Truncate => sum / count,
        };
        mean.min(255) as u8
    }
}

/// Pixelize with the default rounding rule.
pub fn pixelize(base: &RgbaImage, block_size: u32) -> RgbaImage {
    pixelize_with(base, block_size, MeanRounding::default())
}

/// Pixelize `base` into blocks of `block_size`, returning an image of the same
/// dimensions. A block size of 0 is clamped to 1. Zero-area input produces a
/// zero-area output without scanning anything.
pub fn pixelize_with(base: &RgbaImage, block_size: u32, rounding: MeanRounding) -> RgbaImage {
    let (width, height) = base.dimensions();
    let mut out = RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }

    let block = if block_size == 0 {
        warn!("pixelize: block size 0 clamped to 1");
        1
    } else {
        block_size
    };

    let columns = width.div_ceil(block) as usize;
    // u64 per channel: a 200x200 block of 255s is ~1.02e7, far below the limit
    let mut sums = vec![[0u64; 3]; columns];
    let mut template = vec![0u8; width as usize * 4];

    let row_len = width as usize * 4;
    let src = base.as_raw();
    let mut band_start = 0u32;

    for y in 0..height {
        let row = &src[y as usize * row_len..(y as usize + 1) * row_len];
        for (x, px) in row.chunks_exact(4).enumerate() {
            let acc = &mut sums[x / block as usize];
            acc[0] += px[0] as u64;
            acc[1] += px[1] as u64;
            acc[2] += px[2] as u64;
        }

        let band_end = (band_start + block).min(height);
        if y + 1 == band_end {
            let band = Band {
                start: band_start,
                end: band_end,
                block,
                width,
            };
            band.flush(&mut out, &mut sums, &mut template, rounding);
            band_start = band_end;
        }
    }

    debug!(
        "pixelize: {}x{} in {}x{} blocks ({} columns, {:?})",
        width, height, block, block, columns, rounding
    );
    out
}

/// One completed row-band of blocks.
struct Band {
    start: u32,
    end: u32,
    block: u32,
    width: u32,
}

impl Band {
    fn rows(&self) -> u64 {
        (self.end - self.start) as u64
    }

    fn column_width(&self, column: usize) -> u64 {
        let left = column as u32 * self.block;
        (self.width - left).min(self.block) as u64
    }

    fn flush(
        &self,
        out: &mut RgbaImage,
        sums: &mut [[u64; 3]],
        template: &mut [u8],
        rounding: MeanRounding,
    ) {
        let block = self.block as usize;
        for (column, acc) in sums.iter_mut().enumerate() {
            let count = self.column_width(column) * self.rows();
            let color = [
                rounding.divide(acc[0], count),
                rounding.divide(acc[1], count),
                rounding.divide(acc[2], count),
                255,
            ];
            let left = column * block * 4;
            let right = ((column + 1) * block * 4).min(template.len());
            for px in template[left..right].chunks_exact_mut(4) {
                px.copy_from_slice(&color);
            }
            *acc = [0; 3];
        }

        let row_len = template.len();
        let dst: &mut [u8] = out;
        for y in self.start..self.end {
            let offset = y as usize * row_len;
            dst[offset..offset + row_len].copy_from_slice(template);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn pattern(width: u32, height: u32) -> RgbaImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([
                ((x * 37 + y * 11) % 256) as u8,
                ((x * 5 + y * 73) % 256) as u8,
                ((x * y + 91) % 256) as u8,
                255,
            ])
        })
    }

    fn assert_blocks_uniform(img: &RgbaImage, block: u32) {
        let (width, height) = img.dimensions();
        for y in 0..height {
            for x in 0..width {
                let anchor = img.get_pixel((x / block) * block, (y / block) * block);
                assert_eq!(img.get_pixel(x, y), anchor, "pixel ({}, {}) differs from its block", x, y);
            }
        }
    }

    fn reference_mean(img: &RgbaImage, x0: u32, y0: u32, w: u32, h: u32) -> [f64; 3] {
        let mut acc = [0f64; 3];
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let p = img.get_pixel(x, y);
                for c in 0..3 {
                    acc[c] += p[c] as f64;
                }
            }
        }
        let n = (w * h) as f64;
        [acc[0] / n, acc[1] / n, acc[2] / n]
    }

    #[test]
    fn test_all_white_stays_white() {
        let img: RgbaImage = ImageBuffer::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let out = pixelize(&img, 10);
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out, img);
    }

    #[test]
    fn test_dimensions_and_uniform_blocks() {
        let img = pattern(37, 23);
        for block in [2, 3, 5, 7, 10, 64, 200] {
            let out = pixelize(&img, block);
            assert_eq!(out.dimensions(), img.dimensions());
            assert_blocks_uniform(&out, block);
        }
    }

    #[test]
    fn test_full_block_mean_matches_reference() {
        let img = pattern(40, 30);
        let out = pixelize(&img, 10);
        for by in 0..3 {
            for bx in 0..4 {
                let mean = reference_mean(&img, bx * 10, by * 10, 10, 10);
                let got = out.get_pixel(bx * 10 + 3, by * 10 + 7);
                for c in 0..3 {
                    assert!((got[c] as f64 - mean[c].round()).abs() <= 1.0);
                }
                assert_eq!(got[3], 255);
            }
        }
    }

    #[test]
    fn test_last_band_divides_by_remaining_rows() {
        // 10 wide, 7 tall, block 5: the last band has 2 rows, not 5
        let img: RgbaImage = ImageBuffer::from_fn(10, 7, |_, y| {
            if y < 5 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([100, 150, 200, 255])
            }
        });
        let out = pixelize(&img, 5);
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        // Dividing by the nominal 5 rows would give 40/60/80
        assert_eq!(*out.get_pixel(2, 6), Rgba([100, 150, 200, 255]));
        assert_eq!(*out.get_pixel(9, 5), Rgba([100, 150, 200, 255]));
    }

    #[test]
    fn test_last_column_divides_by_remaining_width() {
        let img: RgbaImage = ImageBuffer::from_fn(7, 5, |x, _| {
            if x < 5 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([90, 30, 60, 255])
            }
        });
        let out = pixelize(&img, 5);
        assert_eq!(*out.get_pixel(6, 4), Rgba([90, 30, 60, 255]));
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_clipped_corner_block_mean() {
        let img = pattern(23, 17);
        let out = pixelize(&img, 10);
        // Bottom-right block is 3 x 7
        let mean = reference_mean(&img, 20, 10, 3, 7);
        let got = out.get_pixel(22, 16);
        for c in 0..3 {
            assert!((got[c] as f64 - mean[c].round()).abs() <= 1.0);
        }
    }

    #[test]
    fn test_half_black_half_white_rounding() {
        let img: RgbaImage = ImageBuffer::from_fn(10, 10, |_, y| {
            if y < 5 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let nearest = pixelize_with(&img, 10, MeanRounding::Nearest);
        let truncate = pixelize_with(&img, 10, MeanRounding::Truncate);
        assert!(nearest.pixels().all(|p| *p == Rgba([128, 128, 128, 255])));
        assert!(truncate.pixels().all(|p| *p == Rgba([127, 127, 127, 255])));
        assert_eq!(pixelize(&img, 10), nearest);
    }

    #[test]
    fn test_max_block_does_not_overflow() {
        let img: RgbaImage = ImageBuffer::from_pixel(400, 250, Rgba([255, 254, 253, 255]));
        let out = pixelize(&img, 200);
        assert!(out.pixels().all(|p| *p == Rgba([255, 254, 253, 255])));
    }

    #[test]
    fn test_block_larger_than_image() {
        let img: RgbaImage = ImageBuffer::from_fn(3, 2, |x, _| Rgba([(x * 30) as u8, 0, 0, 255]));
        let out = pixelize(&img, 50);
        assert!(out.pixels().all(|p| *p == Rgba([30, 0, 0, 255])));
    }

    #[test]
    fn test_output_is_opaque() {
        let img: RgbaImage = ImageBuffer::from_pixel(8, 8, Rgba([10, 20, 30, 0]));
        let out = pixelize(&img, 4);
        assert!(out.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_zero_area_image() {
        let img = RgbaImage::new(0, 12);
        let out = pixelize(&img, 10);
        assert_eq!(out.dimensions(), (0, 12));
        assert!(out.as_raw().is_empty());
    }

    #[test]
    fn test_zero_block_size_clamps_to_one() {
        let img = pattern(9, 4);
        assert_eq!(pixelize(&img, 0), img);
        assert_eq!(pixelize(&img, 1), img);
    }

    #[test]
    fn test_repeatable() {
        let img = pattern(64, 48);
        assert_eq!(pixelize(&img, 7).as_raw(), pixelize(&img, 7).as_raw());
    }
}
