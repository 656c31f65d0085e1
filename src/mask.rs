//! Paintable censor mask.
//!
//! The mask is an RGBA buffer the size of the base image. Its alpha channel is
//! the censor coverage (0 = keep original, 255 = fully censored); RGB only
//! carries the tint used when the mask is drawn over the photo for editing.
//!
//! Strokes are round-capped segments. Each stroke touches every pixel at most
//! once, with coverage taken from the distance between the pixel centre and
//! the segment, so consecutive pointer samples join into a continuous line
//! however far apart they are.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use crate::buffer::{self, TRANSPARENT};
use crate::geometry::{DisplayMapping, Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeMode {
    /// Accumulate coverage (source-over), capped at fully opaque.
    Paint,
    /// Clear the mask to fully transparent along the path.
    Erase,
}

/// One brush segment in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub from: Point,
    pub to: Point,
    pub radius: f64,
    pub mode: StrokeMode,
}

impl Stroke {
    pub fn new(from: Point, to: Point, radius: f64, mode: StrokeMode) -> Self {
        Self { from, to, radius, mode }
    }

    pub fn paint(from: Point, to: Point, radius: f64) -> Self {
        Self::new(from, to, radius, StrokeMode::Paint)
    }

    pub fn erase(from: Point, to: Point, radius: f64) -> Self {
        Self::new(from, to, radius, StrokeMode::Erase)
    }

    /// A single dab: a zero-length segment.
    pub fn dab(at: Point, radius: f64, mode: StrokeMode) -> Self {
        Self::new(at, at, radius, mode)
    }

    /// Convert a stroke given in display coordinates to image space.
    pub fn to_image_space(self, mapping: &DisplayMapping) -> Self {
        Self {
            from: mapping.to_image(self.from),
            to: mapping.to_image(self.to),
            radius: mapping.length_to_image(self.radius),
            mode: self.mode,
        }
    }

    /// Anti-aliased coverage of the pixel whose top-left corner is `(x, y)`.
    #[inline]
    fn coverage(&self, x: u32, y: u32) -> f64 {
        let centre = Point::new(x as f64 + 0.5, y as f64 + 0.5);
        let d = centre.distance_to_segment(self.from, self.to);
        (self.radius + 0.5 - d).clamp(0.0, 1.0)
    }
}

/// The "censor here" layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskLayer {
    pixels: RgbaImage,
    tint: [u8; 3],
}

impl MaskLayer {
    /// Fully transparent mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: buffer::transparent(width, height),
            tint: [0, 0, 0],
        }
    }

    /// Wrap a previously saved mask. Its alpha channel is taken as coverage.
    pub fn from_image(pixels: RgbaImage) -> Self {
        Self { pixels, tint: [0, 0, 0] }
    }

    pub fn with_tint(mut self, tint: [u8; 3]) -> Self {
        self.tint = tint;
        self
    }

    pub fn tint(&self) -> [u8; 3] {
        self.tint
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Coverage at `(x, y)`, 0 outside the mask.
    pub fn coverage(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel_checked(x, y).map(|p| p[3]).unwrap_or(0)
    }

    pub fn is_clear(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    /// Make the whole mask transparent. Returns the full rect when anything changed.
    pub fn clear(&mut self) -> Option<Rect> {
        if self.pixels.pixels().all(|p| *p == TRANSPARENT) {
            return None;
        }
        for p in self.pixels.pixels_mut() {
            *p = TRANSPARENT;
        }
        let (width, height) = self.dimensions();
        Some(Rect::full(width, height))
    }

    /// Rasterise one stroke into the mask.
    ///
    /// Returns the bounding box of the pixels that actually changed, or `None`
    /// if the stroke missed the mask or changed nothing.
    pub fn apply_stroke(&mut self, stroke: &Stroke) -> Option<Rect> {
        if !stroke.radius.is_finite() || stroke.radius <= 0.0 {
            return None;
        }
        let (width, height) = self.dimensions();
        let area = Rect::around_segment(stroke.from, stroke.to, stroke.radius + 1.0, width, height)?;

        let mut changed: Option<(u32, u32, u32, u32)> = None;
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let c = stroke.coverage(x, y);
                if c <= 0.0 {
                    continue;
                }
                let px = self.pixels.get_pixel_mut(x, y);
                let updated = match stroke.mode {
                    StrokeMode::Paint => {
                        let a = px[3];
                        let added = ((255 - a) as f64 * c).round() as u8;
                        if added == 0 {
                            continue;
                        }
                        Rgba([self.tint[0], self.tint[1], self.tint[2], a.saturating_add(added)])
                    }
                    StrokeMode::Erase => TRANSPARENT,
                };
                if *px == updated {
                    continue;
                }
                *px = updated;
                changed = Some(match changed {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }

        changed.map(|(x0, y0, x1, y1)| Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }
}
