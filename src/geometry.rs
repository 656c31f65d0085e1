//! Canvas geometry: points, dirty rectangles and the display <-> image mapping.
//!
//! The core never asks a window how big it is. Callers pass explicit sizes
//! and scale factors and get image-space values back.

use serde::{Deserialize, Serialize};
use crate::error::{CensorError, Result};

/// A point in continuous pixel space. Pixel `(x, y)` covers `[x, x+1) x [y, y+1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Distance from `self` to the closed segment `a`-`b`.
    pub fn distance_to_segment(self, a: Point, b: Point) -> f64 {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq <= f64::EPSILON {
            0.0
        } else {
            (((self.x - a.x) * dx + (self.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
        };
        let (px, py) = (a.x + dx * t, a.y + dy * t);
        ((self.x - px).powi(2) + (self.y - py).powi(2)).sqrt()
    }
}

/// Axis-aligned pixel rectangle. Empty when width or height is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The whole of a `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    /// Bounding box of a disc-swept segment, clipped to a `width` x `height`
    /// image. `None` when nothing of it lands inside.
    pub fn around_segment(from: Point, to: Point, reach: f64, width: u32, height: u32) -> Option<Rect> {
        let min_x = (from.x.min(to.x) - reach).floor().max(0.0);
        let min_y = (from.y.min(to.y) - reach).floor().max(0.0);
        let max_x = (from.x.max(to.x) + reach).ceil().min(width as f64);
        let max_y = (from.y.max(to.y) + reach).ceil().min(height as f64);
        if !(min_x < max_x && min_y < max_y) {
            return None;
        }
        Some(Rect::new(
            min_x as u32,
            min_y as u32,
            (max_x - min_x) as u32,
            (max_y - min_y) as u32,
        ))
    }
}

/// Maps display-space input (what the user sees on screen) to image space.
///
/// The factor is `image_width / display_width`, applied uniformly on both
/// axes since the display always keeps the image aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMapping {
    scale: f64,
}

impl DisplayMapping {
    pub fn new(image_width: u32, display_width: u32) -> Result<Self> {
        if display_width == 0 {
            return Err(CensorError::InvalidConfig("display width must be non-zero".into()));
        }
        Ok(Self { scale: image_width as f64 / display_width as f64 })
    }

    /// Use an already computed display-to-image factor.
    pub fn from_scale(scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CensorError::InvalidConfig(format!("invalid display scale {}", scale)));
        }
        Ok(Self { scale })
    }

    pub fn identity() -> Self {
        Self { scale: 1.0 }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn to_image(&self, display: Point) -> Point {
        display.scaled(self.scale)
    }

    pub fn length_to_image(&self, display_len: f64) -> f64 {
        display_len * self.scale
    }
}

/// Largest size with the image's aspect ratio that fits inside `container`.
///
/// When the container is relatively wider than the image, height is the
/// binding dimension; otherwise width is.
pub fn fit_display_size(image: (u32, u32), container: (u32, u32)) -> (u32, u32) {
    let (iw, ih) = image;
    let (cw, ch) = container;
    if iw == 0 || ih == 0 || cw == 0 || ch == 0 {
        return (0, 0);
    }
    let image_aspect = iw as f64 / ih as f64;
    let container_aspect = cw as f64 / ch as f64;
    if container_aspect > image_aspect {
        ((image_aspect * ch as f64) as u32, ch)
    } else {
        (cw, (ih as f64 / iw as f64 * cw as f64) as u32)
    }
}
