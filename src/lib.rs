//! Mask-driven image censoring.
//!
//! A `CensorEngine` holds one photo, a paintable mask, the fully censored
//! (pixelized) photo and the blended preview, and keeps them in sync as the
//! mask is painted or the censor settings change.

pub mod buffer;
pub mod censor;
pub mod compositor;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod mask;
pub mod pixelizer;
pub mod settings;
pub mod sidecar;

pub use censor::{CensorMethod, MethodConfig, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
pub use compositor::DisplayMode;
pub use engine::{CensorEngine, CensorUpdate, EngineEvent, EngineState, MaskUpdate};
pub use error::{CensorError, Result};
pub use geometry::{DisplayMapping, Point, Rect};
pub use mask::{MaskLayer, Stroke, StrokeMode};
pub use pixelizer::{pixelize, MeanRounding};
pub use settings::EngineSettings;
pub use sidecar::{SavedState, SidecarStore};
