//! Censor method selection and dispatch.
//!
//! Only pixelization is implemented. Gaussian blur and solid white fill are
//! part of the method enum (and of the persisted record) so stored configs
//! stay readable, but asking for them yields `UnsupportedMethod`.

use image::RgbaImage;
use log::warn;
use serde::{Deserialize, Serialize};
use crate::error::{CensorError, Result};
use crate::pixelizer::{pixelize_with, MeanRounding};

pub const MIN_BLOCK_SIZE: u32 = 2;
pub const MAX_BLOCK_SIZE: u32 = 200;
pub const DEFAULT_BLOCK_SIZE: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CensorMethod {
    #[default]
    Pixelize,
    GaussianBlur,
    White,
}

impl CensorMethod {
    /// Integer code used in the persisted sidecar record.
    pub fn code(self) -> i64 {
        match self {
            CensorMethod::Pixelize => 0,
            CensorMethod::GaussianBlur => 1,
            CensorMethod::White => 2,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(CensorMethod::Pixelize),
            1 => Ok(CensorMethod::GaussianBlur),
            2 => Ok(CensorMethod::White),
            other => Err(CensorError::InvalidConfig(format!("unknown censor method code {}", other))),
        }
    }

    pub fn is_implemented(self) -> bool {
        matches!(self, CensorMethod::Pixelize)
    }
}

/// Clamp a block size into `[MIN_BLOCK_SIZE, MAX_BLOCK_SIZE]`.
pub fn clamp_block_size(block_size: i64) -> u32 {
    let clamped = block_size.clamp(MIN_BLOCK_SIZE as i64, MAX_BLOCK_SIZE as i64) as u32;
    if clamped as i64 != block_size {
        warn!(
            "block size {} outside [{}, {}], using {}",
            block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE, clamped
        );
    }
    clamped
}

/// Which censor method to run and with what block size.
/// `block_size` only affects `Pixelize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodConfig {
    pub method: CensorMethod,
    pub block_size: u32,
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            method: CensorMethod::Pixelize,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl MethodConfig {
    /// Build a config, clamping the block size into range.
    pub fn new(method: CensorMethod, block_size: i64) -> Self {
        Self {
            method,
            block_size: clamp_block_size(block_size),
        }
    }

    pub fn pixelize(block_size: i64) -> Self {
        Self::new(CensorMethod::Pixelize, block_size)
    }

    pub fn with_block_size(self, block_size: i64) -> Self {
        Self::new(self.method, block_size)
    }

    pub fn with_method(self, method: CensorMethod) -> Self {
        Self { method, ..self }
    }

    /// Reject configs that cannot be run as-is.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(CensorError::InvalidConfig(format!(
                "block size {} outside [{}, {}]",
                self.block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        if !self.method.is_implemented() {
            return Err(CensorError::UnsupportedMethod(self.method));
        }
        Ok(())
    }
}

/// Produce the fully censored version of `base`.
pub fn censor(base: &RgbaImage, config: &MethodConfig, rounding: MeanRounding) -> Result<RgbaImage> {
    config.validate()?;
    match config.method {
        CensorMethod::Pixelize => Ok(pixelize_with(base, config.block_size, rounding)),
        CensorMethod::GaussianBlur | CensorMethod::White => Err(CensorError::UnsupportedMethod(config.method)),
    }
}
