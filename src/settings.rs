//! Engine settings.
//!
//! Plain serde structs with defaults matching the stock canvas: 15 px blocks,
//! a 50 px brush and a black mask tint. A settings file may list any subset
//! of the fields; missing ones fall back to their defaults.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use crate::censor::{clamp_block_size, CensorMethod, MethodConfig, DEFAULT_BLOCK_SIZE};
use crate::error::{CensorError, Result};
use crate::pixelizer::MeanRounding;

pub const DEFAULT_BRUSH_DIAMETER: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    /// Block size used when an image is opened without saved state
    pub default_block_size: u32,
    /// Method used when an image is opened without saved state
    pub default_method: CensorMethod,
    /// Brush diameter in display pixels
    pub brush_diameter: f64,
    /// RGB written into painted mask pixels (visible in the mask views only)
    pub mask_tint: (u8, u8, u8),
    /// How block means are rounded to 8 bits
    pub rounding: MeanRounding,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_block_size: DEFAULT_BLOCK_SIZE,
            default_method: CensorMethod::Pixelize,
            brush_diameter: DEFAULT_BRUSH_DIAMETER,
            mask_tint: (0, 0, 0),
            rounding: MeanRounding::Nearest,
        }
    }
}

impl EngineSettings {
    /// Read settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: EngineSettings = serde_json::from_str(&content)?;
        settings.validated()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Clamp ranged values; reject values that have no sensible fallback.
    pub fn validated(mut self) -> Result<Self> {
        self.default_block_size = clamp_block_size(self.default_block_size as i64);
        if !self.brush_diameter.is_finite() || self.brush_diameter <= 0.0 {
            return Err(CensorError::InvalidConfig(format!(
                "brush diameter must be positive, got {}",
                self.brush_diameter
            )));
        }
        if !self.default_method.is_implemented() {
            warn!("default method {:?} is not implemented, falling back to pixelize", self.default_method);
            self.default_method = CensorMethod::Pixelize;
        }
        Ok(self)
    }

    /// Method config for an image with no saved state.
    pub fn initial_config(&self) -> MethodConfig {
        MethodConfig::new(self.default_method, self.default_block_size as i64)
    }

    pub fn brush_radius(&self) -> f64 {
        self.brush_diameter / 2.0
    }

    pub fn mask_tint(&self) -> [u8; 3] {
        let (r, g, b) = self.mask_tint;
        [r, g, b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.default_block_size, 15);
        assert_eq!(settings.brush_diameter, 50.0);
        assert_eq!(settings.brush_radius(), 25.0);
        assert_eq!(settings.rounding, MeanRounding::Nearest);
        assert_eq!(settings.initial_config(), MethodConfig::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "defaultBlockSize": 40, "rounding": "truncate" }"#).unwrap();
        assert_eq!(settings.default_block_size, 40);
        assert_eq!(settings.rounding, MeanRounding::Truncate);
        assert_eq!(settings.brush_diameter, 50.0);
        assert_eq!(settings.mask_tint, (0, 0, 0));
    }

    #[test]
    fn test_validated_clamps_and_rejects() {
        let settings = EngineSettings {
            default_block_size: 900,
            default_method: CensorMethod::White,
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(settings.default_block_size, 200);
        assert_eq!(settings.default_method, CensorMethod::Pixelize);

        let bad = EngineSettings { brush_diameter: 0.0, ..Default::default() };
        assert!(bad.validated().is_err());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let path = std::env::temp_dir().join("censor_me_test_settings.json");
        let _ = fs::remove_file(&path);

        assert_eq!(EngineSettings::load(&path).unwrap(), EngineSettings::default());

        let settings = EngineSettings { brush_diameter: 12.0, mask_tint: (255, 0, 255), ..Default::default() };
        settings.save(&path).unwrap();
        assert_eq!(EngineSettings::load(&path).unwrap(), settings);

        let _ = fs::remove_file(&path);
    }
}
