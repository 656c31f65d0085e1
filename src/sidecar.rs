//! Sidecar Persistence
//!
//! Saved edits live next to the photo in a `CensorMeData/` folder:
//! - `<file name>.mask.png` - the mask layer (alpha = coverage)
//! - `<file name>.json`     - method, block size, image hash, save time
//!
//! The photo itself is never written.

use image::RgbaImage;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use crate::buffer;
use crate::censor::{CensorMethod, MethodConfig};
use crate::error::{CensorError, Result};

pub const SIDECAR_DIR: &str = "CensorMeData";

/// The JSON half of a sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarRecord {
    /// 0 = pixelize, 1 = gaussian blur, 2 = white
    pub method: i64,
    pub block_size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    /// RFC3339 timestamp of the save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<String>,
}

impl SidecarRecord {
    pub fn new(config: &MethodConfig, image_hash: Option<String>) -> Self {
        Self {
            method: config.method.code(),
            block_size: config.block_size as i64,
            image_hash,
            saved: Some(now_iso()),
        }
    }

    /// Decode into a method config. The block size is clamped into range;
    /// unknown method codes are rejected.
    pub fn config(&self) -> Result<MethodConfig> {
        let method = CensorMethod::from_code(self.method)?;
        Ok(MethodConfig::new(method, self.block_size))
    }
}

/// Everything restored from a sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedState {
    /// `None` when only the JSON record exists
    pub mask: Option<RgbaImage>,
    pub config: MethodConfig,
    pub image_hash: Option<String>,
}

/// Sidecar file locations for one image.
#[derive(Debug, Clone)]
pub struct SidecarStore {
    dir: PathBuf,
    mask_path: PathBuf,
    record_path: PathBuf,
}

impl SidecarStore {
    pub fn for_image(image_path: &Path) -> Result<Self> {
        let file_name = image_path
            .file_name()
            .ok_or_else(|| CensorError::InvalidConfig(format!("{} has no file name", image_path.display())))?
            .to_string_lossy()
            .into_owned();
        let parent = image_path.parent().unwrap_or_else(|| Path::new(""));
        let dir = parent.join(SIDECAR_DIR);
        Ok(Self {
            mask_path: dir.join(format!("{}.mask.png", file_name)),
            record_path: dir.join(format!("{}.json", file_name)),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mask_path(&self) -> &Path {
        &self.mask_path
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    pub fn exists(&self) -> bool {
        self.record_path.exists()
    }

    /// Read the saved state, if any.
    ///
    /// `dimensions` is the size of the image the mask must match. When
    /// `current_hash` is given and differs from the stored one the photo has
    /// changed since the save; that is logged but not fatal.
    pub fn load(&self, dimensions: (u32, u32), current_hash: Option<&str>) -> Result<Option<SavedState>> {
        if !self.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.record_path)?;
        let record: SidecarRecord = serde_json::from_str(&content)?;
        let config = record.config()?;

        if let (Some(stored), Some(current)) = (record.image_hash.as_deref(), current_hash) {
            if stored != current {
                warn!("{} was saved for different image content", self.record_path.display());
            }
        }

        let mask = if self.mask_path.exists() {
            let mask = image::open(&self.mask_path)?.to_rgba8();
            buffer::check_dimensions(dimensions, mask.dimensions())?;
            Some(mask)
        } else {
            None
        };

        info!(
            "Restored sidecar {} ({:?}, block {}, mask: {})",
            self.record_path.display(),
            config.method,
            config.block_size,
            mask.is_some()
        );
        Ok(Some(SavedState {
            mask,
            config,
            image_hash: record.image_hash,
        }))
    }

    /// Write mask PNG and JSON record, creating the sidecar folder if needed.
    pub fn save(&self, mask: &RgbaImage, config: &MethodConfig, image_hash: Option<&str>) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        mask.save(&self.mask_path)?;
        let record = SidecarRecord::new(config, image_hash.map(str::to_string));
        fs::write(&self.record_path, serde_json::to_string_pretty(&record)?)?;
        info!("Saved sidecar {}", self.record_path.display());
        Ok(())
    }
}

/// SHA-256 of arbitrary bytes, hex encoded.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Content hash of a decoded image: dimensions plus raw RGBA bytes.
pub fn hash_image(image: &RgbaImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update(image.as_raw());
    format!("{:x}", hasher.finalize())
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
