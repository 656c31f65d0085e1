//! Censor Engine
//!
//! Owns the four layers of one open image and keeps them consistent:
//!
//! - **base**     - the photo, never modified
//! - **mask**     - painted coverage, edited by strokes
//! - **censored** - the whole photo run through the censor method; depends on
//!                  base + method config only, so it is content-addressed by
//!                  `CensorKey` and never touched by mask edits
//! - **preview**  - base blended with censored through the mask
//!
//! State machine: `Empty` --load--> `Loaded`; `load` may be repeated and always
//! replaces the whole layer set; `unload` goes back to `Empty`.
//!
//! Every mutation builds its new buffers before committing them, so an error
//! leaves the previous consistent state in place. Callers learn what to do
//! next from the returned `EngineEvent`s (redraw, mark unsaved edits) instead
//! of registering observers.

use image::RgbaImage;
use log::{debug, info, warn};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use crate::buffer;
use crate::censor::{censor, CensorMethod, MethodConfig};
use crate::compositor::{self, DisplayMode};
use crate::error::{CensorError, Result};
use crate::geometry::{DisplayMapping, Point, Rect};
use crate::mask::{MaskLayer, Stroke, StrokeMode};
use crate::pixelizer::MeanRounding;
use crate::settings::EngineSettings;
use crate::sidecar::hash_image;

/// Signals for the collaborators around the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The preview (and possibly other layers) changed; repaint.
    Redraw,
    /// The mask changed; there are unsaved edits.
    MaskEdited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Empty,
    Loaded,
}

/// Identity of a censored buffer: same key, same pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CensorKey {
    pub base_digest: String,
    pub method: CensorMethod,
    pub block_size: u32,
    pub rounding: MeanRounding,
}

impl CensorKey {
    fn new(base_digest: &str, config: &MethodConfig, rounding: MeanRounding) -> Self {
        Self {
            base_digest: base_digest.to_string(),
            method: config.method,
            block_size: config.block_size,
            rounding,
        }
    }
}

/// Result of an operation that may re-run the censor pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CensorUpdate {
    /// Time spent in the censor pass (zero when it was skipped)
    pub elapsed: Duration,
    /// Whether the censored layer was rebuilt
    pub recomputed: bool,
    pub events: Vec<EngineEvent>,
}

/// Result of a mask edit.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskUpdate {
    /// Region of the mask (and preview) that changed
    pub dirty: Option<Rect>,
    pub events: Vec<EngineEvent>,
}

impl MaskUpdate {
    fn from_dirty(dirty: Option<Rect>) -> Self {
        let events = if dirty.is_some() {
            vec![EngineEvent::MaskEdited, EngineEvent::Redraw]
        } else {
            Vec::new()
        };
        Self { dirty, events }
    }

    pub fn mask_edited(&self) -> bool {
        self.events.contains(&EngineEvent::MaskEdited)
    }
}

fn timed_censor(base: &RgbaImage, config: &MethodConfig, rounding: MeanRounding) -> Result<(RgbaImage, Duration)> {
    let start = Instant::now();
    let censored = censor(base, config, rounding)?;
    let elapsed = start.elapsed();
    debug!(
        "{:?} pass over {}x{} (block {}) took {:?}",
        config.method,
        base.width(),
        base.height(),
        config.block_size,
        elapsed
    );
    Ok((censored, elapsed))
}

struct Layers {
    base: RgbaImage,
    base_digest: String,
    mask: MaskLayer,
    censored: RgbaImage,
    censored_key: CensorKey,
    preview: RgbaImage,
    config: MethodConfig,
}

pub struct CensorEngine {
    settings: EngineSettings,
    layers: Option<Layers>,
    last_censor_time: Duration,
    censor_passes: u64,
}

impl Default for CensorEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl CensorEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            layers: None,
            last_censor_time: Duration::ZERO,
            censor_passes: 0,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn set_brush_diameter(&mut self, diameter: f64) -> Result<()> {
        if !diameter.is_finite() || diameter <= 0.0 {
            return Err(CensorError::InvalidConfig(format!("brush diameter must be positive, got {}", diameter)));
        }
        self.settings.brush_diameter = diameter;
        Ok(())
    }

    pub fn state(&self) -> EngineState {
        if self.layers.is_some() {
            EngineState::Loaded
        } else {
            EngineState::Empty
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.layers.is_some()
    }

    fn layers(&self) -> Result<&Layers> {
        self.layers.as_ref().ok_or(CensorError::NotLoaded)
    }

    fn record_pass(&mut self, elapsed: Duration) {
        self.last_censor_time = elapsed;
        self.censor_passes += 1;
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Open an image, optionally with a previously saved mask.
    ///
    /// Replaces every layer. On error the engine keeps whatever it had before.
    pub fn load(&mut self, base: RgbaImage, mask: Option<RgbaImage>, config: MethodConfig) -> Result<CensorUpdate> {
        config.validate()?;
        if let Some(mask) = &mask {
            buffer::check_dimensions(base.dimensions(), mask.dimensions())?;
        }

        let base_digest = hash_image(&base);
        let (censored, elapsed) = timed_censor(&base, &config, self.settings.rounding)?;
        self.record_pass(elapsed);
        let (width, height) = base.dimensions();
        let mask = match mask {
            Some(saved) => MaskLayer::from_image(saved),
            None => MaskLayer::new(width, height),
        }
        .with_tint(self.settings.mask_tint());
        let preview = compositor::compose(&base, mask.image(), &censored)?;

        info!(
            "Loaded {}x{} image ({:?}, block {}), saved mask: {}",
            width,
            height,
            config.method,
            config.block_size,
            !mask.is_clear()
        );

        let censored_key = CensorKey::new(&base_digest, &config, self.settings.rounding);
        self.layers = Some(Layers {
            base,
            base_digest,
            mask,
            censored,
            censored_key,
            preview,
            config,
        });

        Ok(CensorUpdate {
            elapsed,
            recomputed: true,
            events: vec![EngineEvent::Redraw],
        })
    }

    /// Switch censor method and/or block size. Mask edits are kept.
    ///
    /// An unsupported method or invalid block size is rejected and the current
    /// censored layer stays as it is.
    pub fn update_config(&mut self, config: MethodConfig) -> Result<CensorUpdate> {
        let rounding = self.settings.rounding;
        let layers = self.layers.as_mut().ok_or(CensorError::NotLoaded)?;
        if let Err(e) = config.validate() {
            warn!("Rejected config {:?}: {}", config, e);
            return Err(e);
        }

        let key = CensorKey::new(&layers.base_digest, &config, rounding);
        if layers.censored_key == key {
            debug!("Config {:?} unchanged, censored layer reused", config);
            layers.config = config;
            return Ok(CensorUpdate {
                elapsed: Duration::ZERO,
                recomputed: false,
                events: Vec::new(),
            });
        }

        let (censored, elapsed) = timed_censor(&layers.base, &config, rounding)?;
        let preview = compositor::compose(&layers.base, layers.mask.image(), &censored)?;
        layers.censored = censored;
        layers.censored_key = key;
        layers.preview = preview;
        layers.config = config;
        self.record_pass(elapsed);

        Ok(CensorUpdate {
            elapsed,
            recomputed: true,
            events: vec![EngineEvent::Redraw],
        })
    }

    pub fn set_block_size(&mut self, block_size: i64) -> Result<CensorUpdate> {
        let config = self.config()?.with_block_size(block_size);
        self.update_config(config)
    }

    pub fn set_method(&mut self, method: CensorMethod) -> Result<CensorUpdate> {
        let config = self.config()?.with_method(method);
        self.update_config(config)
    }

    /// Apply one image-space stroke to the mask and re-blend the touched area.
    /// The censored layer is never recomputed here.
    pub fn stroke(&mut self, stroke: &Stroke) -> Result<MaskUpdate> {
        let layers = self.layers.as_mut().ok_or(CensorError::NotLoaded)?;
        let dirty = layers.mask.apply_stroke(stroke);
        if let Some(rect) = dirty {
            compositor::compose_region(&mut layers.preview, &layers.base, layers.mask.image(), &layers.censored, rect)?;
            debug!("{:?} stroke dirtied {:?}", stroke.mode, rect);
        }
        Ok(MaskUpdate::from_dirty(dirty))
    }

    /// Apply a stroke given in display coordinates; `scale` is the
    /// display-to-image factor (image width / display width).
    pub fn stroke_display(&mut self, stroke: &Stroke, scale: f64) -> Result<MaskUpdate> {
        let mapping = DisplayMapping::from_scale(scale)?;
        self.stroke(&stroke.to_image_space(&mapping))
    }

    /// Stroke between two display-space pointer samples with the current brush.
    pub fn brush(&mut self, from: Point, to: Point, mode: StrokeMode, mapping: &DisplayMapping) -> Result<MaskUpdate> {
        let stroke = Stroke::new(from, to, self.settings.brush_radius(), mode);
        self.stroke(&stroke.to_image_space(mapping))
    }

    pub fn clear_mask(&mut self) -> Result<MaskUpdate> {
        let layers = self.layers.as_mut().ok_or(CensorError::NotLoaded)?;
        let dirty = layers.mask.clear();
        if let Some(rect) = dirty {
            compositor::compose_region(&mut layers.preview, &layers.base, layers.mask.image(), &layers.censored, rect)?;
        }
        Ok(MaskUpdate::from_dirty(dirty))
    }

    /// Throw away unsaved edits: replace mask and config with saved ones
    /// (or a clear mask when there is none).
    pub fn restore(&mut self, mask: Option<RgbaImage>, config: MethodConfig) -> Result<CensorUpdate> {
        let rounding = self.settings.rounding;
        let tint = self.settings.mask_tint();
        let layers = self.layers.as_mut().ok_or(CensorError::NotLoaded)?;
        config.validate()?;
        if let Some(mask) = &mask {
            buffer::check_dimensions(layers.base.dimensions(), mask.dimensions())?;
        }

        let key = CensorKey::new(&layers.base_digest, &config, rounding);
        let reuse = key == layers.censored_key;
        let (censored, elapsed) = if reuse {
            (None, Duration::ZERO)
        } else {
            let (censored, elapsed) = timed_censor(&layers.base, &config, rounding)?;
            (Some(censored), elapsed)
        };

        let (width, height) = layers.base.dimensions();
        let mask = match mask {
            Some(saved) => MaskLayer::from_image(saved),
            None => MaskLayer::new(width, height),
        }
        .with_tint(tint);
        let preview = {
            let censored_ref = censored.as_ref().unwrap_or(&layers.censored);
            compositor::compose(&layers.base, mask.image(), censored_ref)?
        };

        if let Some(censored) = censored {
            layers.censored = censored;
            layers.censored_key = key;
        }
        layers.mask = mask;
        layers.preview = preview;
        layers.config = config;
        if !reuse {
            self.record_pass(elapsed);
        }
        info!("Restored saved state ({:?}, block {})", config.method, config.block_size);

        Ok(CensorUpdate {
            elapsed,
            recomputed: !reuse,
            events: vec![EngineEvent::Redraw],
        })
    }

    /// Close the image and drop every layer.
    pub fn unload(&mut self) {
        if self.layers.take().is_some() {
            info!("Image unloaded");
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn config(&self) -> Result<MethodConfig> {
        Ok(self.layers()?.config)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.layers.as_ref().map(|l| l.base.dimensions())
    }

    pub fn base(&self) -> Result<&RgbaImage> {
        Ok(&self.layers()?.base)
    }

    /// SHA-256 of the loaded base image (dimensions + pixels).
    pub fn base_digest(&self) -> Result<&str> {
        Ok(&self.layers()?.base_digest)
    }

    pub fn mask(&self) -> Result<&RgbaImage> {
        Ok(self.layers()?.mask.image())
    }

    pub fn mask_layer(&self) -> Result<&MaskLayer> {
        Ok(&self.layers()?.mask)
    }

    pub fn censored(&self) -> Result<&RgbaImage> {
        Ok(&self.layers()?.censored)
    }

    /// The blended result: what gets exported.
    pub fn final_image(&self) -> Result<&RgbaImage> {
        Ok(&self.layers()?.preview)
    }

    /// Duration of the most recent censor pass.
    pub fn last_censor_time(&self) -> Duration {
        self.last_censor_time
    }

    /// Number of censor passes run by this engine so far.
    pub fn censor_pass_count(&self) -> u64 {
        self.censor_passes
    }

    /// The buffer a renderer should draw for `mode`.
    pub fn view(&self, mode: DisplayMode) -> Result<Cow<'_, RgbaImage>> {
        let layers = self.layers()?;
        Ok(match mode {
            DisplayMode::Original => Cow::Borrowed(&layers.base),
            DisplayMode::FullyCensored => Cow::Borrowed(&layers.censored),
            DisplayMode::MaskOnly => Cow::Borrowed(layers.mask.image()),
            DisplayMode::MaskOnImage => Cow::Owned(compositor::overlay_mask(&layers.base, layers.mask.image())?),
            DisplayMode::FinalPreview => Cow::Borrowed(&layers.preview),
        })
    }

    /// Owned copy of an exportable layer.
    pub fn export(&self, mode: DisplayMode) -> Result<RgbaImage> {
        if !mode.is_export_target() {
            return Err(CensorError::NotExportable(mode));
        }
        Ok(self.view(mode)?.into_owned())
    }
}
