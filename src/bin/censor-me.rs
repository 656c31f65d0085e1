// ============================================================================
// censor-me CLI: headless censoring of a single image
// ============================================================================
//
// Usage examples:
//   censor-me -i photo.jpg --stroke 100,80,340,80,20 -o out.png
//   censor-me -i photo.jpg --block-size 30 --mode censored
//   censor-me -i photo.jpg --stroke 10,10,200,200 --erase 50,50,60,60 --save-sidecar
//
// Saved masks are picked up from (and written to) the CensorMeData/ folder
// next to the input.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::path::{Path, PathBuf};

use censor_me::sidecar::{hash_image, SidecarStore};
use censor_me::{CensorEngine, CensorMethod, DisplayMode, EngineSettings, Point, Stroke, StrokeMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Photo blended with the censored layer through the mask
    Final,
    /// The whole photo censored
    Censored,
    Original,
    Mask,
    MaskOnImage,
}

impl From<ModeArg> for DisplayMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Final => DisplayMode::FinalPreview,
            ModeArg::Censored => DisplayMode::FullyCensored,
            ModeArg::Original => DisplayMode::Original,
            ModeArg::Mask => DisplayMode::MaskOnly,
            ModeArg::MaskOnImage => DisplayMode::MaskOnImage,
        }
    }
}

/// A stroke segment in image pixels: `x0,y0,x1,y1[,radius]`.
#[derive(Debug, Clone, Copy)]
struct StrokeArg {
    from: Point,
    to: Point,
    radius: Option<f64>,
}

fn parse_stroke(s: &str) -> Result<StrokeArg, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [x0, y0, x1, y1] => Ok(StrokeArg { from: Point::new(*x0, *y0), to: Point::new(*x1, *y1), radius: None }),
        [x0, y0, x1, y1, r] => Ok(StrokeArg {
            from: Point::new(*x0, *y0),
            to: Point::new(*x1, *y1),
            radius: Some(*r),
        }),
        _ => Err(format!("expected x0,y0,x1,y1[,radius], got '{}'", s)),
    }
}

#[derive(Parser, Debug)]
#[command(name = "censor-me", about = "Pixelize the painted parts of an image")]
struct CliArgs {
    /// Image to censor
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Where to write the result (PNG). Defaults to `<stem>.censored.png` next to the input.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Which layer to write
    #[arg(short, long, value_enum, default_value_t = ModeArg::Final)]
    mode: ModeArg,

    /// Pixelization block size (clamped to 2..=200)
    #[arg(short, long)]
    block_size: Option<i64>,

    /// JSON settings file
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Paint a stroke into the mask; repeatable. Radius defaults to half the brush diameter.
    #[arg(long, value_name = "X0,Y0,X1,Y1[,R]", value_parser = parse_stroke)]
    stroke: Vec<StrokeArg>,

    /// Erase a stroke from the mask; repeatable. Applied after all painted strokes.
    #[arg(long, value_name = "X0,Y0,X1,Y1[,R]", value_parser = parse_stroke)]
    erase: Vec<StrokeArg>,

    /// Write mask and settings to the sidecar folder afterwards
    #[arg(long)]
    save_sidecar: bool,

    /// Ignore any saved mask and settings
    #[arg(long)]
    no_sidecar: bool,
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "image".into());
    input.with_file_name(format!("{}.censored.png", stem))
}

fn run(args: &CliArgs) -> anyhow::Result<()> {
    let settings = match &args.settings {
        Some(path) => EngineSettings::load(path).with_context(|| format!("reading settings {}", path.display()))?,
        None => EngineSettings::default(),
    };

    let base = image::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?
        .to_rgba8();
    let store = SidecarStore::for_image(&args.input)?;
    let digest = hash_image(&base);

    let saved = if args.no_sidecar {
        None
    } else {
        store.load(base.dimensions(), Some(digest.as_str()))?
    };
    let (mask, mut config) = match saved {
        Some(saved) => (saved.mask, saved.config),
        None => (None, settings.initial_config()),
    };
    if let Some(block_size) = args.block_size {
        config = config.with_block_size(block_size);
    }
    if !config.method.is_implemented() {
        warn!("{:?} is not available, using pixelize", config.method);
        config = config.with_method(CensorMethod::Pixelize);
    }

    let mut engine = CensorEngine::new(settings);
    let update = engine.load(base, mask, config)?;
    println!(
        "Pixelization ({}x{}, block {}) took {:.1} ms",
        engine.dimensions().map(|d| d.0).unwrap_or(0),
        engine.dimensions().map(|d| d.1).unwrap_or(0),
        config.block_size,
        update.elapsed.as_secs_f64() * 1000.0
    );

    let default_radius = engine.settings().brush_radius();
    let strokes = args
        .stroke
        .iter()
        .map(|s| (s, StrokeMode::Paint))
        .chain(args.erase.iter().map(|s| (s, StrokeMode::Erase)));
    let mut edits = 0;
    for (s, mode) in strokes {
        let radius = s.radius.unwrap_or(default_radius);
        if !(radius.is_finite() && radius > 0.0) {
            bail!("stroke radius must be positive, got {}", radius);
        }
        if engine.stroke(&Stroke::new(s.from, s.to, radius, mode))?.mask_edited() {
            edits += 1;
        }
    }
    if edits > 0 {
        info!("{} stroke(s) changed the mask", edits);
    }

    let mode = DisplayMode::from(args.mode);
    let out = if mode.is_export_target() {
        engine.export(mode)?
    } else {
        engine.view(mode)?.into_owned()
    };
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.input));
    out.save(&output).with_context(|| format!("writing {}", output.display()))?;
    println!("{} -> {}", mode.label(), output.display());

    if args.save_sidecar {
        store.save(engine.mask()?, &engine.config()?, Some(engine.base_digest()?))?;
        println!("Saved edits to {}", store.dir().display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let args = CliArgs::parse();
    run(&args)
}
