//! gazecal CLI: marker detection on stills and offline session replay.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use gazecal::core::default_sink;
use gazecal::detect::detect_markers;
use gazecal::frames::ImageDirectorySource;
use gazecal::marker::{DetectorConfig, RingDetectorParams, ScreenCornerParams};
use gazecal::session::{
    CalibrationConfig, Calibrator, FixationEvent, FrameSource, InputEvent, JsonReportFinisher, Key,
    PupilSample, RunMode,
};
use serde::de::DeserializeOwned;
use log::LevelFilter;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "gazecal")]
#[command(about = "Detect screen calibration markers and replay calibration sessions")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit structured JSON logs.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect markers in a single image and print them as JSON.
    Detect(DetectArgs),

    /// Replay a directory of frames through a calibration session.
    Replay(ReplayArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    Rings,
    Screen,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Calibration,
    Accuracy,
}

#[derive(Debug, Args)]
struct DetectArgs {
    /// Path to the input image.
    image: PathBuf,

    #[arg(long, value_enum, default_value_t = Strategy::Rings)]
    strategy: Strategy,

    /// Write the markers here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    /// Directory of frames, replayed in file-name order.
    #[arg(long)]
    frames: PathBuf,

    /// Calibration config (JSON). Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pupil samples (JSON array), delivered with the first frame at or after
    /// their timestamp.
    #[arg(long)]
    gaze: Option<PathBuf>,

    /// Fixation events (JSON array), delivered like `--gaze`. A fixation
    /// inside the sampling window shortens the remaining dwell.
    #[arg(long)]
    fixations: Option<PathBuf>,

    /// Press the ready key on every frame.
    #[arg(long)]
    ready_every_frame: bool,

    /// Override the run mode from the config.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Override the site shuffle seed from the config.
    #[arg(long)]
    seed: Option<u64>,

    /// Frame rate used to stamp the replayed frames.
    #[arg(long, default_value = "30.0")]
    fps: f64,

    /// Directory for the session report.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Replay(args) => run_replay(&args),
    }
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) -> CliResult<()> {
    gazecal::core::init_tracing(cli.json_logs);
    log::set_max_level(log_level(cli.verbose));
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) -> CliResult<()> {
    gazecal::core::init_with_level(log_level(cli.verbose))?;
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &DetectArgs) -> CliResult<()> {
    log::info!("Loading image: {}", args.image.display());
    let img = image::open(&args.image)?.to_luma8();
    log::info!("Image size: {}x{}", img.width(), img.height());

    let config = match args.strategy {
        Strategy::Rings => DetectorConfig::Rings(RingDetectorParams::default()),
        Strategy::Screen => DetectorConfig::ScreenCorners(ScreenCornerParams::default()),
    };
    let markers = detect_markers(&img, &config, default_sink());
    log::info!("Detected {} marker(s)", markers.len());

    let json = serde_json::to_string_pretty(&markers)?;
    match &args.out {
        Some(path) => {
            fs::write(path, &json)?;
            log::info!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── replay ─────────────────────────────────────────────────────────────

fn run_replay(args: &ReplayArgs) -> CliResult<()> {
    let mut config = match &args.config {
        Some(path) => CalibrationConfig::load_json(path)?,
        None => CalibrationConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.set_run_mode(match mode {
            ModeArg::Calibration => RunMode::Calibration,
            ModeArg::Accuracy => RunMode::Accuracy,
        });
    }
    if args.seed.is_some() {
        config.shuffle_seed = args.seed;
    }

    let mut gaze = load_events::<PupilSample>(args.gaze.as_deref())?;
    gaze.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    let mut gaze = gaze.into_iter().peekable();

    let mut fixations = load_events::<FixationEvent>(args.fixations.as_deref())?;
    fixations.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    let mut fixations = fixations.into_iter().peekable();

    let mut source = ImageDirectorySource::new(&args.frames, args.fps)?;
    log::info!(
        "Replaying {} frame(s) from {}",
        source.remaining(),
        args.frames.display()
    );

    let finisher = JsonReportFinisher::new(&args.out);
    let mut calibrator = Calibrator::new(config, finisher, default_sink())?;
    calibrator.start(&source)?;

    let mut ticks = 0usize;
    while calibrator.is_active() {
        let Some(frame) = source.next_frame() else {
            break;
        };
        let pupil: Vec<PupilSample> =
            std::iter::from_fn(|| gaze.next_if(|s| s.timestamp <= frame.timestamp)).collect();
        let fixated: Vec<FixationEvent> =
            std::iter::from_fn(|| fixations.next_if(|f| f.timestamp <= frame.timestamp)).collect();
        if args.ready_every_frame {
            calibrator.push_event(InputEvent::KeyDown(Key::Space));
        }
        if let Some(snapshot) = calibrator.process_frame(&frame.as_frame(), &pupil, &fixated)? {
            log::debug!(
                "frame {}: {} progress {} detected {}",
                frame.index,
                snapshot.status_text,
                snapshot.progress,
                snapshot.detected
            );
        }
        ticks += 1;
    }

    if calibrator.is_active() {
        log::warn!("frames ran out before the session finished, stopping");
        calibrator.stop()?;
    }

    let outcome = calibrator.session().and_then(|s| s.outcome());
    let refs = calibrator
        .session()
        .map_or(0, |s| s.samples().ref_list.len());
    match outcome {
        Some(outcome) => println!("{outcome:?} after {ticks} frame(s), {refs} reference point(s)"),
        None => println!("no session ran"),
    }
    for path in calibrator.finisher().written() {
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// A JSON array of events, or nothing when no file was given.
fn load_events<T: DeserializeOwned>(path: Option<&Path>) -> CliResult<Vec<T>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
