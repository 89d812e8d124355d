//! tinyland CLI: run the projector loop, print the calibration pattern, or
//! locate calibration corners in a still frame.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tinyland::calib::{calibration_pattern, CornerDetector, CornerDetectorParams, PatternParams};
use tinyland::compositor::Compositor;
use tinyland::core::LogSpec;
use tinyland::tracker::{MarkerDetector, RecordedDetector};
use tinyland::{
    install_stop_handler, run, Config, ImageSequence, Landscape, MarkerApp, RendererKind,
    RunOptions,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "tinyland")]
#[command(about = "Projector-camera calibration and fiducial marker tracking")]
#[command(version)]
struct Cli {
    /// Log levels, e.g. `info` or `warn,tinyland_calib=debug`.
    #[arg(
        long = "log",
        visible_alias = "log-level",
        global = true,
        env = "TINYLAND_LOG",
        default_value = "info"
    )]
    log: LogSpec,

    /// Emit JSON logs (requires the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the frame loop.
    Run(RunArgs),

    /// Write the calibration pattern the projector should show.
    Pattern {
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long)]
        out: PathBuf,
    },

    /// Find the calibration quad in one camera frame and print it as JSON.
    Corners {
        #[arg(long)]
        image: PathBuf,
        /// Optional config to take detector parameters from.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Path to the TOML config.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override `RENDERER`.
    #[arg(long, value_enum)]
    renderer: Option<RendererKind>,

    /// Override `VIDEO_FILE_PATH`.
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Override `DETECTIONS_PATH`.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Request a calibration on the first frame.
    #[arg(long)]
    calibrate: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn init_logging(spec: LogSpec, json: bool) {
    #[cfg(feature = "tracing")]
    {
        tinyland::core::init_tracing(&spec, json);
        // No-op when the subscriber already bridged `log`.
        let _ = tracing_log::LogTracer::init();
    }
    #[cfg(not(feature = "tracing"))]
    {
        if json {
            eprintln!("--json-logs needs the `tracing` feature; using plain logs");
        }
        let _ = tinyland::core::init_logging(spec);
    }
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log, cli.json_logs);

    let result = match cli.command {
        Commands::Run(args) => run_loop(args),
        Commands::Pattern { width, height, out } => write_pattern(width, height, &out),
        Commands::Corners { image, config } => print_corners(&image, config.as_deref()),
    };
    if let Err(err) = &result {
        log::error!("{err}");
    }
    result
}

fn run_loop(args: RunArgs) -> CliResult<()> {
    let mut config = Config::from_path(&args.config)?;
    if let Some(kind) = args.renderer {
        config.renderer = kind;
    }
    if args.frames.is_some() {
        config.video_file_path = args.frames;
    }
    if args.detections.is_some() {
        config.detections_path = args.detections;
    }
    config.calibrate |= args.calibrate;

    let frames_path = config
        .video_file_path
        .clone()
        .ok_or("no frame source: set VIDEO_FILE_PATH or pass --frames")?;
    let mut source = ImageSequence::open(&frames_path)?;

    let detector: Box<dyn MarkerDetector> = match &config.detections_path {
        Some(path) => Box::new(RecordedDetector::from_path(path)?),
        None => live_detector()?,
    };

    let mut compositor = Compositor::with_builtins();
    for (id, template) in config.marker_templates()? {
        compositor.insert(id, template);
    }

    let mut renderer = config.renderer.build(&config);
    let mut landscape = Landscape::new(config, detector)?;
    let mut app = MarkerApp::new(compositor);
    let options = RunOptions {
        max_frames: args.max_frames,
        stop: install_stop_handler()?,
    };

    let stats = run(&mut landscape, &mut source, &mut renderer, &mut app, &options)?;
    println!(
        "{} frames, {} markers, {} calibration frames",
        stats.frames, stats.markers, stats.calibration_frames
    );
    Ok(())
}


#[cfg(feature = "apriltag")]
fn live_detector() -> CliResult<Box<dyn MarkerDetector>> {
    log::info!("decoding tag36h11 markers from frames");
    Ok(Box::new(tinyland::tracker::AprilTagDetector::new(1)?))
}

#[cfg(not(feature = "apriltag"))]
fn live_detector() -> CliResult<Box<dyn MarkerDetector>> {
    log::warn!("no DETECTIONS_PATH and no `apriltag` feature; no markers will be reported");
    Ok(Box::new(tinyland::tracker::NullDetector))
}
fn write_pattern(width: u32, height: u32, out: &std::path::Path) -> CliResult<()> {
    calibration_pattern(width, height, &PatternParams::default()).save(out)?;
    println!("wrote calibration pattern to {}", out.display());
    Ok(())
}

fn print_corners(frame_path: &std::path::Path, config: Option<&std::path::Path>) -> CliResult<()> {
    let params = match config {
        Some(path) => Config::from_path(path)?.corner_detector,
        None => CornerDetectorParams::default(),
    };
    let frame = image::open(frame_path)?.to_rgb8();
    let quad = CornerDetector::new(params)
        .detect(&frame)
        .ok_or("calibration rings not found")?;
    println!("{}", serde_json::to_string_pretty(&quad)?);
    Ok(())
}
