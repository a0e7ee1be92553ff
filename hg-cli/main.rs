//! `hg`: locate a planar object inside a scene image.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use hg_cli::hg_core::KeypointSet;
use hg_cli::hg_detect::FastPatchExtractor;
use hg_cli::{decode_luma, ErrorKind, MatchPipeline, PipelineConfig};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

/// Exit status when the pipeline ran but could not locate the object.
const EXIT_NOT_LOCATED: u8 = 2;

#[derive(Parser)]
#[command(name = "hg")]
#[command(about = "Locate a planar object in a scene by feature matching and homography fitting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate the object image inside the scene and write the corner vertices.
    Locate(LocateArgs),

    /// Detect keypoints in an image and write them as a JSON keypoint file.
    Keypoints(KeypointsArgs),
}

#[derive(Debug, Clone, Args)]
struct LocateArgs {
    /// Precomputed scene keypoints (JSON keypoint file).
    scene_keypoints: PathBuf,

    /// Scene image.
    scene_image: PathBuf,

    /// Object image to locate.
    object_image: PathBuf,

    /// Where to write the result (JSON).
    output_data: PathBuf,

    /// Also write a side-by-side match visualization.
    #[arg(short = 'i', long)]
    output_image: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Debug, Clone, Args)]
struct KeypointsArgs {
    /// Input image.
    image: PathBuf,

    /// Where to write the keypoint file (JSON).
    keypoint_file: PathBuf,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Debug, Clone, Args)]
struct TuningArgs {
    /// Pipeline configuration file (.json or .toml); flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Nearest/second-nearest ratio test threshold, in (0, 1).
    #[arg(long)]
    ratio: Option<f64>,

    /// Detector response threshold.
    #[arg(long)]
    threshold: Option<f32>,

    /// RANSAC seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum RANSAC iterations.
    #[arg(long)]
    iterations: Option<usize>,

    /// RANSAC inlier threshold in pixels.
    #[arg(long)]
    reproj_threshold: Option<f64>,

    /// Worker threads.
    #[arg(long)]
    threads: Option<usize>,
}

impl TuningArgs {
    fn resolve(&self) -> CliResult<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(r) = self.ratio {
            cfg.matcher.ratio = r;
        }
        if let Some(t) = self.threshold {
            cfg.detector.threshold = t;
        }
        if let Some(s) = self.seed {
            cfg.ransac.seed = Some(s);
        }
        if let Some(n) = self.iterations {
            cfg.ransac.max_iters = n;
        }
        if let Some(px) = self.reproj_threshold {
            cfg.ransac.inlier_threshold = px;
        }
        if let Some(n) = self.threads {
            cfg.n_threads = n;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn init_logging() {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Locate(args) => run_locate(&args),
        Commands::Keypoints(args) => run_keypoints(&args).map(|()| ExitCode::SUCCESS),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_locate(args: &LocateArgs) -> CliResult<ExitCode> {
    let cfg = args.tuning.resolve()?;
    let ratio = cfg.matcher.ratio;
    log::info!("{}", cfg.summary());

    let mut pipeline = MatchPipeline::new(cfg)?;
    pipeline.load_scene_json(&args.scene_keypoints)?;
    pipeline.load_scene_image(&args.scene_image)?;
    pipeline.load_object_image(&args.object_image)?;

    match pipeline.process(ratio) {
        Ok(report) => {
            report.save_json(&args.output_data)?;
            log::info!("wrote vertex results to {}", args.output_data.display());
            if let Some(path) = &args.output_image {
                pipeline.store_output_image(path)?;
            }
            if let Some(v) = report.vertices {
                println!(
                    "({:.1}, {:.1}) ({:.1}, {:.1}) ({:.1}, {:.1}) ({:.1}, {:.1})",
                    v[0][0], v[0][1], v[1][0], v[1][1], v[2][0], v[2][1], v[3][0], v[3][1]
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            failure.report.save_json(&args.output_data)?;
            match failure.kind() {
                ErrorKind::InsufficientData | ErrorKind::DegenerateHomography => {
                    log::warn!("object not located: {}", failure);
                    Ok(ExitCode::from(EXIT_NOT_LOCATED))
                }
                _ => Err(failure.into()),
            }
        }
    }
}

fn run_keypoints(args: &KeypointsArgs) -> CliResult<()> {
    let cfg = args.tuning.resolve()?;
    let extractor = FastPatchExtractor::new(cfg.detector.clone())?;
    let image = decode_luma(&args.image)?;

    let pool = rayon::ThreadPoolBuilder::new().num_threads(cfg.n_threads).build()?;
    let (kps, descs) = pool.install(|| extractor.detect_default(&image))?;
    let set = KeypointSet::new(kps, descs)?;
    set.save_json(&args.keypoint_file)?;

    log::info!(
        "wrote {} keypoints ({}-dim) to {}",
        set.len(),
        set.dimension(),
        args.keypoint_file.display()
    );
    Ok(())
}
