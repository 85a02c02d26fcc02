use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use markless::{
    default_output_path, is_supported_image, BatchEvent, BatchRunner, BatchState,
    DetectionParams, ImageJob, NeighborhoodFill, RegionRatio, WatermarkRemover,
};

#[derive(Parser)]
#[command(
    name = "markless",
    about = "Locate corner watermarks by edge analysis and remove them via masked reconstruction",
    version,
    after_help = "Simple usage: markless <image>  (detect and clean into {name}_cleaned.{ext})\n\n\
                  A directory input processes every supported image inside it sequentially;\n\
                  the output directory defaults to <input>/cleaned."
)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_cleaned.{ext}, or <input>/cleaned)
    #[arg(short, long)]
    output: Option<String>,

    /// Canny edge threshold (1-500); higher means stricter detection
    #[arg(short, long, default_value = "100.0")]
    threshold: f32,

    /// Horizontal mask expansion width in pixels (0-20, fractional allowed)
    #[arg(short, long, default_value = "3.0")]
    expansion: f32,

    /// Search region width as a fraction of image width (0-1)
    #[arg(long, default_value = "0.30")]
    roi_width: f32,

    /// Search region height as a fraction of image height (0-1)
    #[arg(long, default_value = "0.15")]
    roi_height: f32,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    if !(1.0..=500.0).contains(&cli.threshold) {
        eprintln!("Error: Threshold must be between 1 and 500");
        process::exit(1);
    }
    if !(0.0..=20.0).contains(&cli.expansion) {
        eprintln!("Error: Expansion must be between 0 and 20");
        process::exit(1);
    }
    if !(0.0..=1.0).contains(&cli.roi_width) || !(0.0..=1.0).contains(&cli.roi_height) {
        eprintln!("Error: Region ratios must be between 0 and 1");
        process::exit(1);
    }

    init_tracing(cli.quiet);

    let params = DetectionParams {
        edge_threshold: cli.threshold,
        mask_expansion: cli.expansion,
        region: RegionRatio {
            width: cli.roi_width,
            height: cli.roi_height,
        },
    };

    let engine = Arc::new(WatermarkRemover::new(Arc::new(NeighborhoodFill)));

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    if input_path.is_dir() {
        run_batch(&engine, input_path, cli.output.as_deref(), params, cli.quiet);
    } else {
        run_single(&engine, input_path, cli.output.as_deref(), &params, cli.quiet);
    }
}

fn run_single(
    engine: &WatermarkRemover,
    input: &Path,
    output: Option<&str>,
    params: &DetectionParams,
    quiet: bool,
) {
    let output_path = output.map_or_else(|| default_output_path(input), PathBuf::from);

    match engine.process_file(input, &output_path, params) {
        Ok(written) => {
            if !quiet {
                eprintln!("[OK] {} -> {}", input.display(), written.display());
            }
        }
        Err(e) => {
            eprintln!("[FAIL] {}: {e}", input.display());
            process::exit(1);
        }
    }
}

fn run_batch(
    engine: &Arc<WatermarkRemover>,
    input_dir: &Path,
    output: Option<&str>,
    params: DetectionParams,
    quiet: bool,
) {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
        Ok(rd) => rd
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| is_supported_image(p))
            .collect(),
        Err(e) => {
            eprintln!("Error: Failed to read directory {}: {e}", input_dir.display());
            process::exit(1);
        }
    };
    files.sort();

    if files.is_empty() {
        eprintln!(
            "Error: No supported images found in {}",
            input_dir.display()
        );
        process::exit(1);
    }

    let output_dir = output.map_or_else(|| input_dir.join("cleaned"), PathBuf::from);
    let jobs: Vec<ImageJob> = files
        .iter()
        .map(|input| ImageJob {
            input: input.clone(),
            // Directory entries always carry a filename.
            output: output_dir.join(input.file_name().unwrap()),
            params,
        })
        .collect();

    if !quiet {
        eprintln!("Processing {} images -> {}", jobs.len(), output_dir.display());
    }

    let handle = BatchRunner::new(Arc::clone(engine)).start(jobs);

    for event in &handle.events {
        match event {
            BatchEvent::Started { input } => {
                if !quiet {
                    eprintln!("     {}", display_name(&input));
                }
            }
            BatchEvent::Finished { output } => {
                if !quiet {
                    eprintln!("[OK] {}", display_name(&output));
                }
            }
            BatchEvent::Progress { .. } => {}
            BatchEvent::BatchFinished { message, .. } => {
                if !quiet {
                    eprintln!();
                    eprintln!("[Summary] {message}");
                }
            }
        }
    }

    let outcome = handle.wait();
    if outcome.state == BatchState::Failed || outcome.succeeded < outcome.processed {
        process::exit(1);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

fn init_tracing(quiet: bool) {
    let default_filter = if quiet { "markless=error" } else { "markless=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
