//! Depth Estimation Example
//!
//! This example loads a depth model through ONNX Runtime, estimates depth for
//! each input image and writes the grayscale and colored renderings as PNG.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example estimate -- [OPTIONS] <IMAGES>...
//! ```
//!
//! # Arguments
//!
//! * `-r, --model-root` - Directory holding `<source_path>/onnx/<file>` model exports
//! * `-m, --model` - Catalog model id
//! * `-b, --backend` - Compute backend (auto, wasm, gpu, webgpu, cuda, webnn, ...)
//! * `-p, --precision` - Precision level (fp32, fp16, q8, q4, int8, bnb4, bnb8)
//! * `-o, --output-dir` - Directory to write the renderings to
//! * `<IMAGES>...` - Paths to input images to process
//!
//! # Example
//!
//! ```bash
//! cargo run --example estimate -- -r models -m depth-anything-v2-small -b wasm photo.jpg
//! ```

use clap::Parser;
use depthlens::core::config::ConfigLoader;
use depthlens::prelude::*;
use depthlens::utils::{format_file_size, format_speed, format_time, loading_stage_caption};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

/// Command-line arguments for the depth estimation example
#[derive(Parser)]
#[command(name = "estimate")]
#[command(about = "Depth Estimation Example - renders depth maps for images")]
struct Args {
    /// Paths to input images to process
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Optional TOML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the model exports
    #[arg(short = 'r', long)]
    model_root: Option<PathBuf>,

    /// Catalog model id
    #[arg(short, long)]
    model: Option<String>,

    /// Compute backend
    #[arg(short, long)]
    backend: Option<ComputeBackend>,

    /// Precision level
    #[arg(short, long)]
    precision: Option<PrecisionLevel>,

    /// Colormap for the colored rendering
    #[arg(long)]
    colormap: Option<Colormap>,

    /// Render through the enhance and 2x upscale path
    #[arg(long)]
    high_quality: bool,

    /// Directory to write the renderings to
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    depthlens::core::init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => DepthLensConfig::default(),
    };
    if let Some(root) = args.model_root {
        config.engine.model_root = root;
    }
    if let Some(model) = args.model {
        config.session.model_id = model;
    }
    if let Some(backend) = args.backend {
        config.session.backend = backend;
    }
    if let Some(precision) = args.precision {
        config.session.precision = precision;
    }
    if let Some(colormap) = args.colormap {
        config.visualization.colormap = colormap;
    }
    config.visualization.high_quality |= args.high_quality;

    let session = DepthSession::with_ort(config)?;
    info!(
        "Supported backends: {:?}",
        session.capabilities().supported_backends()
    );

    session.subscribe(Arc::new(|event: &PipelineEvent| match event {
        PipelineEvent::LoadProgress {
            percentage,
            snapshot: Some(snapshot),
        } if snapshot.bytes_total > 0 => {
            let mut line = format!(
                "{} {:.0}% ({} / {})",
                loading_stage_caption(*percentage),
                percentage,
                format_file_size(snapshot.bytes_loaded as f64),
                format_file_size(snapshot.bytes_total as f64)
            );
            if let Some(speed) = snapshot.speed_bytes_per_sec.filter(|s| *s > 0.0) {
                line.push_str(&format!(", {}", format_speed(speed)));
            }
            if let Some(eta) = snapshot.eta_seconds.filter(|e| *e > 0.0) {
                line.push_str(&format!(", ETA {}", format_time(eta)));
            }
            info!("{line}");
        }
        PipelineEvent::LoadState(state) => info!("Model state: {state}"),
        PipelineEvent::Error(message) => warn!("{message}"),
        _ => {}
    }));

    let start = Instant::now();
    session.load_selected()?;
    info!(
        "Loaded {} in {:.2?}",
        session.state().current_model.unwrap_or_default(),
        start.elapsed()
    );

    for image_path in &args.images {
        if !image_path.exists() {
            error!("Image file not found: {}", image_path.display());
            continue;
        }
        let start = Instant::now();
        let depth = match session.estimate(image_path.clone()) {
            Ok(depth) => depth,
            Err(e) => {
                error!("Failed to estimate {}: {}", image_path.display(), e);
                continue;
            }
        };
        info!(
            "{}: {}x{} depth map in {:.2?}",
            image_path.display(),
            depth.width(),
            depth.height(),
            start.elapsed()
        );

        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64;
        let colored = session.export(ImageVariant::Colored, &args.output_dir, timestamp)?;
        let grayscale_dir = args.output_dir.join("grayscale");
        let grayscale = session.export(ImageVariant::Grayscale, &grayscale_dir, timestamp)?;
        info!("Wrote {} and {}", colored.display(), grayscale.display());
    }

    info!("{}", session.estimation_stats());
    Ok(())
}
