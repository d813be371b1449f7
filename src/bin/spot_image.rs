//! spot_image - one-shot detection for a single image.
//!
//! The upload path of the dashboard: decode a JPEG/PNG, run the detection
//! pipeline once at the requested confidence threshold, write the annotated
//! copy, and print the detection count plus deduplicated class names.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use spotter::{Frame, FramePipeline, StubBackend, Threshold};

#[derive(Parser, Debug)]
#[command(name = "spot_image", about = "Run object detection on a single image")]
struct Args {
    /// Input image (JPEG or PNG).
    image: PathBuf,

    /// Confidence threshold in (0.0, 1.0].
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,

    /// Where to write the annotated copy. Defaults to `<input>.annotated.png`.
    #[arg(long)]
    output: Option<PathBuf>,

    /// ONNX model path (requires the backend-tract feature).
    #[arg(long, env = "SPOTTER_MODEL")]
    model: Option<PathBuf>,

    /// Class-name file, one label per line.
    #[arg(long, env = "SPOTTER_LABELS")]
    labels: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let threshold = Threshold::new(args.threshold)?;

    let frame = Frame::open(&args.image)
        .with_context(|| format!("failed to load {}", args.image.display()))?;

    let pipeline = build_pipeline(&args)?;
    let outcome = pipeline.process_frame(&frame, threshold)?;

    let output = args
        .output
        .unwrap_or_else(|| args.image.with_extension("annotated.png"));
    outcome
        .annotated
        .to_rgb_image()
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if outcome.detections.is_empty() {
        println!("no objects detected");
    } else {
        let labels: Vec<&str> = outcome.unique_labels.iter().map(String::as_str).collect();
        println!(
            "detected {} object(s): {}",
            outcome.detections.len(),
            labels.join(", ")
        );
    }
    println!("annotated image written to {}", output.display());
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn build_pipeline(args: &Args) -> Result<FramePipeline> {
    match &args.model {
        Some(model) => {
            let backend =
                spotter::TractBackend::new(model.clone(), args.labels.clone(), 640, 640)?;
            Ok(FramePipeline::with_backend(backend))
        }
        None => Ok(FramePipeline::with_backend(StubBackend::new())),
    }
}

#[cfg(not(feature = "backend-tract"))]
fn build_pipeline(args: &Args) -> Result<FramePipeline> {
    if args.model.is_some() {
        anyhow::bail!("--model requires a build with the backend-tract feature");
    }
    Ok(FramePipeline::with_backend(StubBackend::new()))
}
