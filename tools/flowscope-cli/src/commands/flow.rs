//! One-shot flow estimation between two on-disk images.

use std::path::{Path, PathBuf};

use flowscope_common::config::AppConfig;
use flowscope_flow_core::estimator::FlowEstimator;
use flowscope_flow_core::kernel::FlowVisualizer;
use flowscope_frame_model::Frame;

pub fn run(
    reference: PathBuf,
    current: PathBuf,
    output: PathBuf,
    kernel: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = AppConfig::load();
    let kernel_path = kernel.unwrap_or(config.kernel_asset);
    let visualizer = FlowVisualizer::load(&kernel_path)
        .map_err(|e| anyhow::anyhow!("Cannot load kernel program: {e}"))?;

    let reference_frame = load_frame(&reference)?;
    let current_frame = load_frame(&current)?;

    let mut estimator = FlowEstimator::with_defaults();
    let field = estimator
        .estimate(&reference_frame, &current_frame)
        .map_err(|e| anyhow::anyhow!("Estimation failed: {e}"))?;

    let mean = field.mean_flow();
    println!(
        "Flow {}x{}: mean ({:.2}, {:.2}) px, max magnitude {:.2} px",
        field.width(),
        field.height(),
        mean.dx,
        mean.dy,
        field.max_magnitude()
    );

    let overlay = visualizer.render(&field);
    let (width, height) = (overlay.width(), overlay.height());
    let buffer = image::RgbaImage::from_raw(width, height, overlay.into_data())
        .ok_or_else(|| anyhow::anyhow!("Overlay payload did not match its dimensions"))?;
    buffer.save(&output)?;

    println!("Overlay written to {}", output.display());
    Ok(())
}

/// Load an already display-oriented image as a frame, bypassing the
/// quarter-turn correction the live pipeline applies.
fn load_frame(path: &Path) -> anyhow::Result<Frame> {
    let decoded = image::open(path)
        .map_err(|e| anyhow::anyhow!("Cannot decode {}: {e}", path.display()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    Frame::from_rgba(width, height, decoded.into_raw())
        .ok_or_else(|| anyhow::anyhow!("Image {} has no pixels", path.display()))
}
