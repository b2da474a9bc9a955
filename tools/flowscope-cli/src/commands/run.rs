//! Run the live pipeline over a frame source.
//!
//! Sources deliver device-oriented raw buffers; the pipeline applies the
//! fixed quarter-turn correction, so published overlays are rotated
//! relative to the raw inputs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowscope_common::clock::{PipelineClock, RateController};
use flowscope_common::config::AppConfig;
use flowscope_common::error::{FlowscopeError, FlowscopeResult};
use flowscope_flow_core::kernel::FlowVisualizer;
use flowscope_frame_model::{PixelLayout, RawFrameBuffer, VisualizationImage};
use flowscope_pipeline::{
    DisplaySlot, FlowPipeline, FrameSource, MonitorHandle, PipelineWorker,
};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    frames: Option<PathBuf>,
    count: u64,
    width: u32,
    height: u32,
    fps: u32,
    monitor_after: Option<u64>,
    output: PathBuf,
    kernel: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = AppConfig::load();
    let kernel_path = kernel.unwrap_or(config.kernel_asset);

    // A missing kernel is a capability loss, not a startup failure: the
    // pipeline still runs, it just never publishes an overlay.
    let visualizer = match FlowVisualizer::load(&kernel_path) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "Running without visualization output");
            None
        }
    };

    std::fs::create_dir_all(&output)?;

    let delivered = Arc::new(AtomicU64::new(0));
    let exhausted = Arc::new(AtomicBool::new(false));

    let source: Box<dyn FrameSource> = match frames {
        Some(dir) => Box::new(DirectorySource::open(
            &dir,
            fps,
            delivered.clone(),
            exhausted.clone(),
        )?),
        None => Box::new(SyntheticSource::new(
            width,
            height,
            count,
            fps,
            delivered.clone(),
            exhausted.clone(),
        )),
    };

    let monitor = MonitorHandle::new();
    let display = DisplaySlot::new();
    let pipeline = FlowPipeline::new(monitor.clone(), display.clone(), visualizer);

    let mut worker = PipelineWorker::new(pipeline, source);
    let stop_flag = worker.stop_flag();
    let worker_task = tokio::spawn(async move { worker.run().await });

    println!("Pipeline running; overlays land in {}", output.display());

    let mut toggled = false;
    let mut saved = 0u64;
    loop {
        if let Some(image) = display.take() {
            save_overlay(&output, saved, image)?;
            saved += 1;
        }

        if let Some(after) = monitor_after {
            if !toggled && delivered.load(Ordering::Relaxed) >= after {
                monitor.toggle();
                toggled = true;
                println!("Reference frozen after {after} frames; monitoring started");
            }
        }

        if exhausted.load(Ordering::Relaxed) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    stop_flag.store(true, Ordering::SeqCst);
    let processed = worker_task
        .await
        .map_err(|e| anyhow::anyhow!("Worker task panicked: {e}"))??;

    // The worker may have published one last overlay on its way out.
    if let Some(image) = display.take() {
        save_overlay(&output, saved, image)?;
        saved += 1;
    }

    println!("Processed {processed} frames, wrote {saved} overlays");
    Ok(())
}

fn save_overlay(dir: &Path, index: u64, image: VisualizationImage) -> anyhow::Result<()> {
    let (width, height) = (image.width(), image.height());
    let buffer = image::RgbaImage::from_raw(width, height, image.into_data())
        .ok_or_else(|| anyhow::anyhow!("Overlay payload did not match its dimensions"))?;
    let path = dir.join(format!("flow_{index:05}.png"));
    buffer.save(&path)?;
    tracing::debug!(path = %path.display(), "Wrote overlay");
    Ok(())
}

/// Generates a drifting sine pattern at a fixed rate.
struct SyntheticSource {
    width: u32,
    height: u32,
    total: u64,
    emitted: u64,
    clock: PipelineClock,
    rate: Option<RateController>,
    delivered: Arc<AtomicU64>,
    exhausted: Arc<AtomicBool>,
}

impl SyntheticSource {
    fn new(
        width: u32,
        height: u32,
        total: u64,
        fps: u32,
        delivered: Arc<AtomicU64>,
        exhausted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            width,
            height,
            total,
            emitted: 0,
            clock: PipelineClock::start(),
            rate: (fps > 0).then(|| RateController::new(fps)),
            delivered,
            exhausted,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn poll_frame(&mut self) -> FlowscopeResult<Option<RawFrameBuffer>> {
        if self.emitted >= self.total {
            self.exhausted.store(true, Ordering::Relaxed);
            return Ok(None);
        }
        if let Some(rate) = &mut self.rate {
            if !rate.should_tick(self.clock.elapsed_ns()) {
                return Ok(None);
            }
        }

        // Two pixels of drift per frame keeps the flow well inside the
        // estimator's pull-in range.
        let raw = drifting_pattern(self.width, self.height, self.emitted as f32 * 2.0);
        self.emitted += 1;
        self.delivered.store(self.emitted, Ordering::Relaxed);
        if self.emitted == self.total {
            self.exhausted.store(true, Ordering::Relaxed);
        }
        Ok(Some(raw))
    }

    fn name(&self) -> &str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        self.emitted < self.total
    }
}

fn drifting_pattern(width: u32, height: u32, shift: f32) -> RawFrameBuffer {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = 127.5
                + 60.0 * ((x as f32 - shift) * std::f32::consts::TAU / 24.0).sin()
                + 40.0 * (y as f32 * std::f32::consts::TAU / 18.0).sin();
            let v = v.round().clamp(0.0, 255.0) as u8;
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    RawFrameBuffer::new(width, height, PixelLayout::Bgra8, data)
}

/// Feeds PNG frames from a directory in sorted order.
struct DirectorySource {
    files: Vec<PathBuf>,
    next: usize,
    clock: PipelineClock,
    rate: Option<RateController>,
    delivered: Arc<AtomicU64>,
    exhausted: Arc<AtomicBool>,
}

impl DirectorySource {
    fn open(
        dir: &Path,
        fps: u32,
        delivered: Arc<AtomicU64>,
        exhausted: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            anyhow::bail!("No PNG frames found in {}", dir.display());
        }
        tracing::info!(frames = files.len(), dir = %dir.display(), "Frame directory opened");

        Ok(Self {
            files,
            next: 0,
            clock: PipelineClock::start(),
            rate: (fps > 0).then(|| RateController::new(fps)),
            delivered,
            exhausted,
        })
    }
}

impl FrameSource for DirectorySource {
    fn poll_frame(&mut self) -> FlowscopeResult<Option<RawFrameBuffer>> {
        if self.next >= self.files.len() {
            self.exhausted.store(true, Ordering::Relaxed);
            return Ok(None);
        }
        if let Some(rate) = &mut self.rate {
            if !rate.should_tick(self.clock.elapsed_ns()) {
                return Ok(None);
            }
        }

        let path = self.files[self.next].clone();
        self.next += 1;
        self.delivered.store(self.next as u64, Ordering::Relaxed);
        if self.next == self.files.len() {
            self.exhausted.store(true, Ordering::Relaxed);
        }

        let decoded = image::open(&path)
            .map_err(|e| {
                FlowscopeError::capture(format!("Cannot decode {}: {e}", path.display()))
            })?
            .to_rgba8();

        let (width, height) = decoded.dimensions();
        let mut data = decoded.into_raw();
        // PNG decodes as RGBA; raw capture buffers are BGRA.
        for px in data.chunks_exact_mut(4) {
            px.swap(0, 2);
        }

        Ok(Some(RawFrameBuffer::new(
            width,
            height,
            PixelLayout::Bgra8,
            data,
        )))
    }

    fn name(&self) -> &str {
        "directory"
    }

    fn is_available(&self) -> bool {
        self.next < self.files.len()
    }
}
