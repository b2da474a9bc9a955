//! The serial frame worker and per-frame orchestration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowscope_common::error::FlowscopeResult;
use flowscope_flow_core::estimator::{EstimatorConfig, FlowEstimator};
use flowscope_flow_core::kernel::FlowVisualizer;
use flowscope_flow_core::normalize::normalize_frame;
use flowscope_frame_model::RawFrameBuffer;

use crate::display::DisplaySlot;
use crate::monitor::{MonitorHandle, MonitorState};
use crate::reference::ReferenceSlot;

/// Trait for raw frame providers.
///
/// Implementations wrap whatever the capture collaborator is: a camera
/// callback queue, a directory of stills, a synthetic generator. Frames
/// must be delivered in capture order; late frames are the provider's
/// problem to drop before delivery.
pub trait FrameSource: Send {
    /// Poll for the next raw frame. Returns `None` if no frame is ready.
    fn poll_frame(&mut self) -> FlowscopeResult<Option<RawFrameBuffer>>;

    /// Source name for logging.
    fn name(&self) -> &str;

    /// Check if the source can currently deliver frames.
    fn is_available(&self) -> bool;
}

/// Runtime statistics for a flow pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Frames that completed a full pipeline pass.
    pub frames_processed: u64,

    /// Frames dropped because the raw buffer was unreadable.
    pub frames_dropped: u64,

    /// Estimation passes that produced a usable field.
    pub fields_estimated: u64,

    /// Estimation passes skipped (mismatch or non-convergence).
    pub estimations_failed: u64,

    /// Overlays published to the display slot.
    pub frames_visualized: u64,
}

impl PipelineStats {
    /// Drop rate as a percentage of delivered frames.
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_processed + self.frames_dropped;
        if total == 0 {
            return 0.0;
        }
        self.frames_dropped as f64 / total as f64 * 100.0
    }
}

/// Per-frame orchestration state.
///
/// Owns the reference slot and the estimator; shares the monitoring
/// toggle with the control thread and the display slot with the
/// presentation layer. `process_frame` is the whole state machine:
/// one call, one frame, in order.
pub struct FlowPipeline {
    estimator: FlowEstimator,
    visualizer: Option<FlowVisualizer>,
    reference: ReferenceSlot,
    monitor: MonitorHandle,
    display: DisplaySlot,
    stats: PipelineStats,
}

impl FlowPipeline {
    /// Build a pipeline.
    ///
    /// `visualizer` is `None` when the kernel program failed to load at
    /// startup; estimation still runs but nothing is ever displayed.
    pub fn new(
        monitor: MonitorHandle,
        display: DisplaySlot,
        visualizer: Option<FlowVisualizer>,
    ) -> Self {
        if visualizer.is_none() {
            tracing::warn!("Kernel program unavailable; visualization output disabled");
        }
        Self {
            estimator: FlowEstimator::with_defaults(),
            visualizer,
            reference: ReferenceSlot::new(),
            monitor,
            display,
            stats: PipelineStats::default(),
        }
    }

    /// Replace the default estimator parameters.
    pub fn with_estimator_config(mut self, config: EstimatorConfig) -> Self {
        self.estimator = FlowEstimator::new(config);
        self
    }

    /// Run one raw frame through the full normalize → estimate →
    /// visualize → reference-update sequence.
    pub fn process_frame(&mut self, raw: RawFrameBuffer) {
        let frame = match normalize_frame(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping unreadable frame");
                self.stats.frames_dropped += 1;
                return;
            }
        };

        if let Some(reference) = self.reference.frame() {
            match self.estimator.estimate(reference, &frame) {
                Ok(field) => {
                    self.stats.fields_estimated += 1;
                    if let Some(visualizer) = &self.visualizer {
                        let image = visualizer.render(&field);
                        if self.display.publish(image) {
                            tracing::trace!("Display slot replaced an unconsumed overlay");
                        }
                        self.stats.frames_visualized += 1;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "No flow for this frame");
                    self.stats.estimations_failed += 1;
                }
            }
        }

        // The toggle is sampled exactly once per turn, here: after
        // estimation, before the reference update. A flip lands on the
        // frame boundary, never mid-frame.
        if self.monitor.state() == MonitorState::Idle {
            self.reference.replace(frame);
        }

        self.stats.frames_processed += 1;
    }

    /// The currently held reference frame, if any.
    pub fn reference_frame(&self) -> Option<&flowscope_frame_model::Frame> {
        self.reference.frame()
    }

    /// Whether the visualization stage is available.
    pub fn can_visualize(&self) -> bool {
        self.visualizer.is_some()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }
}

/// The strictly serial worker: drains a frame source one frame at a time.
pub struct PipelineWorker {
    pipeline: FlowPipeline,
    source: Box<dyn FrameSource>,
    stop_flag: Arc<AtomicBool>,
}

impl PipelineWorker {
    pub fn new(pipeline: FlowPipeline, source: Box<dyn FrameSource>) -> Self {
        Self {
            pipeline,
            source,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the frame loop until the stop flag is set.
    ///
    /// Frames are processed in delivery order, one at a time; a frame
    /// either completes its full pipeline pass or is dropped whole before
    /// the next is dequeued. Returns the number of processed frames.
    pub async fn run(&mut self) -> FlowscopeResult<u64> {
        tracing::info!(source = %self.source.name(), "Flow worker started");

        while !self.stop_flag.load(Ordering::Relaxed) {
            match self.source.poll_frame() {
                Ok(Some(raw)) => {
                    self.pipeline.process_frame(raw);
                }
                Ok(None) => {
                    // No frame ready, yield briefly
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Frame source error");
                }
            }
        }

        let stats = self.pipeline.stats();
        tracing::info!(
            frames = stats.frames_processed,
            dropped = stats.frames_dropped,
            visualized = stats.frames_visualized,
            "Flow worker stopped"
        );
        Ok(stats.frames_processed)
    }

    /// Set the stop flag.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Get the stop flag for external coordination.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn pipeline(&self) -> &FlowPipeline {
        &self.pipeline
    }
}
