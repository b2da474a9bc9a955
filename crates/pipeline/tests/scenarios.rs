//! End-to-end pipeline behavior over synthetic camera frames.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::time::Duration;

use flowscope_common::error::FlowscopeResult;
use flowscope_flow_core::kernel::{FlowVisualizer, KernelProgram};
use flowscope_flow_core::normalize::normalize_frame;
use flowscope_frame_model::{PixelLayout, RawFrameBuffer};
use flowscope_pipeline::{
    DisplaySlot, FlowPipeline, FrameSource, MonitorHandle, PipelineWorker,
};

const KERNEL_JSON: &str = r#"{
    "tile_size": 8,
    "max_magnitude": 10.0,
    "min_visible_magnitude": 0.05,
    "saturation": 1.0,
    "neutral": [0, 0, 0, 0]
}"#;

/// A textured 48×64 BGRA buffer whose pattern is shifted by `shift` pixels.
fn textured_raw(shift: f32) -> RawFrameBuffer {
    raw_with_dimensions(48, 64, shift)
}

fn raw_with_dimensions(width: u32, height: u32, shift: f32) -> RawFrameBuffer {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = 127.5
                + 60.0 * ((x as f32 - shift) * std::f32::consts::TAU / 16.0).sin()
                + 40.0 * (y as f32 * std::f32::consts::TAU / 12.0).sin();
            let v = v.round().clamp(0.0, 255.0) as u8;
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    RawFrameBuffer::new(width, height, PixelLayout::Bgra8, data)
}

fn pipeline_with_kernel(monitor: MonitorHandle, display: DisplaySlot) -> FlowPipeline {
    let visualizer = FlowVisualizer::new(KernelProgram::from_json(KERNEL_JSON).unwrap());
    FlowPipeline::new(monitor, display, Some(visualizer))
}

#[test]
fn idle_frames_roll_the_reference_and_compare_to_the_previous_frame() {
    let monitor = MonitorHandle::new();
    let display = DisplaySlot::new();
    let mut pipeline = pipeline_with_kernel(monitor, display.clone());

    // Frame 1: nothing to compare against yet.
    pipeline.process_frame(textured_raw(0.0));
    assert_eq!(pipeline.stats().frames_visualized, 0);
    assert!(display.take().is_none());

    // Frames 2 and 3 each compare against the immediately preceding frame.
    pipeline.process_frame(textured_raw(1.0));
    assert_eq!(pipeline.stats().frames_visualized, 1);
    assert!(display.take().is_some());

    pipeline.process_frame(textured_raw(2.0));
    assert_eq!(pipeline.stats().frames_visualized, 2);
    assert!(display.take().is_some());

    // The rolling baseline is always the latest frame.
    let expected = normalize_frame(&textured_raw(2.0)).unwrap();
    assert_eq!(pipeline.reference_frame(), Some(&expected));
}

#[test]
fn monitoring_freezes_the_reference_at_the_last_idle_frame() {
    let monitor = MonitorHandle::new();
    let display = DisplaySlot::new();
    let mut pipeline = pipeline_with_kernel(monitor.clone(), display.clone());

    for shift in 0..3 {
        pipeline.process_frame(textured_raw(shift as f32));
    }
    let frozen = normalize_frame(&textured_raw(2.0)).unwrap();

    monitor.toggle();

    // Frames 4-6 all compare against frame 3; the slot never moves.
    for shift in 3..6 {
        pipeline.process_frame(textured_raw(shift as f32));
        assert_eq!(pipeline.reference_frame(), Some(&frozen));
    }
    assert_eq!(pipeline.stats().frames_visualized, 5);

    // A second toggle resumes refreshing on every frame.
    monitor.toggle();
    pipeline.process_frame(textured_raw(6.0));
    let refreshed = normalize_frame(&textured_raw(6.0)).unwrap();
    assert_eq!(pipeline.reference_frame(), Some(&refreshed));
}

#[test]
fn dimension_change_skips_estimation_for_that_frame() {
    let monitor = MonitorHandle::new();
    let display = DisplaySlot::new();
    let mut pipeline = pipeline_with_kernel(monitor, display.clone());

    pipeline.process_frame(raw_with_dimensions(48, 64, 0.0));
    pipeline.process_frame(raw_with_dimensions(64, 48, 0.0));

    assert_eq!(pipeline.stats().estimations_failed, 1);
    assert_eq!(pipeline.stats().frames_visualized, 0);
    assert!(display.take().is_none());
}

#[test]
fn unreadable_buffers_are_dropped_silently() {
    let monitor = MonitorHandle::new();
    let display = DisplaySlot::new();
    let mut pipeline = pipeline_with_kernel(monitor, display.clone());

    pipeline.process_frame(RawFrameBuffer::new(48, 64, PixelLayout::Bgra8, vec![]));
    pipeline.process_frame(textured_raw(0.0));

    assert_eq!(pipeline.stats().frames_dropped, 1);
    assert_eq!(pipeline.stats().frames_processed, 1);
    // The dropped frame never became the reference.
    let expected = normalize_frame(&textured_raw(0.0)).unwrap();
    assert_eq!(pipeline.reference_frame(), Some(&expected));
}

#[test]
fn missing_kernel_disables_display_but_not_estimation() {
    let err = FlowVisualizer::load(std::path::Path::new("/nonexistent/flowview.json"));
    assert!(err.is_err());

    let monitor = MonitorHandle::new();
    let display = DisplaySlot::new();
    let mut pipeline = FlowPipeline::new(monitor, display.clone(), None);
    assert!(!pipeline.can_visualize());

    for shift in 0..3 {
        pipeline.process_frame(textured_raw(shift as f32));
    }

    // Normalization and estimation ran; the display never heard about it.
    assert_eq!(pipeline.stats().frames_processed, 3);
    assert_eq!(pipeline.stats().fields_estimated, 2);
    assert_eq!(pipeline.stats().frames_visualized, 0);
    assert!(display.take().is_none());
}

/// Source that hands out a fixed frame list, then reports idle forever.
struct ScriptedSource {
    frames: VecDeque<RawFrameBuffer>,
}

impl FrameSource for ScriptedSource {
    fn poll_frame(&mut self) -> FlowscopeResult<Option<RawFrameBuffer>> {
        Ok(self.frames.pop_front())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        !self.frames.is_empty()
    }
}

#[tokio::test]
async fn worker_drains_the_source_serially_until_stopped() {
    let monitor = MonitorHandle::new();
    let display = DisplaySlot::new();
    let pipeline = pipeline_with_kernel(monitor, display.clone());

    let source = ScriptedSource {
        frames: (0..3)
            .map(|shift| raw_with_dimensions(24, 32, shift as f32))
            .collect(),
    };

    let mut worker = PipelineWorker::new(pipeline, Box::new(source));
    let stop = worker.stop_flag();
    let handle = tokio::spawn(async move { worker.run().await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    stop.store(true, Ordering::SeqCst);

    let processed = handle.await.unwrap().unwrap();
    assert_eq!(processed, 3);
    // The latest overlay is waiting for the display side.
    assert!(display.take().is_some());
}
