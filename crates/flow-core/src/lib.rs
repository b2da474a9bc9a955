//! Flowscope Flow Core
//!
//! The three compute stages of the flow pipeline:
//! - **Normalize:** Raw capture buffers to orientation-corrected frames
//! - **Estimate:** Dense pyramidal optical flow between a frame pair
//! - **Visualize:** Vector fields to renderable overlay images
//!
//! This crate is pure computation — no I/O beyond loading the packaged
//! kernel descriptor, no platform dependencies. All inputs are data;
//! all outputs are data.

pub mod estimator;
pub mod kernel;
pub mod normalize;
pub mod pyramid;

pub use estimator::FlowEstimator;
pub use kernel::{FlowVisualizer, KernelProgram};
pub use normalize::normalize_frame;
