//! Dense optical-flow estimation.
//!
//! Pyramidal Lucas–Kanade over luma planes: Gaussian pyramids of both
//! frames, coarse-to-fine refinement, and a per-pixel structure-tensor
//! solve over a local window with iterative warp updates.
//!
//! Vectors are returned in source-pixel units: the content at `(x, y)` in
//! the reference frame is estimated to appear at `(x + dx, y + dy)` in the
//! current frame.

use flowscope_common::error::{FlowscopeError, FlowscopeResult};
use flowscope_frame_model::{FlowVector, Frame, VectorField};

use crate::pyramid::{Pyramid, PyramidLevel};

/// Tunable estimation parameters.
#[derive(Debug, Clone, Copy)]
pub struct EstimatorConfig {
    /// Maximum pyramid depth.
    pub max_levels: usize,

    /// Half-width of the correlation window (radius 3 = 7×7 window).
    pub window_radius: i64,

    /// Warp-and-refine iterations per pixel per level.
    pub iterations: usize,

    /// Stop iterating once the update step is shorter than this.
    pub convergence_epsilon: f32,

    /// Structure-tensor determinant floor below which a window is
    /// treated as textureless and the incoming prior is kept.
    pub min_determinant: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_levels: 3,
            window_radius: 3,
            iterations: 5,
            convergence_epsilon: 0.01,
            min_determinant: 1e-2,
        }
    }
}

/// Frames with either dimension below this cannot seat the correlation
/// window and are rejected outright.
const MIN_FRAME_DIMENSION: u32 = 16;

/// Stateful dense-flow engine.
///
/// The struct retains scratch planes between calls so a long-running
/// pipeline does not reallocate per frame. The cache is keyed by geometry
/// and carries no frame content across calls: each call's result depends
/// only on the two frames passed in.
pub struct FlowEstimator {
    config: EstimatorConfig,
    scratch: Scratch,
}

#[derive(Default)]
struct Scratch {
    grad_x: Vec<f32>,
    grad_y: Vec<f32>,
    flow_x: Vec<f32>,
    flow_y: Vec<f32>,
    carry_x: Vec<f32>,
    carry_y: Vec<f32>,
}

impl FlowEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            scratch: Scratch::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EstimatorConfig::default())
    }

    /// Estimate the dense displacement field from `reference` to `current`.
    ///
    /// Errors when the frames disagree in size or when no window anywhere
    /// in the pair carries enough texture to solve.
    pub fn estimate(
        &mut self,
        reference: &Frame,
        current: &Frame,
    ) -> FlowscopeResult<VectorField> {
        if !reference.same_dimensions(current) {
            return Err(FlowscopeError::DimensionMismatch {
                reference_width: reference.width(),
                reference_height: reference.height(),
                current_width: current.width(),
                current_height: current.height(),
            });
        }

        let width = reference.width();
        let height = reference.height();
        if width < MIN_FRAME_DIMENSION || height < MIN_FRAME_DIMENSION {
            return Err(FlowscopeError::estimation(format!(
                "Frame {width}x{height} too small for a {}-pixel correlation window",
                self.config.window_radius * 2 + 1
            )));
        }

        let ref_pyramid = Pyramid::build(
            reference.luma_plane(),
            width,
            height,
            self.config.max_levels,
        );
        let cur_pyramid =
            Pyramid::build(current.luma_plane(), width, height, self.config.max_levels);
        let depth = ref_pyramid.depth().min(cur_pyramid.depth());

        let mut solved_at_finest = 0usize;

        for level_idx in (0..depth).rev() {
            let ref_level = ref_pyramid.level(level_idx);
            let cur_level = cur_pyramid.level(level_idx);
            let coarsest = level_idx == depth - 1;

            self.seed_level_flow(ref_level, coarsest);
            self.compute_gradients(ref_level);

            let solved = self.refine_level(ref_level, cur_level);
            if level_idx == 0 {
                solved_at_finest = solved;
            }

            if !coarsest {
                tracing::trace!(
                    level = level_idx,
                    solved,
                    "Refined flow at pyramid level"
                );
            }
        }

        if solved_at_finest == 0 {
            return Err(FlowscopeError::estimation(
                "No textured window converged; frame pair is flat",
            ));
        }

        let vectors = self
            .scratch
            .flow_x
            .iter()
            .zip(&self.scratch.flow_y)
            .map(|(&dx, &dy)| FlowVector::new(dx, dy))
            .collect();
        VectorField::new(width, height, vectors)
            .ok_or_else(|| FlowscopeError::estimation("Flow plane size mismatch"))
    }

    /// Initialize this level's flow planes: zero at the coarsest level,
    /// otherwise the previous (coarser) level's result upsampled 2×.
    fn seed_level_flow(&mut self, level: &PyramidLevel, coarsest: bool) {
        let len = level.width as usize * level.height as usize;

        if coarsest {
            self.scratch.flow_x.clear();
            self.scratch.flow_x.resize(len, 0.0);
            self.scratch.flow_y.clear();
            self.scratch.flow_y.resize(len, 0.0);
            return;
        }

        std::mem::swap(&mut self.scratch.flow_x, &mut self.scratch.carry_x);
        std::mem::swap(&mut self.scratch.flow_y, &mut self.scratch.carry_y);
        self.scratch.flow_x.clear();
        self.scratch.flow_x.resize(len, 0.0);
        self.scratch.flow_y.clear();
        self.scratch.flow_y.resize(len, 0.0);

        let coarse_width = (level.width / 2).max(1) as usize;
        let coarse_height = (level.height / 2).max(1) as usize;
        for y in 0..level.height as usize {
            for x in 0..level.width as usize {
                let cx = (x / 2).min(coarse_width - 1);
                let cy = (y / 2).min(coarse_height - 1);
                let src = cy * coarse_width + cx;
                let dst = y * level.width as usize + x;
                self.scratch.flow_x[dst] = self.scratch.carry_x[src] * 2.0;
                self.scratch.flow_y[dst] = self.scratch.carry_y[src] * 2.0;
            }
        }
    }

    /// Central-difference spatial gradients of the reference level.
    fn compute_gradients(&mut self, level: &PyramidLevel) {
        let len = level.width as usize * level.height as usize;
        self.scratch.grad_x.clear();
        self.scratch.grad_x.resize(len, 0.0);
        self.scratch.grad_y.clear();
        self.scratch.grad_y.resize(len, 0.0);

        for y in 0..level.height as i64 {
            for x in 0..level.width as i64 {
                let idx = y as usize * level.width as usize + x as usize;
                self.scratch.grad_x[idx] = (level.at(x + 1, y) - level.at(x - 1, y)) * 0.5;
                self.scratch.grad_y[idx] = (level.at(x, y + 1) - level.at(x, y - 1)) * 0.5;
            }
        }
    }

    /// Iterative Lucas–Kanade refinement of every pixel at one level.
    /// Returns the number of pixels whose window was solvable.
    fn refine_level(&mut self, ref_level: &PyramidLevel, cur_level: &PyramidLevel) -> usize {
        let radius = self.config.window_radius;
        let width = ref_level.width as i64;
        let height = ref_level.height as i64;
        let mut solved = 0usize;

        for py in 0..height {
            for px in 0..width {
                let idx = py as usize * ref_level.width as usize + px as usize;

                // Structure tensor over the window, from reference gradients.
                let mut ixx = 0.0f32;
                let mut ixy = 0.0f32;
                let mut iyy = 0.0f32;
                for wy in -radius..=radius {
                    for wx in -radius..=radius {
                        let sx = (px + wx).clamp(0, width - 1) as usize;
                        let sy = (py + wy).clamp(0, height - 1) as usize;
                        let s = sy * ref_level.width as usize + sx;
                        let gx = self.scratch.grad_x[s];
                        let gy = self.scratch.grad_y[s];
                        ixx += gx * gx;
                        ixy += gx * gy;
                        iyy += gy * gy;
                    }
                }

                let det = ixx * iyy - ixy * ixy;
                if det.abs() < self.config.min_determinant {
                    // Textureless window: keep the coarse prior.
                    continue;
                }
                solved += 1;

                let mut u = self.scratch.flow_x[idx];
                let mut v = self.scratch.flow_y[idx];

                for _ in 0..self.config.iterations {
                    // Temporal mismatch of the warped current frame.
                    let mut bx = 0.0f32;
                    let mut by = 0.0f32;
                    for wy in -radius..=radius {
                        for wx in -radius..=radius {
                            let sx = (px + wx).clamp(0, width - 1);
                            let sy = (py + wy).clamp(0, height - 1);
                            let s = sy as usize * ref_level.width as usize + sx as usize;
                            let it = cur_level.bilinear(sx as f32 + u, sy as f32 + v)
                                - ref_level.at(sx, sy);
                            bx += self.scratch.grad_x[s] * it;
                            by += self.scratch.grad_y[s] * it;
                        }
                    }

                    let du = -(iyy * bx - ixy * by) / det;
                    let dv = -(ixx * by - ixy * bx) / det;
                    u += du;
                    v += dv;

                    if du * du + dv * dv
                        < self.config.convergence_epsilon * self.config.convergence_epsilon
                    {
                        break;
                    }
                }

                self.scratch.flow_x[idx] = u;
                self.scratch.flow_y[idx] = v;
            }
        }

        solved
    }
}
