//! Flow-visualization kernel.
//!
//! Maps a vector field to a renderable overlay: the field is divided into
//! fixed-size tiles, and each tile's mean vector is drawn as a small
//! triangle pointing along the flow direction. Direction selects the hue,
//! magnitude scales the triangle and its brightness. Tiles below the
//! visibility floor keep the neutral appearance.
//!
//! The kernel program ships as a packaged JSON descriptor loaded once at
//! process start. A missing or malformed descriptor permanently disables
//! visualization; it is never retried per frame.

use std::path::Path;

use serde::{Deserialize, Serialize};

use flowscope_common::error::{FlowscopeError, FlowscopeResult};
use flowscope_frame_model::{FlowVector, VectorField, VisualizationImage};

/// Packaged kernel descriptor: the tunable constants of the mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelProgram {
    /// Edge length of a visualization tile in pixels.
    pub tile_size: u32,

    /// Magnitude mapped to full brightness and full triangle size.
    /// Larger displacements saturate.
    pub max_magnitude: f32,

    /// Tiles whose mean magnitude falls below this stay neutral.
    pub min_visible_magnitude: f32,

    /// Color saturation of the direction hue, in [0, 1].
    pub saturation: f32,

    /// RGBA rendered where no motion is shown.
    pub neutral: [u8; 4],
}

impl KernelProgram {
    /// Load and validate a kernel descriptor from a packaged asset.
    pub fn load(path: &Path) -> FlowscopeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowscopeError::kernel_unavailable(format!(
                "Cannot read kernel descriptor {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a kernel descriptor from JSON text.
    pub fn from_json(json: &str) -> FlowscopeResult<Self> {
        let program: KernelProgram = serde_json::from_str(json).map_err(|e| {
            FlowscopeError::kernel_unavailable(format!("Malformed kernel descriptor: {e}"))
        })?;
        program.validate()?;
        Ok(program)
    }

    fn validate(&self) -> FlowscopeResult<()> {
        if self.tile_size == 0 {
            return Err(FlowscopeError::kernel_unavailable(
                "Kernel tile size must be at least 1",
            ));
        }
        if self.max_magnitude <= 0.0 || !self.max_magnitude.is_finite() {
            return Err(FlowscopeError::kernel_unavailable(
                "Kernel max magnitude must be positive and finite",
            ));
        }
        if !(0.0..=1.0).contains(&self.saturation) {
            return Err(FlowscopeError::kernel_unavailable(
                "Kernel saturation must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// The visualization stage: a loaded kernel program applied per field.
///
/// `render` is pure and deterministic — identical fields produce
/// byte-identical images.
pub struct FlowVisualizer {
    program: KernelProgram,
}

impl FlowVisualizer {
    pub fn new(program: KernelProgram) -> Self {
        Self { program }
    }

    /// Load the visualizer from a packaged kernel descriptor.
    pub fn load(path: &Path) -> FlowscopeResult<Self> {
        Ok(Self::new(KernelProgram::load(path)?))
    }

    pub fn program(&self) -> &KernelProgram {
        &self.program
    }

    /// Render a vector field as an overlay image of the same dimensions.
    pub fn render(&self, field: &VectorField) -> VisualizationImage {
        let width = field.width();
        let height = field.height();
        let tile = self.program.tile_size;
        let mut image = VisualizationImage::blank(width, height);

        if self.program.neutral != [0, 0, 0, 0] {
            for y in 0..height {
                for x in 0..width {
                    image.put(x, y, self.program.neutral);
                }
            }
        }

        let tiles_x = width.div_ceil(tile);
        let tiles_y = height.div_ceil(tile);

        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile;
                let y0 = ty * tile;
                let x1 = (x0 + tile).min(width);
                let y1 = (y0 + tile).min(height);

                let mean = tile_mean(field, x0, y0, x1, y1);
                let magnitude = mean.magnitude();
                if magnitude < self.program.min_visible_magnitude.max(f32::EPSILON) {
                    continue;
                }

                let strength = (magnitude / self.program.max_magnitude).clamp(0.0, 1.0);
                let hue = mean.angle().rem_euclid(std::f32::consts::TAU)
                    / std::f32::consts::TAU
                    * 360.0;
                let rgb = hsv_to_rgb(hue, self.program.saturation, 0.35 + 0.65 * strength);
                let color = [rgb[0], rgb[1], rgb[2], 255];

                draw_tile_triangle(&mut image, x0, y0, x1, y1, mean, strength, color);
            }
        }

        image
    }
}

/// Mean vector over a tile region.
fn tile_mean(field: &VectorField, x0: u32, y0: u32, x1: u32, y1: u32) -> FlowVector {
    let mut sum_dx = 0.0f32;
    let mut sum_dy = 0.0f32;
    let mut count = 0u32;
    for y in y0..y1 {
        for x in x0..x1 {
            if let Some(v) = field.get(x, y) {
                sum_dx += v.dx;
                sum_dy += v.dy;
                count += 1;
            }
        }
    }
    if count == 0 {
        return FlowVector::default();
    }
    FlowVector::new(sum_dx / count as f32, sum_dy / count as f32)
}

/// Rasterize an oriented triangle into the tile bounds.
///
/// The apex points along the flow direction; the base sits behind the tile
/// center. Triangle length scales with `strength`.
fn draw_tile_triangle(
    image: &mut VisualizationImage,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    flow: FlowVector,
    strength: f32,
    color: [u8; 4],
) {
    let cx = (x0 + x1) as f32 / 2.0;
    let cy = (y0 + y1) as f32 / 2.0;
    let half_extent = ((x1 - x0).min(y1 - y0)) as f32 / 2.0;
    if half_extent < 1.0 {
        // Tile too small for geometry; mark the cell directly.
        image.put(x0, y0, color);
        return;
    }

    let magnitude = flow.magnitude();
    let (dir_x, dir_y) = (flow.dx / magnitude, flow.dy / magnitude);
    let (perp_x, perp_y) = (-dir_y, dir_x);

    let length = half_extent * (0.4 + 0.6 * strength);
    let half_base = (length * 0.5).max(0.5);

    let apex = (cx + dir_x * length, cy + dir_y * length);
    let base_a = (
        cx - dir_x * length * 0.5 + perp_x * half_base,
        cy - dir_y * length * 0.5 + perp_y * half_base,
    );
    let base_b = (
        cx - dir_x * length * 0.5 - perp_x * half_base,
        cy - dir_y * length * 0.5 - perp_y * half_base,
    );

    for y in y0..y1 {
        for x in x0..x1 {
            let p = (x as f32 + 0.5, y as f32 + 0.5);
            if point_in_triangle(p, apex, base_a, base_b) {
                image.put(x, y, color);
            }
        }
    }
}

/// Sign-consistent half-plane test, winding-independent.
fn point_in_triangle(
    p: (f32, f32),
    a: (f32, f32),
    b: (f32, f32),
    c: (f32, f32),
) -> bool {
    let d1 = edge_sign(p, a, b);
    let d2 = edge_sign(p, b, c);
    let d3 = edge_sign(p, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

fn edge_sign(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    (p.0 - b.0) * (a.1 - b.1) - (a.0 - b.0) * (p.1 - b.1)
}

/// HSV to RGB, `h` in degrees [0, 360), `s` and `v` in [0, 1].
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PROGRAM: &str = r#"{
        "tile_size": 8,
        "max_magnitude": 10.0,
        "min_visible_magnitude": 0.05,
        "saturation": 1.0,
        "neutral": [0, 0, 0, 0]
    }"#;

    fn visualizer() -> FlowVisualizer {
        FlowVisualizer::new(KernelProgram::from_json(TEST_PROGRAM).unwrap())
    }

    fn uniform_field(width: u32, height: u32, dx: f32, dy: f32) -> VectorField {
        VectorField::new(
            width,
            height,
            vec![FlowVector::new(dx, dy); (width * height) as usize],
        )
        .unwrap()
    }

    #[test]
    fn descriptor_parses_and_validates() {
        let program = KernelProgram::from_json(TEST_PROGRAM).unwrap();
        assert_eq!(program.tile_size, 8);
        assert_eq!(program.neutral, [0, 0, 0, 0]);
    }

    #[test]
    fn malformed_descriptor_is_kernel_unavailable() {
        let err = KernelProgram::from_json("not json").unwrap_err();
        assert!(matches!(err, FlowscopeError::KernelUnavailable { .. }));
    }

    #[test]
    fn invalid_descriptor_values_are_rejected() {
        let zero_tile = TEST_PROGRAM.replace("\"tile_size\": 8", "\"tile_size\": 0");
        assert!(KernelProgram::from_json(&zero_tile).is_err());

        let bad_magnitude =
            TEST_PROGRAM.replace("\"max_magnitude\": 10.0", "\"max_magnitude\": -1.0");
        assert!(KernelProgram::from_json(&bad_magnitude).is_err());
    }

    #[test]
    fn missing_asset_is_kernel_unavailable() {
        let err = KernelProgram::load(Path::new("/nonexistent/flowview.json")).unwrap_err();
        assert!(matches!(err, FlowscopeError::KernelUnavailable { .. }));
    }

    #[test]
    fn render_preserves_field_dimensions() {
        let field = uniform_field(30, 22, 3.0, 0.0);
        let image = visualizer().render(&field);
        assert_eq!(image.width(), 30);
        assert_eq!(image.height(), 22);
    }

    #[test]
    fn render_is_idempotent() {
        let field = uniform_field(32, 32, 2.5, -1.5);
        let v = visualizer();
        let first = v.render(&field);
        let second = v.render(&field);
        assert_eq!(first.data(), second.data());
    }

    #[test]
    fn zero_field_renders_neutral_everywhere() {
        let field = VectorField::zeroed(32, 32);
        let image = visualizer().render(&field);
        assert!(image.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn sub_threshold_motion_stays_neutral() {
        let field = uniform_field(16, 16, 0.01, 0.01);
        let image = visualizer().render(&field);
        assert!(image.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn visible_motion_marks_pixels() {
        let field = uniform_field(32, 32, 4.0, 0.0);
        let image = visualizer().render(&field);
        assert!(image.data().iter().any(|&b| b != 0));
    }

    #[test]
    fn direction_changes_the_rendering() {
        let v = visualizer();
        let rightward = v.render(&uniform_field(32, 32, 4.0, 0.0));
        let leftward = v.render(&uniform_field(32, 32, -4.0, 0.0));
        assert_ne!(rightward.data(), leftward.data());
    }

    #[test]
    fn stronger_motion_is_brighter() {
        let v = visualizer();
        let slow = v.render(&uniform_field(16, 16, 1.0, 0.0));
        let fast = v.render(&uniform_field(16, 16, 9.0, 0.0));

        let max_channel = |img: &VisualizationImage| {
            img.data()
                .chunks_exact(4)
                .map(|px| px[0].max(px[1]).max(px[2]))
                .max()
                .unwrap()
        };
        assert!(max_channel(&fast) > max_channel(&slow));
    }

    #[test]
    fn non_default_neutral_fills_background() {
        let json = TEST_PROGRAM.replace("[0, 0, 0, 0]", "[5, 5, 5, 255]");
        let v = FlowVisualizer::new(KernelProgram::from_json(&json).unwrap());
        let image = v.render(&VectorField::zeroed(8, 8));
        assert_eq!(image.pixel(0, 0), Some([5, 5, 5, 255]));
    }
}
