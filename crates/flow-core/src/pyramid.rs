//! Gaussian image pyramids over luma planes.
//!
//! The estimator refines flow coarse-to-fine; each pyramid level halves
//! both dimensions after a 5-tap binomial blur. Level 0 is full resolution.

/// A single pyramid level: a row-major luma plane.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl PyramidLevel {
    /// Clamped sample at integer coordinates.
    pub fn at(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width as usize + x]
    }

    /// Bilinear sample at fractional coordinates, clamped at the border.
    pub fn bilinear(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let x0 = x0 as i64;
        let y0 = y0 as i64;

        let top = self.at(x0, y0) * (1.0 - fx) + self.at(x0 + 1, y0) * fx;
        let bottom = self.at(x0, y0 + 1) * (1.0 - fx) + self.at(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// A coarse-to-fine stack of blurred, decimated luma planes.
#[derive(Debug, Clone)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

/// Levels stop subdividing once either dimension would drop below this.
const MIN_LEVEL_DIMENSION: u32 = 16;

impl Pyramid {
    /// Build a pyramid from a full-resolution luma plane.
    ///
    /// `max_levels` bounds the stack depth; the minimum-dimension floor
    /// may stop it earlier.
    pub fn build(luma: Vec<f32>, width: u32, height: u32, max_levels: usize) -> Self {
        let mut levels = vec![PyramidLevel {
            width,
            height,
            data: luma,
        }];

        while levels.len() < max_levels {
            let prev = levels.last().unwrap();
            if prev.width / 2 < MIN_LEVEL_DIMENSION || prev.height / 2 < MIN_LEVEL_DIMENSION {
                break;
            }
            levels.push(downsample(prev));
        }

        Self { levels }
    }

    /// Number of levels actually built.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Level `i`, where 0 is full resolution.
    pub fn level(&self, i: usize) -> &PyramidLevel {
        &self.levels[i]
    }
}

/// Binomial 5-tap blur followed by 2× decimation.
fn downsample(level: &PyramidLevel) -> PyramidLevel {
    let blurred = blur(level);
    let out_width = level.width / 2;
    let out_height = level.height / 2;
    let mut data = Vec::with_capacity(out_width as usize * out_height as usize);

    for y in 0..out_height {
        for x in 0..out_width {
            data.push(blurred.at(x as i64 * 2, y as i64 * 2));
        }
    }

    PyramidLevel {
        width: out_width,
        height: out_height,
        data,
    }
}

const KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Separable 5-tap binomial blur with clamped borders.
fn blur(level: &PyramidLevel) -> PyramidLevel {
    let width = level.width;
    let height = level.height;

    // Horizontal pass.
    let mut horizontal = PyramidLevel {
        width,
        height,
        data: vec![0.0; width as usize * height as usize],
    };
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut acc = 0.0;
            for (k, weight) in KERNEL.iter().enumerate() {
                acc += weight * level.at(x + k as i64 - 2, y);
            }
            horizontal.data[y as usize * width as usize + x as usize] = acc;
        }
    }

    // Vertical pass.
    let mut out = PyramidLevel {
        width,
        height,
        data: vec![0.0; width as usize * height as usize],
    };
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut acc = 0.0;
            for (k, weight) in KERNEL.iter().enumerate() {
                acc += weight * horizontal.at(x, y + k as i64 - 2);
            }
            out.data[y as usize * width as usize + x as usize] = acc;
        }
    }

    out
}
