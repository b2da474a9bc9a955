//! Frame normalization: raw capture buffers to estimation-ready frames.
//!
//! The capture device is mounted a quarter turn off the display axis, so
//! every raw buffer is rotated 90° clockwise while being converted to RGBA.
//! A `W×H` raw buffer therefore normalizes to an `H×W` frame. The rotation
//! is fixed by the physical mounting, not auto-detected.

use flowscope_common::error::{FlowscopeError, FlowscopeResult};
use flowscope_frame_model::{Frame, PixelLayout, RawFrameBuffer};

/// Convert a raw capture buffer into an orientation-corrected RGBA frame.
///
/// Fails when the buffer cannot be addressed as an image: empty payload,
/// payload shorter than the declared geometry, or zero-sized dimensions.
pub fn normalize_frame(raw: &RawFrameBuffer) -> FlowscopeResult<Frame> {
    if !raw.is_addressable() {
        return Err(FlowscopeError::capture(format!(
            "Raw buffer not addressable: {}x{} {:?} with {} payload bytes",
            raw.width,
            raw.height,
            raw.layout,
            raw.data.len()
        )));
    }

    let out_width = raw.height;
    let out_height = raw.width;
    let mut data = vec![0u8; out_width as usize * out_height as usize * 4];

    for yo in 0..out_height {
        for xo in 0..out_width {
            // Clockwise quarter turn: output (xo, yo) reads input
            // (yo, raw.height - 1 - xo).
            let xi = yo;
            let yi = raw.height - 1 - xo;
            let rgba = sample_rgba(raw, xi, yi);
            let idx = (yo as usize * out_width as usize + xo as usize) * 4;
            data[idx..idx + 4].copy_from_slice(&rgba);
        }
    }

    Frame::from_rgba(out_width, out_height, data).ok_or_else(|| {
        FlowscopeError::capture(format!(
            "Normalized geometry invalid: {out_width}x{out_height}"
        ))
    })
}

fn sample_rgba(raw: &RawFrameBuffer, x: u32, y: u32) -> [u8; 4] {
    match raw.layout {
        PixelLayout::Bgra8 => {
            let idx = (y as usize * raw.width as usize + x as usize) * 4;
            let px = &raw.data[idx..idx + 4];
            [px[2], px[1], px[0], px[3]]
        }
        PixelLayout::Yuv420 => {
            let luma_len = raw.width as usize * raw.height as usize;
            let chroma_cols = (raw.width as usize).div_ceil(2);

            let luma = raw.data[y as usize * raw.width as usize + x as usize];
            let chroma_idx =
                luma_len + ((y as usize / 2) * chroma_cols + x as usize / 2) * 2;
            let cb = raw.data[chroma_idx] as f32 - 128.0;
            let cr = raw.data[chroma_idx + 1] as f32 - 128.0;

            // BT.601 full-range.
            let yf = luma as f32;
            let r = yf + 1.402 * cr;
            let g = yf - 0.344_136 * cb - 0.714_136 * cr;
            let b = yf + 1.772 * cb;
            [clamp_u8(r), clamp_u8(g), clamp_u8(b), 255]
        }
    }
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bgra_buffer(width: u32, height: u32, pixels: &[[u8; 4]]) -> RawFrameBuffer {
        assert_eq!(pixels.len(), (width * height) as usize);
        let data = pixels.iter().flatten().copied().collect();
        RawFrameBuffer::new(width, height, PixelLayout::Bgra8, data)
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let raw = RawFrameBuffer::new(640, 480, PixelLayout::Bgra8, vec![]);
        assert!(matches!(
            normalize_frame(&raw),
            Err(FlowscopeError::Capture { .. })
        ));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let raw = RawFrameBuffer::new(640, 480, PixelLayout::Yuv420, vec![0u8; 640]);
        assert!(normalize_frame(&raw).is_err());
    }

    #[test]
    fn output_dimensions_are_swapped() {
        let raw = RawFrameBuffer::new(6, 4, PixelLayout::Bgra8, vec![0u8; 6 * 4 * 4]);
        let frame = normalize_frame(&raw).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 6);
    }

    #[test]
    fn clockwise_rotation_moves_top_left_to_top_right() {
        // 2x3 raw buffer, red marker at raw (0, 0), rest black.
        let mut pixels = vec![[0, 0, 0, 255u8]; 6];
        pixels[0] = [0, 0, 255, 255]; // BGRA red
        let raw = bgra_buffer(2, 3, &pixels);

        let frame = normalize_frame(&raw).unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        // After a clockwise quarter turn the top-left corner lands top-right.
        assert_eq!(frame.rgba(2, 0), Some([255, 0, 0, 255]));
        assert_eq!(frame.rgba(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn bgra_channels_reorder_to_rgba() {
        let raw = bgra_buffer(1, 1, &[[10, 20, 30, 40]]);
        let frame = normalize_frame(&raw).unwrap();
        assert_eq!(frame.rgba(0, 0), Some([30, 20, 10, 40]));
    }

    #[test]
    fn yuv_neutral_chroma_is_gray() {
        // 2x2 full-range YUV: luma 128, chroma centered.
        let data = vec![128, 128, 128, 128, 128, 128];
        let raw = RawFrameBuffer::new(2, 2, PixelLayout::Yuv420, data);
        let frame = normalize_frame(&raw).unwrap();
        let [r, g, b, a] = frame.rgba(0, 0).unwrap();
        assert_eq!(a, 255);
        assert!(r.abs_diff(128) <= 1);
        assert!(g.abs_diff(128) <= 1);
        assert!(b.abs_diff(128) <= 1);
    }

    #[test]
    fn yuv_peak_luma_is_white() {
        let data = vec![255, 255, 255, 255, 128, 128];
        let raw = RawFrameBuffer::new(2, 2, PixelLayout::Yuv420, data);
        let frame = normalize_frame(&raw).unwrap();
        assert_eq!(frame.rgba(1, 1), Some([255, 255, 255, 255]));
    }

    proptest! {
        #[test]
        fn dimension_swap_holds_for_all_valid_buffers(
            width in 1u32..32,
            height in 1u32..32,
            seed in any::<u8>(),
        ) {
            let len = PixelLayout::Bgra8.payload_len(width, height);
            let data = (0..len).map(|i| (i as u8).wrapping_add(seed)).collect();
            let raw = RawFrameBuffer::new(width, height, PixelLayout::Bgra8, data);

            let frame = normalize_frame(&raw).unwrap();
            prop_assert_eq!(frame.width(), height);
            prop_assert_eq!(frame.height(), width);
        }
    }
}
