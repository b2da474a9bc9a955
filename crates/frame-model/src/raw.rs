//! Raw capture buffer types.
//!
//! A [`RawFrameBuffer`] is exactly what the capture collaborator delivers:
//! native pixel layout, device orientation, no corrections applied.

use serde::{Deserialize, Serialize};

/// Pixel layout of a raw capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    /// 8-bit BGRA, 4 bytes per pixel, tightly packed.
    Bgra8,

    /// Biplanar full-range 4:2:0 YCbCr: a full-resolution luma plane
    /// followed by an interleaved half-resolution CbCr plane.
    Yuv420,
}

impl PixelLayout {
    /// Expected payload size in bytes for a buffer of the given geometry.
    pub fn payload_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelLayout::Bgra8 => pixels * 4,
            // Luma plane plus a CbCr plane at quarter resolution, two
            // bytes per chroma sample pair.
            PixelLayout::Yuv420 => {
                let chroma = (width as usize).div_ceil(2) * (height as usize).div_ceil(2);
                pixels + chroma * 2
            }
        }
    }
}

/// A raw captured image buffer in its native layout and orientation.
#[derive(Debug, Clone)]
pub struct RawFrameBuffer {
    /// Buffer width in pixels, as captured.
    pub width: u32,

    /// Buffer height in pixels, as captured.
    pub height: u32,

    /// Native pixel layout of `data`.
    pub layout: PixelLayout,

    /// Pixel payload. Tightly packed, plane order per `layout`.
    pub data: Vec<u8>,
}

impl RawFrameBuffer {
    /// Create a raw buffer without validating the payload.
    ///
    /// Validation happens at normalization time; the capture side is not
    /// trusted to always hand over addressable buffers.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Whether the payload is large enough to address every pixel the
    /// declared geometry promises.
    pub fn is_addressable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && !self.data.is_empty()
            && self.data.len() >= self.layout.payload_len(self.width, self.height)
    }
}
