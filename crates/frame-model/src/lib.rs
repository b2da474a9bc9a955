//! Flowscope Frame Model
//!
//! Defines the core data contracts for the flow pipeline:
//! - **Raw buffers:** Untouched capture output in its native pixel layout
//! - **Frames:** Orientation-corrected RGBA images ready for estimation
//! - **Vector fields:** Dense per-pixel motion estimates
//! - **Visualization images:** Rendered flow overlays handed to the display
//!
//! Frames always carry the fixed quarter-turn orientation correction: a
//! `W×H` raw buffer normalizes to an `H×W` frame. Downstream code must not
//! assume raw orientation is preserved.

pub mod field;
pub mod frame;
pub mod raw;
pub mod visualization;

pub use field::*;
pub use frame::*;
pub use raw::*;
pub use visualization::*;
