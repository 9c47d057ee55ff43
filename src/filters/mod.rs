//! Filter kernels operating on [`PixelBuffer`]s.
//!
//! ## Supported Formats
//!
//! Kernels accept 8-bit images in either pixel order:
//!
//! | Format | Channels | Notes |
//! |--------|----------|-------|
//! | Grayscale | 1 | Single channel replicated where color is needed |
//! | RGB / BGR | 3 | Channels read in storage order |
//! | RGBA / BGRA | 4 | Alpha is not read by the OD kernels |
//!
//! ## Architecture
//!
//! - **Kernel trait** - one buffer in, one freshly allocated buffer out
//! - **Fixed output color space** - each kernel declares what it produces
//! - **Pure** - the only state is the kernel configuration, read at call time
//! - **Thread-safe** - per-pixel evaluation runs on rayon

use crate::buffer::{ColorSpace, PixelBuffer};
use crate::error::ThresholdError;

pub mod od_conversion;
pub mod od_threshold;

/// Transforms one pixel buffer into another.
pub trait Kernel {
    /// Apply the kernel to `source`, returning a new buffer.
    fn process(&self, source: &PixelBuffer) -> Result<PixelBuffer, ThresholdError>;

    /// Color space of every buffer returned by [`Kernel::process`].
    fn color_space(&self) -> ColorSpace;
}
