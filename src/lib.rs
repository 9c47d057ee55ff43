//! OD Threshold Rust Extensions
//!
//! Optical density thresholding for microscopy images, with Python bindings
//! via PyO3 and WASM bindings for JavaScript.
//!
//! Each pixel's channel intensities are converted to optical density,
//! combined with configurable weights, and compared against a threshold.
//! Pixels on the retained side keep their color; the rest turn black. The
//! output is always RGBA with an opaque alpha channel.
//!
//! ## Image Format
//! Buffers are 8-bit with 1, 3, or 4 channels in one of two pixel orders:
//! - **Interleaved**: (height, width, channels)
//! - **Planar**: (channels, height, width)
//!
//! ## Example
//! ```
//! use odthreshold::buffer::{ColorModel, ColorSpace, PixelBuffer, PixelOrder, Size};
//! use odthreshold::filters::od_threshold::{Behavior, OdThresholdKernel};
//! use odthreshold::filters::Kernel;
//!
//! let source = PixelBuffer::from_raw(
//!     Size::new(2, 1),
//!     ColorSpace::new(ColorModel::Rgb),
//!     PixelOrder::Interleaved,
//!     vec![250, 250, 250, 10, 10, 10],
//! )
//! .unwrap();
//!
//! let kernel = OdThresholdKernel::new(0.2, Behavior::RetainLowerOd);
//! let mask = kernel.process(&source).unwrap();
//! assert_eq!(mask.pixel(0, 0), vec![250, 250, 250, 255]);
//! assert_eq!(mask.pixel(1, 0), vec![0, 0, 0, 255]);
//! ```

pub mod buffer;
pub mod error;
pub mod filters;
pub mod params;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use buffer::{ColorModel, ColorSpace, PixelBuffer, PixelOrder, Size};
pub use error::ThresholdError;
pub use filters::od_threshold::{Behavior, OdThresholdKernel};
pub use filters::Kernel;
pub use params::{ThresholdParams, ThresholdType};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::buffer::{ColorModel, ColorSpace, PixelBuffer, PixelOrder};
    use crate::error::ThresholdError;
    use crate::filters::od_conversion::OdLookup;
    use crate::filters::Kernel;
    use crate::params::{ThresholdParams, ThresholdType};

    fn value_error(err: ThresholdError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    // ========================================================================
    // OD Threshold
    // ========================================================================

    /// Threshold a u8 image on weighted optical density.
    ///
    /// # Arguments
    /// * `image` - (H, W, C) for interleaved or (C, H, W) for planar, C in {1, 3, 4}
    /// * `threshold_x100` - Threshold in hundredths of an OD unit (0-300)
    /// * `retainment` - 0 = retain lower OD, 1 = retain higher OD, other = no action
    /// * `r_weight`, `g_weight`, `b_weight` - Channel weights (0-10)
    /// * `order` - "interleaved" or "planar"
    ///
    /// # Returns
    /// RGBA image in the same pixel order as the input
    #[pyfunction]
    #[pyo3(signature = (
        image,
        threshold_x100=20.0,
        retainment=1,
        r_weight=1.0,
        g_weight=1.0,
        b_weight=1.0,
        order="interleaved",
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn od_threshold<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        threshold_x100: f64,
        retainment: usize,
        r_weight: f64,
        g_weight: f64,
        b_weight: f64,
        order: &str,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let order: PixelOrder = order.parse().map_err(value_error)?;
        let input = image.as_array();
        let channels = match order {
            PixelOrder::Interleaved => input.dim().2,
            PixelOrder::Planar => input.dim().0,
        };
        let model = ColorModel::from_channels(channels).ok_or_else(|| {
            PyValueError::new_err(format!("unsupported channel count: {channels}"))
        })?;
        let source = PixelBuffer::from_array(input.to_owned(), ColorSpace::new(model), order)
            .map_err(value_error)?;

        let params = ThresholdParams {
            threshold_x100,
            retainment,
            threshold_type: ThresholdType::WeightedAverage,
            weights: [r_weight, g_weight, b_weight],
        };
        let result = params.build_kernel().process(&source).map_err(value_error)?;
        Ok(result.into_array().into_pyarray(py))
    }

    /// Optical density of an 8-bit intensity.
    #[pyfunction]
    pub fn rgb_to_od(value: i32) -> f64 {
        OdLookup::shared().lookup_rgb_to_od(value)
    }

    /// OD Threshold Rust extension module
    #[pymodule]
    pub fn odthreshold(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(od_threshold, m)?)?;
        m.add_function(wrap_pyfunction!(rgb_to_od, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::odthreshold;
