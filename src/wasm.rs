//! WebAssembly exports for the OD threshold.
//!
//! These functions are exposed to JavaScript via wasm-bindgen. Images cross
//! the boundary as flat u8 arrays with explicit dimensions.

use wasm_bindgen::prelude::*;

use crate::buffer::{ColorModel, ColorSpace, PixelBuffer, PixelOrder, Size};
use crate::filters::Kernel;
use crate::params::{ThresholdParams, ThresholdType};

/// Threshold an image on weighted optical density.
///
/// # Arguments
/// * `data` - Flat array of u8 elements (length = width * height * channels)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `channels` - 1, 3, or 4
/// * `order` - 0 = interleaved, 1 = planar
/// * `threshold_x100` - Threshold in hundredths of an OD unit (0-300)
/// * `retainment` - 0 = retain lower OD, 1 = retain higher OD, other = no action
/// * `r_weight`, `g_weight`, `b_weight` - Channel weights (0-10)
///
/// # Returns
/// Flat RGBA array (length = width * height * 4) in the same pixel order
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn od_threshold_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    order: u8,
    threshold_x100: f64,
    retainment: usize,
    r_weight: f64,
    g_weight: f64,
    b_weight: f64,
) -> Result<Vec<u8>, JsValue> {
    let order = PixelOrder::try_from(order).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let model = ColorModel::from_channels(channels)
        .ok_or_else(|| JsValue::from_str(&format!("unsupported channel count: {channels}")))?;
    let source = PixelBuffer::from_raw(
        Size::new(width, height),
        ColorSpace::new(model),
        order,
        data.to_vec(),
    )
    .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let params = ThresholdParams {
        threshold_x100,
        retainment,
        threshold_type: ThresholdType::WeightedAverage,
        weights: [r_weight, g_weight, b_weight],
    };
    let result = params
        .build_kernel()
        .process(&source)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    Ok(result.into_raw_vec())
}
