//! Optical density threshold: a binary retention mask over a color image.
//!
//! Each pixel's first three channels are converted to optical density,
//! combined as a weighted average, and compared against a threshold:
//!
//! ```text
//! od = (w0 * OD(c0) + w1 * OD(c1) + w2 * OD(c2)) / (w0 + w1 + w2)
//! ```
//!
//! Retained pixels keep their original color; all other pixels become black.
//! The output is always RGBA with a fully opaque alpha channel, so retention
//! is expressed purely through the color channels.
//!
//! ## Supported Formats
//!
//! - **Grayscale**: the single channel is read three times
//! - **RGB / BGR**: channels 0, 1, 2 in storage order
//! - **RGBA / BGRA**: channels 0, 1, 2; the source alpha is ignored
//!
//! Both interleaved and planar pixel orders are accepted; the output keeps the
//! pixel order of the source.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use super::od_conversion::{OdConverter, OdLookup};
use super::Kernel;
use crate::buffer::{ColorModel, ColorSpace, PixelBuffer};
use crate::error::ThresholdError;

/// Which side of the threshold is kept.
///
/// Discriminants are stable and match the host option list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Behavior {
    /// Keep pixels whose weighted OD is at or below the threshold (lighter).
    RetainLowerOd = 0,
    /// Keep pixels whose weighted OD is at or above the threshold (darker).
    RetainHigherOd = 1,
    /// Keep nothing.
    NoAction = 2,
}

impl Behavior {
    /// Map a host option index; unknown indices disable the kernel.
    pub fn from_option_index(index: usize) -> Self {
        match index {
            0 => Self::RetainLowerOd,
            1 => Self::RetainHigherOd,
            _ => Self::NoAction,
        }
    }
}

/// Source channels feeding the three OD terms of a pixel.
///
/// Grayscale (or any single-channel) sources read channel 0 three times.
/// Other sources read channels 0, 1, 2 without color-model reordering.
pub fn source_channel_map(
    model: ColorModel,
    channels: usize,
) -> Result<[usize; 3], ThresholdError> {
    let map = if model == ColorModel::Grayscale || channels == 1 {
        [0, 0, 0]
    } else {
        [0, 1, 2]
    };

    match map.iter().find(|&&channel| channel >= channels) {
        Some(&channel) => Err(ThresholdError::ChannelOutOfRange { channel, channels }),
        None => Ok(map),
    }
}

/// Thresholds an image on its weighted optical density.
#[derive(Clone)]
pub struct OdThresholdKernel {
    od_threshold: f64,
    behavior: Behavior,
    weights: [f64; 3],
    converter: Arc<dyn OdConverter>,
    revision: u64,
}

impl std::fmt::Debug for OdThresholdKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdThresholdKernel")
            .field("od_threshold", &self.od_threshold)
            .field("behavior", &self.behavior)
            .field("weights", &self.weights)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl OdThresholdKernel {
    /// Create a kernel with equal channel weights (1, 1, 1).
    ///
    /// # Arguments
    /// * `od_threshold` - Threshold in OD units (typically 0.0-3.0)
    /// * `behavior` - Which side of the threshold to retain
    pub fn new(od_threshold: f64, behavior: Behavior) -> Self {
        Self {
            od_threshold,
            behavior,
            weights: [1.0; 3],
            converter: OdLookup::shared(),
            revision: 0,
        }
    }

    /// Replace the channel weights (typically 0.0-10.0 each).
    pub fn with_weights(mut self, weights: [f64; 3]) -> Self {
        self.weights = weights;
        self
    }

    /// Replace the intensity-to-OD conversion.
    pub fn with_converter(mut self, converter: Arc<dyn OdConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Threshold in OD units.
    pub fn od_threshold(&self) -> f64 {
        self.od_threshold
    }

    /// Which side of the threshold is retained.
    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// Weights of source channels 0, 1 and 2.
    pub fn weights(&self) -> [f64; 3] {
        self.weights
    }

    /// Configuration revision, bumped on every effective setter call.
    ///
    /// Hosts compare this against the revision of their last rendered output
    /// to decide whether the image must be recomputed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Set the threshold, bumping the revision only if the value changed.
    pub fn set_od_threshold(&mut self, value: f64) {
        if self.od_threshold != value {
            self.od_threshold = value;
            self.update();
        }
    }

    /// Set the retention side, bumping the revision only if it changed.
    pub fn set_behavior(&mut self, behavior: Behavior) {
        if self.behavior != behavior {
            self.behavior = behavior;
            self.update();
        }
    }

    /// Set the channel weights, bumping the revision only if any changed.
    pub fn set_weights(&mut self, weights: [f64; 3]) {
        if self.weights != weights {
            self.weights = weights;
            self.update();
        }
    }

    fn update(&mut self) {
        self.revision += 1;
        trace!(
            revision = self.revision,
            od_threshold = self.od_threshold,
            behavior = ?self.behavior,
            weights = ?self.weights,
            "od threshold configuration changed"
        );
    }

    /// Sum of the weights, or 1.0 when they sum to exactly zero.
    pub fn weight_denominator(&self) -> f64 {
        let sum: f64 = self.weights.iter().sum();
        if sum == 0.0 {
            1.0
        } else {
            sum
        }
    }

    /// Weighted average OD of one pixel.
    ///
    /// # Arguments
    /// * `source` - Source image
    /// * `pixel` - Linear pixel index (`y * width + x`)
    /// * `map` - Source channels from [`source_channel_map`]
    pub fn combined_od(&self, source: &PixelBuffer, pixel: usize, map: &[usize; 3]) -> f64 {
        let total: f64 = map
            .iter()
            .zip(self.weights.iter())
            .map(|(&channel, &weight)| {
                let intensity = source.at(source.offset(pixel, channel)) as i32;
                weight * self.converter.rgb_to_od(intensity)
            })
            .sum();
        total / self.weight_denominator()
    }

    /// Retention predicate; both comparisons are inclusive.
    #[inline]
    pub fn retains(&self, od: f64) -> bool {
        match self.behavior {
            Behavior::RetainLowerOd => od <= self.od_threshold,
            Behavior::RetainHigherOd => od >= self.od_threshold,
            Behavior::NoAction => false,
        }
    }

    /// Per-pixel retention decisions in linear pixel order.
    pub fn retention_mask(&self, source: &PixelBuffer) -> Result<Vec<bool>, ThresholdError> {
        let map = source_channel_map(source.color_space().model, source.channels())?;
        Ok(self.evaluate(source, &map))
    }

    fn evaluate(&self, source: &PixelBuffer, map: &[usize; 3]) -> Vec<bool> {
        (0..source.pixel_count())
            .into_par_iter()
            .map(|px| self.retains(self.combined_od(source, px, map)))
            .collect()
    }
}

impl Kernel for OdThresholdKernel {
    fn process(&self, source: &PixelBuffer) -> Result<PixelBuffer, ThresholdError> {
        let map = source_channel_map(source.color_space().model, source.channels())
            .inspect_err(|e| warn!("od threshold aborted: {e}"))?;
        let mask = self.evaluate(source, &map);

        let output_space = self.color_space();
        let mut output = PixelBuffer::new(source.size(), output_space, source.order());
        output.fill(0);

        let opaque = output_space.max_channel_value();
        let alpha_channel = map.len();
        let mut retained = 0usize;

        for (px, &keep) in mask.iter().enumerate() {
            if keep {
                for (ch, &src_ch) in map.iter().enumerate() {
                    let dst = output.offset(px, ch);
                    output.set_value(dst, source.at(source.offset(px, src_ch)));
                }
                retained += 1;
            }
            let dst = output.offset(px, alpha_channel);
            output.set_value(dst, opaque);
        }

        debug!(
            width = source.width(),
            height = source.height(),
            order = ?source.order(),
            retained,
            "od threshold applied"
        );

        Ok(output)
    }

    fn color_space(&self) -> ColorSpace {
        ColorSpace::RGBA8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{PixelOrder, Size};

    /// Lookup stub with hand-picked OD values.
    struct StubOd(fn(i32) -> f64);

    impl OdConverter for StubOd {
        fn rgb_to_od(&self, intensity: i32) -> f64 {
            (self.0)(intensity)
        }
    }

    fn stub(f: fn(i32) -> f64) -> Arc<dyn OdConverter> {
        Arc::new(StubOd(f))
    }

    fn percent_od(i: i32) -> f64 {
        i as f64 / 100.0
    }

    fn buffer(
        width: usize,
        height: usize,
        model: ColorModel,
        order: PixelOrder,
        data: Vec<u8>,
    ) -> PixelBuffer {
        let space = ColorSpace::new(model);
        PixelBuffer::from_raw(Size::new(width, height), space, order, data).unwrap()
    }

    /// Interleaved RGB test image and its planar twin.
    fn gradient_pair(width: usize, height: usize) -> (PixelBuffer, PixelBuffer) {
        let n = width * height;
        let mut inter = Vec::with_capacity(n * 3);
        let mut planar = vec![0u8; n * 3];
        for px in 0..n {
            let rgb = [(px * 37 % 256) as u8, (px * 91 % 256) as u8, (255 - px * 13 % 256) as u8];
            for (c, &v) in rgb.iter().enumerate() {
                inter.push(v);
                planar[c * n + px] = v;
            }
        }
        (
            buffer(width, height, ColorModel::Rgb, PixelOrder::Interleaved, inter),
            buffer(width, height, ColorModel::Rgb, PixelOrder::Planar, planar),
        )
    }

    #[test]
    fn test_grayscale_scenario() {
        let kernel =
            OdThresholdKernel::new(0.5, Behavior::RetainLowerOd).with_converter(stub(|i| match i {
                50 => 0.3,
                200 => 0.9,
                _ => 0.0,
            }));
        let source = buffer(2, 1, ColorModel::Grayscale, PixelOrder::Interleaved, vec![50, 200]);

        let result = kernel.process(&source).unwrap();

        assert_eq!(result.channels(), 4);
        assert_eq!(result.pixel(0, 0), vec![50, 50, 50, 255]);
        assert_eq!(result.pixel(1, 0), vec![0, 0, 0, 255]);
    }

    #[test]
    fn test_single_weight_ignores_other_channels() {
        let kernel = OdThresholdKernel::new(0.1, Behavior::RetainLowerOd)
            .with_weights([1.0, 0.0, 0.0])
            .with_converter(stub(percent_od));

        let a = buffer(1, 1, ColorModel::Rgb, PixelOrder::Interleaved, vec![10, 20, 30]);
        let b = buffer(1, 1, ColorModel::Rgb, PixelOrder::Interleaved, vec![10, 250, 250]);
        let map = source_channel_map(ColorModel::Rgb, 3).unwrap();

        assert_eq!(kernel.combined_od(&a, 0, &map), 0.1);
        assert_eq!(kernel.combined_od(&b, 0, &map), 0.1);
        assert_eq!(kernel.process(&a).unwrap().pixel(0, 0), vec![10, 20, 30, 255]);
        assert_eq!(kernel.process(&b).unwrap().pixel(0, 0), vec![10, 250, 250, 255]);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let source = buffer(1, 1, ColorModel::Grayscale, PixelOrder::Interleaved, vec![40]);
        let map = source_channel_map(ColorModel::Grayscale, 1).unwrap();
        for behavior in [Behavior::RetainLowerOd, Behavior::RetainHigherOd] {
            let mut kernel = OdThresholdKernel::new(0.0, behavior).with_converter(stub(percent_od));
            let od = kernel.combined_od(&source, 0, &map);
            kernel.set_od_threshold(od);
            let result = kernel.process(&source).unwrap();
            assert_eq!(result.pixel(0, 0), vec![40, 40, 40, 255], "{behavior:?}");
        }
    }

    #[test]
    fn test_retain_higher() {
        let kernel =
            OdThresholdKernel::new(0.5, Behavior::RetainHigherOd).with_converter(stub(percent_od));
        let source = buffer(3, 1, ColorModel::Grayscale, PixelOrder::Interleaved, vec![20, 50, 80]);

        assert_eq!(kernel.retention_mask(&source).unwrap(), vec![false, true, true]);
    }

    #[test]
    fn test_zero_weights_fall_back_to_unit_denominator() {
        let mut kernel =
            OdThresholdKernel::new(0.0, Behavior::RetainLowerOd).with_weights([0.0; 3]);
        assert_eq!(kernel.weight_denominator(), 1.0);

        let data = vec![0, 0, 0, 255, 128, 3];
        let source = buffer(2, 1, ColorModel::Rgb, PixelOrder::Interleaved, data);
        let map = source_channel_map(ColorModel::Rgb, 3).unwrap();
        for px in 0..2 {
            assert_eq!(kernel.combined_od(&source, px, &map), 0.0);
        }
        assert_eq!(kernel.retention_mask(&source).unwrap(), vec![true, true]);

        kernel.set_behavior(Behavior::RetainHigherOd);
        assert_eq!(kernel.retention_mask(&source).unwrap(), vec![true, true]);
        kernel.set_od_threshold(0.1);
        assert_eq!(kernel.retention_mask(&source).unwrap(), vec![false, false]);
    }

    #[test]
    fn test_no_action_retains_nothing() {
        let (source, _) = gradient_pair(4, 3);
        for threshold in [-1.0, 0.0, 1.5, 100.0] {
            let kernel = OdThresholdKernel::new(threshold, Behavior::NoAction);
            let result = kernel.process(&source).unwrap();
            for y in 0..3 {
                for x in 0..4 {
                    assert_eq!(result.pixel(x, y), vec![0, 0, 0, 255]);
                }
            }
        }
    }

    #[test]
    fn test_output_is_always_rgba() {
        let kernel = OdThresholdKernel::new(3.0, Behavior::RetainLowerOd);
        for (model, data) in [
            (ColorModel::Grayscale, vec![10u8, 20]),
            (ColorModel::Rgb, vec![1, 2, 3, 4, 5, 6]),
            (ColorModel::Rgba, vec![1, 2, 3, 0, 4, 5, 6, 0]),
            (ColorModel::Bgr, vec![1, 2, 3, 4, 5, 6]),
        ] {
            let source = buffer(2, 1, model, PixelOrder::Interleaved, data);
            let result = kernel.process(&source).unwrap();
            assert_eq!(result.color_space(), ColorSpace::RGBA8);
            assert_eq!(result.size(), source.size());
            assert_eq!(result.count(), 2 * 4);
            assert_eq!(result.pixel(1, 0)[3], 255, "{model:?}");
        }
    }

    #[test]
    fn test_rgba_source_alpha_is_replaced() {
        let kernel = OdThresholdKernel::new(3.0, Behavior::RetainLowerOd);
        let data = vec![200, 180, 160, 0];
        let source = buffer(1, 1, ColorModel::Rgba, PixelOrder::Interleaved, data);
        assert_eq!(kernel.process(&source).unwrap().pixel(0, 0), vec![200, 180, 160, 255]);
    }

    #[test]
    fn test_real_lookup_separates_light_and_dark() {
        // OD(250) ~ 0.009, OD(10) ~ 1.41
        let kernel = OdThresholdKernel::new(0.2, Behavior::RetainLowerOd);
        let data = vec![250, 250, 250, 10, 10, 10];
        let source = buffer(2, 1, ColorModel::Rgb, PixelOrder::Interleaved, data);
        let result = kernel.process(&source).unwrap();
        assert_eq!(result.pixel(0, 0), vec![250, 250, 250, 255]);
        assert_eq!(result.pixel(1, 0), vec![0, 0, 0, 255]);
    }

    #[test]
    fn test_layout_equivalence() {
        let (inter, planar) = gradient_pair(5, 4);
        let kernel =
            OdThresholdKernel::new(0.6, Behavior::RetainHigherOd).with_weights([2.0, 1.0, 0.5]);

        let out_inter = kernel.process(&inter).unwrap();
        let out_planar = kernel.process(&planar).unwrap();

        assert_eq!(out_inter.order(), PixelOrder::Interleaved);
        assert_eq!(out_planar.order(), PixelOrder::Planar);
        assert_eq!(kernel.retention_mask(&inter).unwrap(), kernel.retention_mask(&planar).unwrap());
        for y in 0..4 {
            for x in 0..5 {
                assert_eq!(out_inter.pixel(x, y), out_planar.pixel(x, y));
            }
        }
    }

    #[test]
    fn test_planar_alpha_plane() {
        let kernel = OdThresholdKernel::new(3.0, Behavior::RetainLowerOd);
        let source = buffer(2, 1, ColorModel::Rgb, PixelOrder::Planar, vec![1, 2, 3, 4, 5, 6]);
        let raw = kernel.process(&source).unwrap().into_raw_vec();
        assert_eq!(raw, vec![1, 2, 3, 4, 5, 6, 255, 255]);
    }

    #[test]
    fn test_idempotent() {
        let (source, _) = gradient_pair(6, 5);
        let kernel = OdThresholdKernel::new(0.3, Behavior::RetainLowerOd);
        let first = kernel.process(&source).unwrap();
        let second = kernel.process(&source).unwrap();
        assert_eq!(first.into_raw_vec(), second.into_raw_vec());
    }

    #[test]
    fn test_output_outlives_source() {
        let kernel = OdThresholdKernel::new(3.0, Behavior::RetainLowerOd);
        let source = buffer(1, 1, ColorModel::Grayscale, PixelOrder::Interleaved, vec![77]);
        let result = kernel.process(&source).unwrap();
        drop(source);
        assert_eq!(result.pixel(0, 0), vec![77, 77, 77, 255]);
    }

    #[test]
    fn test_two_channel_source_is_out_of_range() {
        let kernel = OdThresholdKernel::new(0.5, Behavior::RetainLowerOd);
        let source =
            buffer(1, 1, ColorModel::GrayscaleAlpha, PixelOrder::Interleaved, vec![10, 255]);

        let err = kernel.process(&source).unwrap_err();
        assert_eq!(err, ThresholdError::ChannelOutOfRange { channel: 2, channels: 2 });
        assert!(kernel.retention_mask(&source).is_err());
    }

    #[test]
    fn test_channel_map() {
        assert_eq!(source_channel_map(ColorModel::Grayscale, 1).unwrap(), [0, 0, 0]);
        assert_eq!(source_channel_map(ColorModel::Rgb, 3).unwrap(), [0, 1, 2]);
        assert_eq!(source_channel_map(ColorModel::Bgra, 4).unwrap(), [0, 1, 2]);
    }

    #[test]
    fn test_setters_bump_revision_only_on_change() {
        let mut kernel = OdThresholdKernel::new(0.2, Behavior::RetainHigherOd);
        assert_eq!(kernel.revision(), 0);

        kernel.set_od_threshold(0.2);
        kernel.set_behavior(Behavior::RetainHigherOd);
        kernel.set_weights([1.0; 3]);
        assert_eq!(kernel.revision(), 0);

        kernel.set_od_threshold(0.25);
        assert_eq!(kernel.revision(), 1);
        kernel.set_behavior(Behavior::NoAction);
        assert_eq!(kernel.revision(), 2);
        kernel.set_weights([1.0, 2.0, 3.0]);
        assert_eq!(kernel.revision(), 3);
        assert_eq!(kernel.weights(), [1.0, 2.0, 3.0]);
        assert_eq!(kernel.od_threshold(), 0.25);
        assert_eq!(kernel.behavior(), Behavior::NoAction);
    }

    #[test]
    fn test_behavior_option_index() {
        assert_eq!(Behavior::RetainLowerOd as u8, 0);
        assert_eq!(Behavior::RetainHigherOd as u8, 1);
        assert_eq!(Behavior::NoAction as u8, 2);
        assert_eq!(Behavior::from_option_index(0), Behavior::RetainLowerOd);
        assert_eq!(Behavior::from_option_index(1), Behavior::RetainHigherOd);
        assert_eq!(Behavior::from_option_index(7), Behavior::NoAction);
    }

    #[test]
    fn test_usable_as_trait_object() {
        let kernel: Box<dyn Kernel> =
            Box::new(OdThresholdKernel::new(0.5, Behavior::RetainLowerOd));
        assert_eq!(kernel.color_space(), ColorSpace::RGBA8);
    }
}
