//! Host-facing parameters of the OD threshold and their sanitization.
//!
//! The values mirror what a viewer exposes to the user: a threshold in
//! hundredths of an OD unit, an option index for the retention side, a
//! threshold type label, and three channel weights. [`ThresholdParams::apply_to`]
//! pushes them into a kernel through its change-detecting setters, so the
//! kernel revision only moves when a value actually changed.

use serde::{Deserialize, Serialize};

use crate::filters::od_threshold::{Behavior, OdThresholdKernel};

/// Upper bound of the user-facing threshold control (OD x 100).
pub const THRESHOLD_X100_MAX: f64 = 300.0;

/// Upper bound of each channel weight.
pub const WEIGHT_MAX: f64 = 10.0;

/// Labels of the retention options, indexed like [`Behavior`].
pub const RETAINMENT_OPTIONS: [&str; 2] = [
    "Lower OD (retain lighter)",
    "Higher OD (retain darker)",
];

/// Labels of the threshold types, indexed like [`ThresholdType`].
pub const THRESHOLD_TYPE_OPTIONS: [&str; 2] = ["Average OD", "Weighted Average OD"];

/// Threshold type selected in the host UI.
///
/// Only a label: the kernel always combines the channel ODs with the
/// configured weights, which equal (1, 1, 1) for a plain average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    #[default]
    Average,
    WeightedAverage,
}

/// User-facing OD threshold configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    /// Threshold in hundredths of an OD unit (0-300)
    pub threshold_x100: f64,
    /// Retention option index (0 = lower OD, 1 = higher OD, other = no action)
    pub retainment: usize,
    pub threshold_type: ThresholdType,
    /// Weights of channels 0, 1, 2 (0-10 each)
    pub weights: [f64; 3],
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            threshold_x100: 20.0,
            retainment: 1,
            threshold_type: ThresholdType::Average,
            weights: [1.0; 3],
        }
    }
}

impl ThresholdParams {
    /// Threshold in OD units, clamped to the control range.
    pub fn od_threshold(&self) -> f64 {
        self.threshold_x100.clamp(0.0, THRESHOLD_X100_MAX) / 100.0
    }

    pub fn behavior(&self) -> Behavior {
        Behavior::from_option_index(self.retainment)
    }

    /// Configured weights, each clamped to [0, 10].
    pub fn effective_weights(&self) -> [f64; 3] {
        self.weights.map(|w| w.clamp(0.0, WEIGHT_MAX))
    }

    pub fn build_kernel(&self) -> OdThresholdKernel {
        OdThresholdKernel::new(self.od_threshold(), self.behavior())
            .with_weights(self.effective_weights())
    }

    /// Push these parameters into an existing kernel.
    ///
    /// Returns true if the kernel configuration changed.
    pub fn apply_to(&self, kernel: &mut OdThresholdKernel) -> bool {
        let before = kernel.revision();
        kernel.set_od_threshold(self.od_threshold());
        kernel.set_behavior(self.behavior());
        kernel.set_weights(self.effective_weights());
        kernel.revision() != before
    }
}
