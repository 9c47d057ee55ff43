//! Optical density (OD) conversion.
//!
//! Converts 8-bit transmitted-light intensities to optical density and back:
//!
//! ```text
//! OD = -log10(I / 255)        I = round(255 * 10^-OD)
//! ```
//!
//! Intensity 0 is replaced by [`OD_MIN_VALUE`] before taking the logarithm, so
//! the darkest value maps to a large but finite OD (about 8.4).
//!
//! [`OdLookup`] precomputes the forward conversion for every 8-bit intensity.
//! It is immutable after construction and can be shared between threads.

use std::sync::{Arc, OnceLock};

/// Stand-in for intensity 0 when taking the logarithm.
pub const OD_MIN_VALUE: f64 = 1e-6;

/// Full-scale intensity of the RGB scale.
pub const RGB_MAX_VALUE: i32 = 255;

/// Source of intensity-to-OD values for the threshold kernel.
pub trait OdConverter: Send + Sync {
    /// Optical density of a raw channel intensity. Never negative.
    fn rgb_to_od(&self, intensity: i32) -> f64;
}

// ============================================================================
// Direct conversion
// ============================================================================

/// Convert an intensity on the 0-255 scale to optical density.
///
/// Values at or above full scale yield 0.
pub fn convert_rgb_to_od(intensity: f64) -> f64 {
    let scale_max = RGB_MAX_VALUE as f64;
    let color = if intensity <= 0.0 { OD_MIN_VALUE } else { intensity };
    let od = -(color / scale_max).log10();
    od.max(0.0)
}

/// Convert optical density to an intensity on the 0-255 scale.
///
/// Negative OD is treated as 0. The result is rounded and clamped to [0, 255].
pub fn convert_od_to_rgb(od: f64) -> f64 {
    let scale_max = RGB_MAX_VALUE as f64;
    let od = od.max(0.0);
    (scale_max * 10f64.powf(-od)).round().clamp(0.0, scale_max)
}

// ============================================================================
// Lookup table
// ============================================================================

/// Precomputed OD values for intensities 0..=255.
#[derive(Debug, Clone)]
pub struct OdLookup {
    table: Vec<f64>,
}

impl OdLookup {
    pub fn new() -> Self {
        let table = (0..=RGB_MAX_VALUE)
            .map(|i| convert_rgb_to_od(i as f64))
            .collect();
        Self { table }
    }

    /// Process-wide table, built on first use.
    pub fn shared() -> Arc<OdLookup> {
        static SHARED: OnceLock<Arc<OdLookup>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(OdLookup::new())).clone()
    }

    /// OD of an intensity; intensities outside the table are computed directly.
    #[inline]
    pub fn lookup_rgb_to_od(&self, intensity: i32) -> f64 {
        usize::try_from(intensity)
            .ok()
            .and_then(|i| self.table.get(i).copied())
            .unwrap_or_else(|| convert_rgb_to_od(intensity as f64))
    }

    /// Largest intensity whose OD is at least `od`.
    ///
    /// OD above the table range (darker than intensity 0) falls back to
    /// [`convert_od_to_rgb`].
    pub fn lookup_od_to_rgb(&self, od: f64) -> i32 {
        self.table
            .iter()
            .rposition(|&entry| od <= entry)
            .map(|i| i as i32)
            .unwrap_or_else(|| convert_od_to_rgb(od) as i32)
    }
}

impl Default for OdLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl OdConverter for OdLookup {
    fn rgb_to_od(&self, intensity: i32) -> f64 {
        self.lookup_rgb_to_od(intensity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scale_is_zero_od() {
        assert_eq!(convert_rgb_to_od(255.0), 0.0);
        // brighter than full scale clamps to 0, never negative
        assert_eq!(convert_rgb_to_od(300.0), 0.0);
    }

    #[test]
    fn test_zero_intensity_is_finite() {
        let od = convert_rgb_to_od(0.0);
        assert!(od.is_finite());
        // -log10(1e-6 / 255)
        assert!((od - (6.0 + 255f64.log10())).abs() < 1e-9);
        assert_eq!(convert_rgb_to_od(-4.0), od);
    }

    #[test]
    fn test_od_decreases_with_intensity() {
        let lut = OdLookup::new();
        for i in 1..=RGB_MAX_VALUE {
            assert!(lut.lookup_rgb_to_od(i) < lut.lookup_rgb_to_od(i - 1));
        }
    }

    #[test]
    fn test_lookup_matches_direct() {
        let lut = OdLookup::new();
        for i in [0, 1, 50, 128, 200, 254, 255] {
            assert_eq!(lut.lookup_rgb_to_od(i), convert_rgb_to_od(i as f64));
        }
    }

    #[test]
    fn test_lookup_outside_table_falls_back() {
        let lut = OdLookup::new();
        assert_eq!(lut.lookup_rgb_to_od(1000), 0.0);
        assert_eq!(lut.lookup_rgb_to_od(-1), convert_rgb_to_od(0.0));
    }

    #[test]
    fn test_od_to_rgb() {
        assert_eq!(convert_od_to_rgb(0.0), 255.0);
        assert_eq!(convert_od_to_rgb(-1.0), 255.0);
        assert_eq!(convert_od_to_rgb(2.0), 3.0); // 2.55
        assert_eq!(convert_od_to_rgb(10.0), 0.0);
    }

    #[test]
    fn test_reverse_lookup() {
        let lut = OdLookup::new();
        assert_eq!(lut.lookup_od_to_rgb(0.0), 255);
        for i in [1, 17, 128, 254] {
            let od = lut.lookup_rgb_to_od(i);
            assert_eq!(lut.lookup_od_to_rgb(od), i);
        }
        // darker than the darkest table entry
        assert_eq!(lut.lookup_od_to_rgb(50.0), 0);
    }

    #[test]
    fn test_shared_is_single_instance() {
        assert!(Arc::ptr_eq(&OdLookup::shared(), &OdLookup::shared()));
        assert_eq!(OdLookup::shared().rgb_to_od(255), 0.0);
    }
}
