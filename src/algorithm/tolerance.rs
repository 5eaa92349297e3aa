use serde::{Deserialize, Serialize};

/// Per-dimension acceptance thresholds shared by all clustering stages.
///
/// Read-only once clustering begins. Mass is relative (ppm of the compared
/// mass), retention time is in fractional NET units over [0, 1], drift time
/// is in absolute drift units. The integer scan window used by the stage-1
/// tree clusterer lives on its own parameter struct.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FeatureTolerances {
    /// Mass tolerance in parts per million.
    pub mass_ppm: f64,
    /// Retention-time tolerance as a fraction of the normalized elution time.
    pub retention_time: f64,
    /// Drift-time tolerance in absolute drift units.
    pub drift_time: f64,
}

impl Default for FeatureTolerances {
    fn default() -> Self {
        FeatureTolerances {
            mass_ppm: 10.0,
            retention_time: 0.05,
            drift_time: 0.3,
        }
    }
}

/// Signed ppm difference between two masses, relative to the first.
///
/// # Example
///
/// ```rust
/// use umcore::algorithm::tolerance::ppm_difference;
/// let ppm = ppm_difference(1000.01, 1000.0);
/// assert!((ppm - 10.0).abs() < 0.01);
/// ```
#[inline]
pub fn ppm_difference(x: f64, y: f64) -> f64 {
    (x - y) / x * 1e6
}

/// Offsets `mz` by `ppm` parts per million. Positive ppm moves down in mass,
/// so `mz_from_ppm(mz, ppm)` and `mz_from_ppm(mz, -ppm)` form the low and
/// high bounds of a symmetric window.
#[inline]
pub fn mz_from_ppm(mz: f64, ppm: f64) -> f64 {
    mz - mz * ppm / 1e6
}

/// Symmetric (low, high) m/z window around `mz`.
#[inline]
pub fn ppm_window(mz: f64, ppm: f64) -> (f64, f64) {
    (mz_from_ppm(mz, ppm), mz_from_ppm(mz, -ppm))
}
