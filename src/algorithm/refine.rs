use itertools::izip;
use nalgebra::DMatrix;

use crate::data::umc::UmcFeature;

/// Smooths each per-charge chromatogram of a track and trims it to the
/// contiguous non-zero region around the dominant apex.
///
/// The smoother is a Savitzky-Golay filter: a least-squares polynomial fit
/// over a fixed window, reduced to a single convolution whose coefficients
/// come from the pseudo-inverse of the window's Vandermonde design matrix.
/// Disconnected side lobes beyond the first below-one sample on either side
/// of the apex are discarded; a track with no surviving children is dropped.
pub struct ChromatogramRefiner {
    window: usize,
    coefficients: Vec<f64>,
}

impl ChromatogramRefiner {
    /// # Arguments
    ///
    /// * `window` - number of points in the smoothing window; forced odd.
    /// * `order` - polynomial order of the fit, must be below the window size.
    pub fn new(window: usize, order: usize) -> Self {
        let window = window.max(order + 2) | 1;
        let coefficients = savitzky_golay_coefficients(window, order);
        ChromatogramRefiner { window, coefficients }
    }

    /// Smooths a series in place-order, clamping the window at the edges.
    pub fn smooth(&self, y: &[f64]) -> Vec<f64> {
        let half = (self.window / 2) as isize;
        let n = y.len() as isize;
        (0..n)
            .map(|i| {
                let mut acc = 0.0;
                for (w, &c) in self.coefficients.iter().enumerate() {
                    let idx = (i + w as isize - half).clamp(0, n - 1) as usize;
                    acc += c * y[idx];
                }
                acc
            })
            .collect()
    }

    /// Refines every track, returning only those that keep at least one child.
    pub fn refine(&self, umcs: Vec<UmcFeature>) -> Vec<UmcFeature> {
        let mut refined = Vec::with_capacity(umcs.len());

        for mut umc in umcs {
            // per-charge traces have different m/z windows, treat them separately
            for (_charge, mut children) in umc.take_charge_map() {
                children.retain(|f| f.abundance > 0);
                children.sort_by_key(|f| f.scan);
                if children.is_empty() {
                    continue;
                }

                let raw: Vec<f64> = children.iter().map(|f| f.abundance as f64).collect();
                let smoothed = self.smooth(&raw);

                let mut apex = 0usize;
                let mut max_abundance = 0i64;
                for (i, (child, value)) in izip!(children.iter_mut(), &smoothed).enumerate() {
                    child.abundance = value.round() as i64;
                    if child.abundance > max_abundance {
                        max_abundance = child.abundance;
                        apex = i;
                    }
                }

                // walk out from the apex until the trace touches zero
                let mut start = apex;
                while start > 0 {
                    if children[start].abundance < 1 {
                        break;
                    }
                    start -= 1;
                }
                let mut stop = apex;
                while stop < children.len() - 1 {
                    if children[stop].abundance < 1 {
                        break;
                    }
                    stop += 1;
                }

                for child in children.drain(start..=stop) {
                    umc.add_feature(child);
                }
            }

            if !umc.features.is_empty() {
                refined.push(umc);
            }
        }
        refined
    }
}

/// Smoothing coefficients for a centered Savitzky-Golay filter: row zero of
/// the pseudo-inverse of the Vandermonde matrix over offsets -h..=h.
fn savitzky_golay_coefficients(window: usize, order: usize) -> Vec<f64> {
    let half = (window / 2) as isize;
    let design = DMatrix::from_fn(window, order + 1, |i, j| {
        ((i as isize - half) as f64).powi(j as i32)
    });
    let svd = design.svd(true, true);
    match svd.pseudo_inverse(1e-12) {
        Ok(pinv) => pinv.row(0).iter().copied().collect(),
        Err(_) => {
            // degenerate design matrix, fall back to the identity filter
            let mut delta = vec![0.0; window];
            delta[window / 2] = 1.0;
            delta
        }
    }
}
