use serde::{Deserialize, Serialize};

use crate::algorithm::tolerance::ppm_difference;
use crate::data::umc::UmcFeature;

/// Pairwise dissimilarity between two tracks over the mass / NET / drift
/// dimensions. Implementations must return a nonnegative scalar; a non-finite
/// result aborts the current partition block's merge and is surfaced to the
/// caller.
pub trait FeatureDistance: Sync {
    fn distance(&self, x: &UmcFeature, y: &UmcFeature) -> f64;
}

/// Plain Euclidean distance over (mass ppm difference, NET difference,
/// drift-time difference) with unit weights.
pub struct EuclideanDistance;

impl FeatureDistance for EuclideanDistance {
    fn distance(&self, x: &UmcFeature, y: &UmcFeature) -> f64 {
        let mass_diff = ppm_difference(x.mono_mass, y.mono_mass);
        let net_diff = x.retention_time - y.retention_time;
        let drift_diff = x.drift_time - y.drift_time;
        (mass_diff * mass_diff + net_diff * net_diff + drift_diff * drift_diff).sqrt()
    }
}

/// Euclidean distance with per-dimension weights. The defaults damp the ppm
/// mass term and the drift term so a NET difference of 0.01 and a mass
/// difference of a few ppm contribute on a comparable scale.
pub struct WeightedEuclideanDistance {
    pub mass_weight: f64,
    pub net_weight: f64,
    pub drift_weight: f64,
}

impl Default for WeightedEuclideanDistance {
    fn default() -> Self {
        WeightedEuclideanDistance {
            mass_weight: 0.00000001,
            net_weight: 1.0,
            drift_weight: 1e-5,
        }
    }
}

impl FeatureDistance for WeightedEuclideanDistance {
    fn distance(&self, x: &UmcFeature, y: &UmcFeature) -> f64 {
        let mass_diff = ppm_difference(x.mono_mass, y.mono_mass);
        let net_diff = x.retention_time - y.retention_time;
        let drift_diff = x.drift_time - y.drift_time;
        (self.mass_weight * mass_diff * mass_diff
            + self.net_weight * net_diff * net_diff
            + self.drift_weight * drift_diff * drift_diff)
            .sqrt()
    }
}

/// Selects the distance function used by the linkage merger. The weighted
/// variant carries its per-dimension weights so they travel with the
/// clustering configuration.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum DistanceMetric {
    Euclidean,
    WeightedEuclidean {
        mass_weight: f64,
        net_weight: f64,
        drift_weight: f64,
    },
}

impl Default for DistanceMetric {
    fn default() -> Self {
        let weights = WeightedEuclideanDistance::default();
        DistanceMetric::WeightedEuclidean {
            mass_weight: weights.mass_weight,
            net_weight: weights.net_weight,
            drift_weight: weights.drift_weight,
        }
    }
}

impl DistanceMetric {
    /// Instantiates the configured metric.
    pub fn create(&self) -> Box<dyn FeatureDistance> {
        match *self {
            DistanceMetric::Euclidean => Box::new(EuclideanDistance),
            DistanceMetric::WeightedEuclidean { mass_weight, net_weight, drift_weight } => {
                Box::new(WeightedEuclideanDistance { mass_weight, net_weight, drift_weight })
            }
        }
    }
}
