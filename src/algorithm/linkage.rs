use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::distance::DistanceMetric;
use crate::algorithm::partition::partition_indices_by_gap;
use crate::algorithm::tolerance::{ppm_difference, FeatureTolerances};
use crate::data::cluster::{ClusterSet, UmcCluster};
use crate::data::umc::{CentroidRepresentation, UmcFeature};
use crate::error::UmcError;
use crate::progress::ProgressSink;

/// Parameters for cross-run single-linkage clustering of tracks.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClusterParameters {
    pub tolerances: FeatureTolerances,
    /// When set, two tracks may only pair if they share a charge state.
    pub only_cluster_same_charge: bool,
    pub centroid: CentroidRepresentation,
    pub metric: DistanceMetric,
}

impl Default for ClusterParameters {
    fn default() -> Self {
        ClusterParameters {
            tolerances: FeatureTolerances::default(),
            only_cluster_same_charge: false,
            centroid: CentroidRepresentation::Median,
            metric: DistanceMetric::default(),
        }
    }
}

/// An in-tolerance candidate pair, indices into the shared track slice.
struct PairwiseDistance {
    x: usize,
    y: usize,
    distance: f64,
}

/// Result of one clustering call. Blocks whose distance evaluation failed
/// keep their tracks as singleton clusters and report the failure here
/// instead of aborting the whole run.
pub struct LinkageOutcome {
    pub clusters: Vec<UmcCluster>,
    pub failed_blocks: Vec<UmcError>,
}

/// Single-linkage clustering of tracks into consensus clusters under the
/// per-run exclusivity constraint.
///
/// Tracks are partitioned by monoisotopic mass, then within each block every
/// in-tolerance pair is scored by the configured distance metric and merged
/// in ascending distance order. A merge is skipped when the two clusters
/// already share an origin run; a singleton whose every candidate pair is
/// excluded simply stays a singleton, which is expected output rather than
/// an error.
pub struct SingleLinkageClusterer {
    pub parameters: ClusterParameters,
}

impl SingleLinkageClusterer {
    pub fn new(parameters: ClusterParameters) -> Self {
        SingleLinkageClusterer { parameters }
    }

    pub fn cluster(&self, umcs: &[UmcFeature], sink: &dyn ProgressSink) -> Result<LinkageOutcome, UmcError> {
        for umc in umcs {
            if !umc.mono_mass.is_finite() || umc.mono_mass <= 0.0 {
                return Err(UmcError::InvalidInput(format!(
                    "track {} has unusable monoisotopic mass {}",
                    umc.id, umc.mono_mass
                )));
            }
        }
        if umcs.is_empty() {
            return Ok(LinkageOutcome { clusters: Vec::new(), failed_blocks: Vec::new() });
        }

        sink.progress("sorting and partitioning tracks by monoisotopic mass");
        let blocks = partition_indices_by_gap(umcs, |u| u.mono_mass, self.parameters.tolerances.mass_ppm);
        sink.progress(&format!("linking {} tracks across {} partitions", umcs.len(), blocks.len()));

        let mut set = ClusterSet::singletons(umcs);
        let mut failed_blocks = Vec::new();

        for (block_idx, block) in blocks.iter().enumerate() {
            if block.len() < 2 {
                continue;
            }
            match self.pairwise_distances(umcs, block, block_idx) {
                Ok(mut distances) => {
                    // stable sort keeps equal distances in production order
                    distances.sort_by_key(|d| OrderedFloat(d.distance));
                    for pair in distances {
                        let cluster_x = set.cluster_of(pair.x);
                        let cluster_y = set.cluster_of(pair.y);
                        if cluster_x == cluster_y {
                            continue;
                        }
                        if set.groups_conflict(cluster_x, cluster_y) {
                            continue;
                        }
                        set.merge(cluster_x, cluster_y);
                    }
                }
                Err(e) => failed_blocks.push(e),
            }
        }

        sink.progress(&format!("formed {} consensus clusters", set.live_count()));
        let clusters = set.into_clusters(umcs, self.parameters.centroid);
        Ok(LinkageOutcome { clusters, failed_blocks })
    }

    /// Tolerance box test run before any distance computation.
    #[inline]
    fn within_range(&self, x: &UmcFeature, y: &UmcFeature) -> bool {
        if self.parameters.only_cluster_same_charge && x.charge != y.charge {
            return false;
        }
        let t = &self.parameters.tolerances;
        ppm_difference(x.mono_mass, y.mono_mass).abs() <= t.mass_ppm
            && (x.retention_time - y.retention_time).abs() <= t.retention_time
            && (x.drift_time - y.drift_time).abs() <= t.drift_time
    }

    fn pairwise_distances(
        &self,
        umcs: &[UmcFeature],
        block: &[usize],
        block_idx: usize,
    ) -> Result<Vec<PairwiseDistance>, UmcError> {
        let metric = self.parameters.metric.create();
        let mut distances = Vec::new();
        for (i, &x) in block.iter().enumerate() {
            for &y in &block[i + 1..] {
                if !self.within_range(&umcs[x], &umcs[y]) {
                    continue;
                }
                let distance = metric.distance(&umcs[x], &umcs[y]);
                if !distance.is_finite() {
                    return Err(UmcError::Distance {
                        block: block_idx,
                        reason: format!("non-finite distance between tracks {} and {}", umcs[x].id, umcs[y].id),
                    });
                }
                distances.push(PairwiseDistance { x, y, distance });
            }
        }
        Ok(distances)
    }
}
