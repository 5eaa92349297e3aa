use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::algorithm::partition::partition_by_gap;
use crate::algorithm::tolerance::{ppm_difference, FeatureTolerances};
use crate::algorithm::xic::{XicBuilder, XicParameters};
use crate::chemistry::constants::ChemistryConstants;
use crate::data::feature::MsFeature;
use crate::data::spectrum::RawScanProvider;
use crate::data::umc::{CentroidRepresentation, UmcFeature};
use crate::error::UmcError;
use crate::progress::ProgressSink;

/// Parameters for the two-stage tree clusterer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TreeClusterParameters {
    pub tolerances: FeatureTolerances,
    /// Maximum scan gap between two child features of the same track.
    pub scan_tolerance: i32,
    pub centroid: CentroidRepresentation,
    pub constants: ChemistryConstants,
    pub xic: XicParameters,
}

impl Default for TreeClusterParameters {
    fn default() -> Self {
        TreeClusterParameters {
            tolerances: FeatureTolerances::default(),
            scan_tolerance: 30,
            centroid: CentroidRepresentation::Median,
            constants: ChemistryConstants::default(),
            xic: XicParameters::default(),
        }
    }
}

/// A binary tree keyed by a three-way compatibility comparator.
///
/// `Ordering::Equal` means "same group": the item joins the node it matched.
/// Otherwise the item descends left or right by the comparator's sign. Items
/// are compared against the node's most recently joined member, so a group
/// chains along the insertion order (scan ascending for stage 1), which lets
/// a long elution profile stay one group as long as each step is within the
/// scan tolerance.
struct FeatureTree<T> {
    nodes: Vec<TreeNode<T>>,
}

struct TreeNode<T> {
    items: Vec<T>,
    left: Option<usize>,
    right: Option<usize>,
}

impl<T> FeatureTree<T> {
    fn new() -> Self {
        FeatureTree { nodes: Vec::new() }
    }

    fn insert<F>(&mut self, item: T, compare: &F)
    where
        F: Fn(&T, &T) -> Ordering,
    {
        if self.nodes.is_empty() {
            self.nodes.push(TreeNode { items: vec![item], left: None, right: None });
            return;
        }
        let mut current = 0usize;
        loop {
            let ordering = match self.nodes[current].items.last() {
                Some(anchor) => compare(&item, anchor),
                None => Ordering::Equal,
            };
            match ordering {
                Ordering::Equal => {
                    self.nodes[current].items.push(item);
                    return;
                }
                Ordering::Less => match self.nodes[current].left {
                    Some(next) => current = next,
                    None => {
                        let idx = self.nodes.len();
                        self.nodes.push(TreeNode { items: vec![item], left: None, right: None });
                        self.nodes[current].left = Some(idx);
                        return;
                    }
                },
                Ordering::Greater => match self.nodes[current].right {
                    Some(next) => current = next,
                    None => {
                        let idx = self.nodes.len();
                        self.nodes.push(TreeNode { items: vec![item], left: None, right: None });
                        self.nodes[current].right = Some(idx);
                        return;
                    }
                },
            }
        }
    }

    /// Flattens the tree, one group per node.
    fn build(self) -> Vec<Vec<T>> {
        self.nodes.into_iter().map(|n| n.items).collect()
    }
}

/// Two-stage clustering of per-scan measurements into cross-charge tracks.
///
/// Stage 1 groups raw MS features into chromatographic tracks by m/z,
/// scan adjacency and equal charge. Stage 2 re-clusters the tracks by
/// monoisotopic mass across charge states: the same species at different
/// charges has different m/z but near-identical neutral mass. Between the
/// stages, an optional raw-scan provider lets the XIC sweep rebuild each
/// track's full elution profile from the instrument data.
pub struct MsFeatureTreeClusterer {
    pub parameters: TreeClusterParameters,
}

impl MsFeatureTreeClusterer {
    pub fn new(parameters: TreeClusterParameters) -> Self {
        MsFeatureTreeClusterer { parameters }
    }

    pub fn cluster(
        &self,
        mut features: Vec<MsFeature>,
        provider: Option<&dyn RawScanProvider>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<UmcFeature>, UmcError> {
        if features.is_empty() {
            return Ok(Vec::new());
        }
        validate_features(&features)?;

        // normalized elution time across the run's scan range
        let (min_scan, max_scan) = features
            .iter()
            .fold((i32::MAX, i32::MIN), |(lo, hi), f| (lo.min(f.scan), hi.max(f.scan)));
        let scan_origin = min_scan as f64;
        let scan_span = ((max_scan - min_scan) as f64).max(1.0);
        for feature in &mut features {
            feature.retention_time = (feature.scan as f64 - scan_origin) / scan_span;
            feature.mono_mass = self.parameters.constants.mono_mass(feature.mz, feature.charge);
        }

        sink.progress("clustering child features into candidate tracks");
        let total = features.len();
        let groups = self.cluster_stage(features, |f| f.mz, |x, y| self.compare_mz(x, y), |f| f.scan);
        let mut tracks: Vec<UmcFeature> = groups
            .into_iter()
            .filter(|g| !g.is_empty())
            .map(|group| {
                let mut track = UmcFeature::new(0);
                track.group_id = group[0].group_id;
                for feature in group {
                    track.add_feature(feature);
                }
                track
            })
            .collect();
        sink.progress(&format!("found {} candidate tracks from {} features", tracks.len(), total));

        for track in &mut tracks {
            track.calculate_statistics(self.parameters.centroid);
        }

        if let Some(provider) = provider {
            sink.progress("building XICs from child features");
            let builder = XicBuilder::new(self.parameters.xic);
            tracks = builder.create_xics(tracks, self.parameters.tolerances.mass_ppm, provider, sink)?;
        }

        // XIC children carry raw scan indices; bring them onto the run's
        // normalized time axis before the cross-charge stage compares elution
        for track in &mut tracks {
            for feature in &mut track.features {
                feature.retention_time = (feature.scan as f64 - scan_origin) / scan_span;
            }
            track.calculate_statistics(self.parameters.centroid);
        }

        sink.progress("combining charge states by monoisotopic mass");
        let grouped = self.cluster_stage(tracks, |t| t.mono_mass, |x, y| self.compare_mono(x, y), |t| t.scan);
        let mut merged: Vec<UmcFeature> = Vec::with_capacity(grouped.len());
        for group in grouped {
            let mut group = group.into_iter();
            if let Some(mut combined) = group.next() {
                for mut track in group {
                    combined.absorb(&mut track);
                }
                if !combined.features.is_empty() {
                    merged.push(combined);
                }
            }
        }

        sink.progress("assigning final feature ids");
        for (id, track) in merged.iter_mut().enumerate() {
            track.id = id;
            track.calculate_statistics(self.parameters.centroid);
        }
        Ok(merged)
    }

    /// One clustering pass shared by both stages: partition by the mass axis,
    /// insert each block scan-sorted into a comparator tree, flatten the
    /// nodes into tracks.
    fn cluster_stage<T, A, C, S>(&self, items: Vec<T>, axis: A, compare: C, scan_key: S) -> Vec<Vec<T>>
    where
        A: Fn(&T) -> f64,
        C: Fn(&T, &T) -> Ordering,
        S: Fn(&T) -> i32,
    {
        let mut groups = Vec::new();
        for mut block in partition_by_gap(items, &axis, self.parameters.tolerances.mass_ppm) {
            block.sort_by_key(|item| scan_key(item));
            let mut tree = FeatureTree::new();
            for item in block {
                tree.insert(item, &compare);
            }
            groups.extend(tree.build());
        }
        groups
    }

    /// Stage-1 comparator over raw features: equal when within the m/z
    /// tolerance, the scan tolerance, and on the same charge state. In mass
    /// range but scan- or charge-incompatible compares greater, mirroring
    /// the insertion heuristic of the comparator tree.
    fn compare_mz(&self, x: &MsFeature, y: &MsFeature) -> Ordering {
        let mz_diff = ppm_difference(x.mz, y.mz);
        if mz_diff.abs() < self.parameters.tolerances.mass_ppm {
            if (x.scan - y.scan).abs() > self.parameters.scan_tolerance {
                return Ordering::Greater;
            }
            return if x.charge == y.charge { Ordering::Equal } else { Ordering::Greater };
        }
        if mz_diff < 0.0 {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }

    /// Stage-2 comparator over tracks: equal when within the mass tolerance,
    /// on *different* charge states, and co-eluting within the
    /// retention-time tolerance.
    fn compare_mono(&self, x: &UmcFeature, y: &UmcFeature) -> Ordering {
        let mass_diff = ppm_difference(x.mono_mass, y.mono_mass);
        if mass_diff.abs() < self.parameters.tolerances.mass_ppm && x.charge != y.charge {
            let net_diff = x.retention_time - y.retention_time;
            return if net_diff.abs() <= self.parameters.tolerances.retention_time {
                Ordering::Equal
            } else {
                Ordering::Greater
            };
        }
        if mass_diff < 0.0 {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}

fn validate_features(features: &[MsFeature]) -> Result<(), UmcError> {
    for feature in features {
        if !feature.mz.is_finite() || feature.mz <= 0.0 {
            return Err(UmcError::InvalidInput(format!(
                "feature {} has unusable m/z {}",
                feature.id, feature.mz
            )));
        }
        if feature.abundance < 0 {
            return Err(UmcError::InvalidInput(format!(
                "feature {} has negative abundance {}",
                feature.id, feature.abundance
            )));
        }
        if feature.charge <= 0 {
            return Err(UmcError::InvalidInput(format!(
                "feature {} has non-positive charge {}",
                feature.id, feature.charge
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullSink;

    fn feature(id: usize, scan: i32, mz: f64, charge: i32, abundance: i64) -> MsFeature {
        MsFeature::new(id, scan, mz, charge, abundance)
    }

    fn cluster(features: Vec<MsFeature>) -> Vec<UmcFeature> {
        MsFeatureTreeClusterer::new(TreeClusterParameters::default())
            .cluster(features, None, &NullSink)
            .unwrap()
    }

    #[test]
    fn test_contiguous_scans_form_one_track() {
        let features = vec![
            feature(0, 100, 500.25, 2, 1000),
            feature(1, 101, 500.2501, 2, 2000),
            feature(2, 102, 500.2502, 2, 1500),
            feature(3, 500, 800.40, 1, 900),
        ];
        let tracks = cluster(features);
        assert_eq!(tracks.len(), 2);
        let big = tracks.iter().find(|t| t.features.len() == 3).unwrap();
        assert_eq!(big.charge, 2);
        assert_eq!(big.scan_start, 100);
        assert_eq!(big.scan_end, 102);
    }

    #[test]
    fn test_scan_gap_splits_tracks() {
        // same m/z and charge, but 200 scans apart (tolerance is 30)
        let features = vec![
            feature(0, 100, 500.25, 2, 1000),
            feature(1, 300, 500.25, 2, 1000),
        ];
        let tracks = cluster(features);
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_different_charge_never_shares_stage1_track() {
        let features = vec![
            feature(0, 100, 500.25, 2, 1000),
            feature(1, 101, 500.25, 3, 1000),
        ];
        // same m/z window, adjacent scans, but distinct charge: two tracks
        // (they may still merge in stage 2 only if their neutral masses agree,
        // which they do not at the same m/z)
        let tracks = cluster(features);
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_stage2_merges_charge_states_of_same_species() {
        let constants = ChemistryConstants::default();
        let mass = 1000.0;
        let mz2 = (mass + 2.0 * constants.proton_mass) / 2.0;
        let mz3 = (mass + 3.0 * constants.proton_mass) / 3.0;
        let features = vec![
            feature(0, 100, mz2, 2, 1000),
            feature(1, 101, mz2, 2, 2000),
            feature(2, 100, mz3, 3, 800),
            feature(3, 101, mz3, 3, 1600),
        ];
        let tracks = cluster(features);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].features.len(), 4);
        assert!((tracks[0].mono_mass - mass).abs() < 0.01);
    }

    #[test]
    fn test_stage2_respects_retention_time_tolerance() {
        let constants = ChemistryConstants::default();
        let mass = 1000.0;
        let mz2 = (mass + 2.0 * constants.proton_mass) / 2.0;
        let mz3 = (mass + 3.0 * constants.proton_mass) / 3.0;
        // same neutral mass, different charge, but eluting 800 scans apart
        let features = vec![
            feature(0, 100, mz2, 2, 1000),
            feature(1, 900, mz3, 3, 800),
        ];
        let tracks = cluster(features);
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_every_input_feature_owned_exactly_once() {
        let mut features = Vec::new();
        for i in 0..40 {
            let mz = 400.0 + (i % 5) as f64 * 25.0;
            features.push(feature(i, 100 + (i / 5) as i32, mz, 2, 500 + i as i64));
        }
        let tracks = cluster(features);
        let mut seen: Vec<usize> = tracks
            .iter()
            .flat_map(|t| t.features.iter().map(|f| f.id))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<usize>>());
    }

    #[test]
    fn test_final_ids_are_sequential() {
        let features = vec![
            feature(0, 100, 500.25, 2, 1000),
            feature(1, 500, 800.40, 1, 900),
            feature(2, 900, 1200.75, 3, 700),
        ];
        let tracks = cluster(features);
        let ids: Vec<usize> = tracks.iter().map(|t| t.id).collect();
        assert_eq!(ids, (0..tracks.len()).collect::<Vec<usize>>());
    }

    #[test]
    fn test_net_normalized_over_run() {
        let features = vec![
            feature(0, 0, 500.25, 2, 1000),
            feature(1, 1000, 800.40, 1, 900),
        ];
        let tracks = cluster(features);
        let mut nets: Vec<f64> = tracks.iter().map(|t| t.retention_time).collect();
        nets.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(nets, vec![0.0, 1.0]);
    }

    #[test]
    fn test_invalid_feature_rejects_whole_call() {
        let features = vec![feature(0, 100, f64::NAN, 2, 1000), feature(1, 101, 500.25, 2, 900)];
        let clusterer = MsFeatureTreeClusterer::new(TreeClusterParameters::default());
        assert!(matches!(
            clusterer.cluster(features, None, &NullSink),
            Err(UmcError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        assert!(cluster(Vec::new()).is_empty());
    }

    #[test]
    fn test_tree_groups_by_comparator() {
        let mut tree = FeatureTree::new();
        for v in [10, 11, 12, 40, 41, 90] {
            tree.insert(v, &|a: &i32, b: &i32| {
                if (a - b).abs() <= 3 {
                    Ordering::Equal
                } else {
                    a.cmp(b)
                }
            });
        }
        let mut groups = tree.build();
        groups.sort();
        assert_eq!(groups, vec![vec![10, 11, 12], vec![40, 41], vec![90]]);
    }
}
