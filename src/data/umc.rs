use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

use crate::data::feature::MsFeature;

/// Centroid statistic used when a track or cluster summarizes its members.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum CentroidRepresentation {
    Mean,
    #[default]
    Median,
}

impl CentroidRepresentation {
    /// Reduces a sample to its centroid value. Returns 0.0 for an empty sample.
    pub fn centroid(&self, values: Vec<f64>) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            CentroidRepresentation::Mean => values.iter().mean(),
            CentroidRepresentation::Median => Data::new(values).median(),
        }
    }
}

/// A unique mass class (UMC): one putative chemical species tracked across a
/// contiguous scan range within a single run.
///
/// Owns its child features; children move between tracks when tracks merge,
/// so every `MsFeature` lives in exactly one `features` vector at any time.
/// Aggregate fields are derived from the children by `calculate_statistics`
/// and are stale until it runs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UmcFeature {
    pub id: usize,
    pub features: Vec<MsFeature>,
    /// m/z of the apex (highest-abundance) child.
    pub mz: f64,
    /// Centroid neutral monoisotopic mass over the children.
    pub mono_mass: f64,
    /// Charge state of the apex child.
    pub charge: i32,
    /// Abundance of the apex child.
    pub abundance: i64,
    /// Summed abundance over all children.
    pub abundance_sum: i64,
    /// Scan of the apex child.
    pub scan: i32,
    pub scan_start: i32,
    pub scan_end: i32,
    /// Centroid normalized elution time over the children.
    pub retention_time: f64,
    /// Centroid drift time over the children.
    pub drift_time: f64,
    /// Identifier of the originating experimental run.
    pub group_id: i32,
}

impl UmcFeature {
    pub fn new(id: usize) -> Self {
        UmcFeature { id, ..UmcFeature::default() }
    }

    /// Attaches a child measurement to this track.
    pub fn add_feature(&mut self, feature: MsFeature) {
        self.features.push(feature);
    }

    /// Moves every child of `other` into this track. `other` is left empty.
    pub fn absorb(&mut self, other: &mut UmcFeature) {
        self.features.append(&mut other.features);
    }

    /// Groups child references by charge state, ordered by charge.
    pub fn charge_map(&self) -> BTreeMap<i32, Vec<&MsFeature>> {
        let mut map: BTreeMap<i32, Vec<&MsFeature>> = BTreeMap::new();
        for feature in &self.features {
            map.entry(feature.charge).or_default().push(feature);
        }
        map
    }

    /// Drains the children into per-charge vectors. The refiner uses this to
    /// rebuild the child list one charge trace at a time.
    pub fn take_charge_map(&mut self) -> BTreeMap<i32, Vec<MsFeature>> {
        let mut map: BTreeMap<i32, Vec<MsFeature>> = BTreeMap::new();
        for feature in self.features.drain(..) {
            map.entry(feature.charge).or_default().push(feature);
        }
        map
    }

    /// Recomputes the aggregate fields from the current children.
    ///
    /// m/z, charge, apex abundance and apex scan come from the single
    /// highest-abundance child; mass, retention time and drift time are the
    /// requested centroid statistic over all children; the scan range is the
    /// span of the children's scan indices. A track with no children is left
    /// untouched.
    pub fn calculate_statistics(&mut self, representation: CentroidRepresentation) {
        if self.features.is_empty() {
            return;
        }

        let mut apex = 0usize;
        let mut scan_start = i32::MAX;
        let mut scan_end = i32::MIN;
        let mut abundance_sum = 0i64;

        for (i, feature) in self.features.iter().enumerate() {
            scan_start = scan_start.min(feature.scan);
            scan_end = scan_end.max(feature.scan);
            abundance_sum += feature.abundance;
            if feature.abundance > self.features[apex].abundance {
                apex = i;
            }
        }

        let (masses, nets, drifts): (Vec<f64>, Vec<f64>, Vec<f64>) = self
            .features
            .iter()
            .map(|f| (f.mono_mass, f.retention_time, f.drift_time))
            .multiunzip();

        self.mono_mass = representation.centroid(masses);
        self.retention_time = representation.centroid(nets);
        self.drift_time = representation.centroid(drifts);

        let apex_feature = &self.features[apex];
        self.mz = apex_feature.mz;
        self.charge = apex_feature.charge;
        self.abundance = apex_feature.abundance;
        self.scan = apex_feature.scan;
        self.scan_start = scan_start;
        self.scan_end = scan_end;
        self.abundance_sum = abundance_sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(id: usize, scan: i32, mz: f64, charge: i32, abundance: i64) -> MsFeature {
        let mut f = MsFeature::new(id, scan, mz, charge, abundance);
        f.mono_mass = mz * charge as f64;
        f.retention_time = scan as f64 / 100.0;
        f
    }

    #[test]
    fn test_statistics_apex_and_span() {
        let mut umc = UmcFeature::new(0);
        umc.add_feature(child(0, 10, 500.0, 2, 100));
        umc.add_feature(child(1, 11, 500.001, 2, 900));
        umc.add_feature(child(2, 12, 500.002, 2, 300));
        umc.calculate_statistics(CentroidRepresentation::Median);

        assert_eq!(umc.scan, 11);
        assert_eq!(umc.abundance, 900);
        assert_eq!(umc.abundance_sum, 1300);
        assert_eq!(umc.scan_start, 10);
        assert_eq!(umc.scan_end, 12);
        assert_eq!(umc.mz, 500.001);
        assert!((umc.mono_mass - 1000.002).abs() < 1e-9);
    }

    #[test]
    fn test_mean_vs_median_centroid() {
        let rep_mean = CentroidRepresentation::Mean;
        let rep_median = CentroidRepresentation::Median;
        let values = vec![1.0, 2.0, 100.0];
        assert!((rep_mean.centroid(values.clone()) - 34.333333333).abs() < 1e-6);
        assert_eq!(rep_median.centroid(values), 2.0);
    }

    #[test]
    fn test_absorb_moves_children() {
        let mut a = UmcFeature::new(0);
        let mut b = UmcFeature::new(1);
        a.add_feature(child(0, 10, 500.0, 2, 100));
        b.add_feature(child(1, 11, 500.0, 3, 200));
        a.absorb(&mut b);
        assert_eq!(a.features.len(), 2);
        assert!(b.features.is_empty());
    }

    #[test]
    fn test_charge_map_groups() {
        let mut umc = UmcFeature::new(0);
        umc.add_feature(child(0, 10, 500.0, 2, 100));
        umc.add_feature(child(1, 11, 334.0, 3, 200));
        umc.add_feature(child(2, 12, 500.1, 2, 300));
        let map = umc.charge_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&2].len(), 2);
        assert_eq!(map[&3].len(), 1);
    }
}
