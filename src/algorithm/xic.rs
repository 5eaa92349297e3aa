use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::refine::ChromatogramRefiner;
use crate::algorithm::tolerance::ppm_window;
use crate::data::feature::MsFeature;
use crate::data::spectrum::{MsnSpectrum, RawScanProvider};
use crate::data::umc::UmcFeature;
use crate::error::UmcError;
use crate::progress::ProgressSink;

/// Configuration for the XIC sweep and the refinement pass that follows it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct XicParameters {
    /// Scans added before and after a target's observed span.
    pub scan_window: i32,
    /// m/z window for linking MS2 scans to parent MS features, in Dalton.
    pub fragmentation_window: f64,
    /// Smoothing window of the refiner, in points.
    pub smoothing_points: usize,
    /// Polynomial order of the refiner's smoothing fit.
    pub polynomial_order: usize,
}

impl Default for XicParameters {
    fn default() -> Self {
        XicParameters {
            scan_window: 100,
            fragmentation_window: 0.5,
            smoothing_points: 5,
            polynomial_order: 3,
        }
    }
}

/// One sweep target: a bounded m/z window over an expected scan span, derived
/// from a (track, charge) pair.
#[derive(Clone, Debug)]
pub struct XicTarget {
    pub id: usize,
    /// m/z of the charge trace's highest-abundance child.
    pub mz: f64,
    pub low_mz: f64,
    pub high_mz: f64,
    pub charge: i32,
    pub start_scan: i32,
    pub end_scan: i32,
    /// Index of the owning track in the collection being swept.
    pub umc_idx: usize,
}

/// Rebuilds per-scan intensity traces for candidate tracks with one ascending
/// pass over the raw scans.
///
/// Targets and the scan stream are both monotonic in scan index, so the
/// builder keeps only the targets whose window overlaps the sweep position:
/// admitted once the sweep reaches their padded start, evicted once their
/// summed intensity drops below one past their padded end. Each scan's
/// spectrum is fetched once and shared by every active target.
pub struct XicBuilder {
    pub parameters: XicParameters,
}

impl XicBuilder {
    pub fn new(parameters: XicParameters) -> Self {
        XicBuilder { parameters }
    }

    /// Derives one target per (track, charge) pair, draining the tracks'
    /// child lists; the sweep repopulates them from the raw data.
    pub fn create_targets(&self, umcs: &mut [UmcFeature], mass_ppm: f64) -> Vec<XicTarget> {
        let mut targets = Vec::new();
        for (umc_idx, umc) in umcs.iter_mut().enumerate() {
            for (charge, children) in umc.take_charge_map() {
                let mut mz = 0.0;
                let mut max_abundance = i64::MIN;
                let mut scan_start = i32::MAX;
                let mut scan_end = i32::MIN;
                for child in &children {
                    scan_start = scan_start.min(child.scan);
                    scan_end = scan_end.max(child.scan);
                    if child.abundance > max_abundance {
                        max_abundance = child.abundance;
                        mz = child.mz;
                    }
                }
                let (low_mz, high_mz) = ppm_window(mz, mass_ppm);
                targets.push(XicTarget {
                    id: targets.len(),
                    mz,
                    low_mz,
                    high_mz,
                    charge,
                    start_scan: scan_start - self.parameters.scan_window,
                    end_scan: scan_end + self.parameters.scan_window,
                    umc_idx,
                });
            }
        }
        targets
    }

    /// Runs the sweep and the refinement pass.
    ///
    /// A provider failure on a single scan skips that scan and keeps
    /// sweeping; an empty `umcs` collection is an error because there is
    /// nothing to target. MS2 scans never contribute intensity: they are
    /// linked as child spectra to the MS features created from the most
    /// recent MS1 scan whose m/z lies within the fragmentation window.
    pub fn create_xics(
        &self,
        mut umcs: Vec<UmcFeature>,
        mass_ppm: f64,
        provider: &dyn RawScanProvider,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<UmcFeature>, UmcError> {
        if umcs.is_empty() {
            return Err(UmcError::NoFeatures);
        }

        sink.progress("sorting XIC targets for the scan sweep");
        let mut targets = self.create_targets(&mut umcs, mass_ppm);
        targets.sort_by_key(|t| t.start_scan);

        let total_scans = provider.total_scans() as i32;
        let min_scan = targets.iter().map(|t| t.start_scan).min().unwrap_or(0).max(0);
        let max_scan = targets.iter().map(|t| t.end_scan).max().unwrap_or(0).min(total_scans);
        sink.progress(&format!("sweeping scans {} to {} for {} targets", min_scan, max_scan, targets.len()));

        // active targets keyed by (low m/z, id) so one forward cursor into the
        // sorted spectrum serves every window in ascending order
        let mut active: BTreeMap<(OrderedFloat<f64>, usize), XicTarget> = BTreeMap::new();
        let mut next_target = 0usize;
        let mut next_feature_id = 0usize;
        let mut next_msn_id = 0usize;
        // (track index, child position) of features created in the latest MS1
        // scan, the only candidates an MS2 scan can be linked back to
        let mut fresh_parents: Vec<(usize, usize)> = Vec::new();

        for s in min_scan..max_scan {
            // admit targets whose window has opened; skip those already closed
            while next_target < targets.len() {
                let target = &targets[next_target];
                if target.start_scan > s {
                    break;
                }
                if s < target.end_scan {
                    active.insert((OrderedFloat(target.low_mz), target.id), target.clone());
                }
                next_target += 1;
            }
            if active.is_empty() {
                continue;
            }

            let scan = match provider.raw_spectrum(s) {
                Ok(scan) => scan,
                Err(e) => {
                    log::warn!("skipping unreadable scan {}: {}", s, e);
                    continue;
                }
            };

            if scan.summary.ms_level > 1 {
                for &(umc_idx, child_idx) in &fresh_parents {
                    let parent = &mut umcs[umc_idx].features[child_idx];
                    if (parent.mz - scan.summary.precursor_mz).abs() <= self.parameters.fragmentation_window {
                        parent.msn_spectra.push(MsnSpectrum {
                            id: next_msn_id,
                            scan: s,
                            ms_level: scan.summary.ms_level,
                            precursor_mz: scan.summary.precursor_mz,
                            total_ion_current: scan.summary.total_ion_current,
                            collision_type: scan.summary.collision_type,
                        });
                    }
                }
                next_msn_id += 1;
                continue;
            }

            let mut points = scan.points;
            points.sort_by(|a, b| a.mz.total_cmp(&b.mz));
            fresh_parents.clear();

            let mut evicted: Vec<(OrderedFloat<f64>, usize)> = Vec::new();
            let mut cursor = 0usize;
            for (key, target) in active.iter() {
                while cursor < points.len() && points[cursor].mz < target.low_mz {
                    cursor += 1;
                }
                let mut summed = 0.0;
                while cursor < points.len() && points[cursor].mz <= target.high_mz {
                    summed += points[cursor].intensity;
                    cursor += 1;
                }

                // only drop once the intensity is gone and the window is over
                if summed < 1.0 && target.end_scan < s {
                    evicted.push(*key);
                    continue;
                }

                let umc = &mut umcs[target.umc_idx];
                let mut child = MsFeature::new(next_feature_id, s, target.mz, target.charge, summed.round() as i64);
                child.mono_mass = umc.mono_mass;
                child.drift_time = umc.drift_time;
                child.retention_time = s as f64;
                child.group_id = umc.group_id;
                next_feature_id += 1;

                fresh_parents.push((target.umc_idx, umc.features.len()));
                umc.add_feature(child);
            }
            for key in evicted {
                active.remove(&key);
            }
        }

        sink.progress("filtering features with no data");
        umcs.retain(|u| !u.features.is_empty());

        sink.progress("refining XIC traces");
        let refiner = ChromatogramRefiner::new(self.parameters.smoothing_points, self.parameters.polynomial_order);
        Ok(refiner.refine(umcs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::{CollisionType, InMemoryScanProvider};
    use crate::progress::NullSink;

    fn seed_track(umc_idx: usize, mz: f64, charge: i32, scans: &[i32]) -> UmcFeature {
        let mut umc = UmcFeature::new(umc_idx);
        for (i, &scan) in scans.iter().enumerate() {
            umc.add_feature(MsFeature::new(i, scan, mz, charge, 100));
        }
        umc.calculate_statistics(crate::data::umc::CentroidRepresentation::Median);
        umc
    }

    fn builder(scan_window: i32) -> XicBuilder {
        XicBuilder::new(XicParameters { scan_window, ..XicParameters::default() })
    }

    #[test]
    fn test_targets_one_per_track_charge_pair() {
        let mut umc = seed_track(0, 500.25, 2, &[10, 11, 12]);
        umc.add_feature(MsFeature::new(9, 11, 334.0, 3, 50));
        let mut umcs = vec![umc];
        let targets = builder(100).create_targets(&mut umcs, 10.0);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.low_mz < t.mz && t.mz < t.high_mz));
        // targets drain the children; the sweep repopulates them
        assert!(umcs[0].features.is_empty());
    }

    #[test]
    fn test_sweep_rebuilds_trace_from_raw_data() {
        let mut provider = InMemoryScanProvider::new(120);
        provider.add_gaussian_trace(500.25, 60.0, 6.0, 50_000.0);

        // seed only saw three scans near the apex
        let umc = seed_track(0, 500.25, 2, &[58, 60, 62]);
        let out = builder(40)
            .create_xics(vec![umc], 10.0, &provider, &NullSink)
            .unwrap();

        assert_eq!(out.len(), 1);
        // the sweep recovered the full elution profile, not just three scans
        assert!(out[0].features.len() > 10);
        let apex = out[0].features.iter().map(|f| f.abundance).max().unwrap();
        assert!(apex > 40_000);
    }

    #[test]
    fn test_eviction_past_window_end() {
        // empty raw data: every summed intensity is zero, so each target is
        // evicted at the first scan past its end and gains no children
        let provider = InMemoryScanProvider::new(60);
        let umc = seed_track(0, 500.25, 2, &[20, 25, 30]);
        let builder = builder(5); // window [15, 35]
        let out = builder.create_xics(vec![umc], 10.0, &provider, &NullSink).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_eviction_by_first_zero_scan_past_window() {
        let mut provider = InMemoryScanProvider::new(60);
        // rectangular trace for the short target, scans 10..=20 only
        for s in 10..=20 {
            provider.add_point(s, 450.1, 1000.0);
        }
        // long-lived second target keeps the sweep running past scan 20
        for s in 5..=55 {
            provider.add_point(s, 700.4, 500.0);
        }

        let a = seed_track(0, 450.1, 2, &[10, 20]);
        let b = seed_track(1, 700.4, 2, &[5, 55]);
        // no padding: windows are exactly the observed spans
        let out = builder(0)
            .create_xics(vec![a, b], 10.0, &provider, &NullSink)
            .unwrap();

        assert_eq!(out.len(), 2);
        let short = out.iter().find(|u| u.features[0].mz == 450.1).unwrap();
        // zero intensity at scan 21 with the window over: evicted, no late children
        assert!(short.features.iter().all(|f| f.scan <= 20));
    }

    #[test]
    fn test_active_set_bounded_by_overlap() {
        let mut provider = InMemoryScanProvider::new(400);
        provider.add_gaussian_trace(400.2, 50.0, 4.0, 10_000.0);
        provider.add_gaussian_trace(600.3, 300.0, 4.0, 10_000.0);

        // two targets with disjoint windows: by the time the second opens,
        // the first must have been evicted, so it gets no late children
        let a = seed_track(0, 400.2, 2, &[45, 50, 55]);
        let b = seed_track(1, 600.3, 2, &[295, 300, 305]);
        let out = builder(20)
            .create_xics(vec![a, b], 10.0, &provider, &NullSink)
            .unwrap();

        assert_eq!(out.len(), 2);
        for umc in &out {
            let (min, max) = umc
                .features
                .iter()
                .fold((i32::MAX, i32::MIN), |(lo, hi), f| (lo.min(f.scan), hi.max(f.scan)));
            assert!(max - min < 100, "trace spans {}..{}", min, max);
        }
    }

    #[test]
    fn test_ms2_scans_link_and_do_not_contribute() {
        let mut provider = InMemoryScanProvider::new(40);
        provider.add_gaussian_trace(500.25, 20.0, 3.0, 10_000.0);
        provider.set_fragment_scan(21, 500.3, CollisionType::Hcd);

        let umc = seed_track(0, 500.25, 2, &[18, 20, 22]);
        let out = builder(10)
            .create_xics(vec![umc], 10.0, &provider, &NullSink)
            .unwrap();

        assert_eq!(out.len(), 1);
        // no child was created for the MS2 scan itself
        assert!(out[0].features.iter().all(|f| f.scan != 21));
        // the feature from scan 20 carries the linked fragmentation spectrum
        let linked: Vec<&MsFeature> = out[0]
            .features
            .iter()
            .filter(|f| !f.msn_spectra.is_empty())
            .collect();
        assert!(!linked.is_empty());
        assert_eq!(linked[0].msn_spectra[0].scan, 21);
        assert_eq!(linked[0].msn_spectra[0].collision_type, CollisionType::Hcd);
    }

    /// Delegates to an inner provider but fails on one scan.
    struct FlakyProvider {
        inner: InMemoryScanProvider,
        bad_scan: i32,
    }

    impl RawScanProvider for FlakyProvider {
        fn total_scans(&self) -> usize {
            self.inner.total_scans()
        }

        fn raw_spectrum(&self, scan: i32) -> Result<crate::data::spectrum::RawScan, UmcError> {
            if scan == self.bad_scan {
                return Err(UmcError::ScanRead { scan, reason: "simulated read failure".to_string() });
            }
            self.inner.raw_spectrum(scan)
        }
    }

    #[test]
    fn test_unreadable_scan_is_skipped_not_fatal() {
        let mut inner = InMemoryScanProvider::new(120);
        inner.add_gaussian_trace(500.25, 60.0, 6.0, 50_000.0);
        let provider = FlakyProvider { inner, bad_scan: 60 };

        let umc = seed_track(0, 500.25, 2, &[58, 60, 62]);
        let out = builder(40)
            .create_xics(vec![umc], 10.0, &provider, &NullSink)
            .unwrap();

        assert_eq!(out.len(), 1);
        // the apex scan failed to read but the rest of the trace survived
        assert!(out[0].features.iter().all(|f| f.scan != 60));
        assert!(out[0].features.len() > 10);
    }

    #[test]
    fn test_empty_input_is_error() {
        let provider = InMemoryScanProvider::new(10);
        let result = builder(5).create_xics(Vec::new(), 10.0, &provider, &NullSink);
        assert!(matches!(result, Err(UmcError::NoFeatures)));
    }
}
