use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};

use crate::error::UmcError;

/// Fragmentation method reported with an MS2 scan.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum CollisionType {
    Cid,
    Hcd,
    Etd,
    Other,
    #[default]
    None,
}

impl Display for CollisionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CollisionType::Cid => write!(f, "CID"),
            CollisionType::Hcd => write!(f, "HCD"),
            CollisionType::Etd => write!(f, "ETD"),
            CollisionType::Other => write!(f, "Other"),
            CollisionType::None => write!(f, "None"),
        }
    }
}

/// A single (m/z, intensity) point of a sparse spectrum.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ScanPoint {
    pub mz: f64,
    pub intensity: f64,
}

/// Metadata reported alongside the points of one raw scan.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan: i32,
    pub ms_level: i32,
    pub precursor_mz: f64,
    pub total_ion_current: f64,
    pub collision_type: CollisionType,
}

/// One raw scan: sparse intensity-vs-m/z points plus metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawScan {
    pub points: Vec<ScanPoint>,
    pub summary: ScanSummary,
}

/// A fragmentation spectrum linked to a parent MS feature during the XIC
/// sweep. Only the metadata is retained; the fragment peaks themselves stay
/// with the raw data.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct MsnSpectrum {
    pub id: usize,
    pub scan: i32,
    pub ms_level: i32,
    pub precursor_mz: f64,
    pub total_ion_current: f64,
    pub collision_type: CollisionType,
}

/// Access to raw instrument scans by scan index.
///
/// Implementations must support monotonic sequential access; the XIC sweep
/// consumes scans strictly in increasing order. The total scan count must be
/// queryable up front.
pub trait RawScanProvider {
    /// Number of scans available, all MS levels included.
    fn total_scans(&self) -> usize;

    /// Returns the sparse spectrum and metadata for one scan.
    fn raw_spectrum(&self, scan: i32) -> Result<RawScan, UmcError>;
}

/// A scan provider backed by a plain in-memory vector of scans.
///
/// Used by tests and simulation; scan index equals vector position.
///
/// # Example
///
/// ```rust
/// use umcore::data::spectrum::{InMemoryScanProvider, RawScanProvider};
/// let mut provider = InMemoryScanProvider::new(50);
/// provider.add_gaussian_trace(500.25, 25.0, 4.0, 10_000.0);
/// let scan = provider.raw_spectrum(25).unwrap();
/// assert_eq!(scan.points.len(), 1);
/// assert!((scan.points[0].intensity - 10_000.0).abs() < 1.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryScanProvider {
    scans: Vec<RawScan>,
}

impl InMemoryScanProvider {
    /// Creates a provider with `total_scans` empty MS1 scans.
    pub fn new(total_scans: usize) -> Self {
        let scans = (0..total_scans)
            .map(|s| RawScan {
                points: Vec::new(),
                summary: ScanSummary { scan: s as i32, ms_level: 1, ..ScanSummary::default() },
            })
            .collect();
        InMemoryScanProvider { scans }
    }

    /// Replaces the scan at `scan` wholesale.
    pub fn set_scan(&mut self, scan: usize, raw: RawScan) {
        if scan < self.scans.len() {
            self.scans[scan] = raw;
        }
    }

    /// Adds a point to an existing scan.
    pub fn add_point(&mut self, scan: usize, mz: f64, intensity: f64) {
        if let Some(raw) = self.scans.get_mut(scan) {
            raw.points.push(ScanPoint { mz, intensity });
            raw.summary.total_ion_current += intensity;
        }
    }

    /// Marks a scan as an MS2 scan with the given precursor.
    pub fn set_fragment_scan(&mut self, scan: usize, precursor_mz: f64, collision_type: CollisionType) {
        if let Some(raw) = self.scans.get_mut(scan) {
            raw.summary.ms_level = 2;
            raw.summary.precursor_mz = precursor_mz;
            raw.summary.collision_type = collision_type;
        }
    }

    /// Lays down a Gaussian elution profile at a fixed m/z: every scan gets a
    /// point whose intensity follows a normal density centered at `apex_scan`
    /// with standard deviation `sigma_scans`, scaled so the apex has
    /// `apex_intensity`.
    pub fn add_gaussian_trace(&mut self, mz: f64, apex_scan: f64, sigma_scans: f64, apex_intensity: f64) {
        let normal = match Normal::new(apex_scan, sigma_scans) {
            Ok(n) => n,
            Err(_) => return,
        };
        let peak = normal.pdf(apex_scan);
        if peak <= 0.0 {
            return;
        }
        for s in 0..self.scans.len() {
            let intensity = apex_intensity * normal.pdf(s as f64) / peak;
            if intensity >= 1.0 {
                self.add_point(s, mz, intensity);
            }
        }
    }
}

impl RawScanProvider for InMemoryScanProvider {
    fn total_scans(&self) -> usize {
        self.scans.len()
    }

    fn raw_spectrum(&self, scan: i32) -> Result<RawScan, UmcError> {
        if scan < 0 {
            return Err(UmcError::ScanRead { scan, reason: "negative scan index".to_string() });
        }
        self.scans
            .get(scan as usize)
            .cloned()
            .ok_or_else(|| UmcError::ScanRead { scan, reason: "scan index out of range".to_string() })
    }
}
