use serde::{Deserialize, Serialize};

use crate::data::spectrum::MsnSpectrum;

/// One deisotoped mass measurement observed in a single scan.
///
/// This is the child level of the feature hierarchy: a feature belongs to
/// exactly one track (`UmcFeature`) at a time, and moves wholesale when
/// tracks merge. `retention_time` is the normalized elution time (NET) over
/// the run once the tree clusterer has seen the full scan range.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MsFeature {
    pub id: usize,
    pub scan: i32,
    pub mz: f64,
    pub charge: i32,
    pub abundance: i64,
    /// Neutral monoisotopic mass estimate.
    pub mono_mass: f64,
    /// Normalized elution time in [0, 1].
    pub retention_time: f64,
    /// Ion-mobility drift time; 0.0 when the instrument has no drift dimension.
    pub drift_time: f64,
    /// Identifier of the originating experimental run.
    pub group_id: i32,
    /// Fragmentation spectra linked to this measurement during the XIC sweep.
    pub msn_spectra: Vec<MsnSpectrum>,
}

impl MsFeature {
    /// Creates a feature from the measurements every reader provides.
    ///
    /// # Arguments
    ///
    /// * `id` - unique id within the run.
    /// * `scan` - scan index the measurement was observed in.
    /// * `mz` - observed mass over charge.
    /// * `charge` - charge state.
    /// * `abundance` - intensity of the measurement.
    pub fn new(id: usize, scan: i32, mz: f64, charge: i32, abundance: i64) -> Self {
        MsFeature {
            id,
            scan,
            mz,
            charge,
            abundance,
            ..MsFeature::default()
        }
    }
}
