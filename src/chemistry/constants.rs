use serde::{Deserialize, Serialize};

/// Reference masses needed to derive neutral monoisotopic mass from m/z.
///
/// Constructed explicitly and passed to the components that need it rather
/// than loaded from a global table, so tests can substitute synthetic values.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ChemistryConstants {
    /// Mass of a proton in Dalton.
    pub proton_mass: f64,
}

impl Default for ChemistryConstants {
    fn default() -> Self {
        ChemistryConstants { proton_mass: 1.007276466621 }
    }
}

impl ChemistryConstants {
    /// Neutral monoisotopic mass for an observed m/z at the given charge state.
    #[inline]
    pub fn mono_mass(&self, mz: f64, charge: i32) -> f64 {
        let z = charge as f64;
        mz * z - self.proton_mass * z
    }
}
