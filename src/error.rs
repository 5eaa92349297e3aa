use thiserror::Error;

/// Errors surfaced by the clustering and chromatogram-building stages.
///
/// Empty input collections are not errors anywhere in the crate; they yield
/// empty output. `ScanRead` is fatal when returned from a provider directly,
/// but tolerated per scan inside the XIC sweep (the scan is skipped).
#[derive(Error, Debug)]
pub enum UmcError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no features were available to create XICs from")]
    NoFeatures,

    #[error("failed to read scan {scan}: {reason}")]
    ScanRead { scan: i32, reason: String },

    #[error("distance evaluation failed in partition block {block}: {reason}")]
    Distance { block: usize, reason: String },
}
