//! Error types for hazard and deaggregation calculations.

use thiserror::Error;

/// Errors surfaced by hazard and deaggregation entry points.
///
/// Programming errors (builder misuse, mismatched curve grids) are not
/// represented here; those panic. Numeric degeneracy (zero-rate bins) flows
/// through intermediates as NaN and is converted to "no value" at the
/// summary boundary.
#[derive(Error, Debug)]
pub enum HazardError {
    /// Configuration rejected at validation time (bad bin limits,
    /// out-of-range truncation, empty IMT set).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A hazard model or source set that cannot be calculated as declared.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A curve x-grid that is empty, mismatched, or not strictly increasing.
    #[error("invalid curve discretization: {0}")]
    InvalidDiscretization(String),

    /// A deaggregation target that cannot be resolved on the hazard curve.
    #[error("deaggregation target out of range: {0}")]
    TargetOutOfRange(String),

    /// Deaggregation requested on a hazard result computed without
    /// retained ground motions.
    #[error("hazard result retains no ground motions: {0}")]
    MissingDeaggData(String),
}
