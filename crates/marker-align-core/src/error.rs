use thiserror::Error;

/// Failure modes of a marker alignment run.
///
/// None of these are retried; they propagate to whoever drives the step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    /// Missing geometry, markers or fields, or malformed parameters.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// Not enough named markers were matched between model and data.
    #[error("only {found} markers matched - need at least 3")]
    InsufficientCorrespondence { found: usize },
    /// The least-squares solve did not report success.
    #[error("alignment to markers optimisation failed: {report}")]
    OptimizationFailed { report: String },
    /// Transformed coordinates could not be written back to the model.
    #[error("failed to transform model: {0}")]
    ApplyFailed(String),
    /// A persisted settings record could not be decoded.
    #[error("invalid align settings: {0}")]
    InvalidSettings(String),
}
