//! Pipeline-level error type.

use crate::layout::LayoutError;
use crate::types::ModelError;

/// Error type for a pipeline run.
///
/// Configuration problems never reach this type: bad records are dropped at
/// parse time and missing sections fail construction with
/// [`ConfigError`](crate::factory::ConfigError).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Active-set invariant violation. Fatal for the run.
    #[error("Variable model error: {0}")]
    Model(#[from] ModelError),
    /// Layout phase misuse.
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),
    /// Host graph error.
    #[error("Host error: {0}")]
    Host(String),
}

impl PipelineError {
    /// Create a host error from any error type.
    pub fn from_host<E: std::error::Error>(e: E) -> Self {
        Self::Host(e.to_string())
    }
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
