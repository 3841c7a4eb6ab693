//! Pipeline error taxonomy.
//!
//! Only `InvalidInput` ever reaches a caller; every other variant is absorbed
//! inside the executor and converted into a fallback value so the external
//! contract (a complete JSON response within the deadline) holds
//! unconditionally.

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type for the orchestration core
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed or undecodable submission; surfaced to the caller as 4xx
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Source acquisition failed or timed out; recovered via fallback data
    #[error("Source acquisition failed: {0}")]
    Source(String),

    /// Analysis failed on the available data; recovered via default value
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Rendering or encoding failed; recovered via placeholder image
    #[error("Visualization failed: {0}")]
    Visualization(String),

    /// The request's global deadline was reached; remaining stages short-circuit
    #[error("Request budget exceeded")]
    BudgetExceeded,
}

impl PipelineError {
    /// Create an invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        PipelineError::InvalidInput(message.into())
    }

    /// Create a source error
    pub fn source(message: impl Into<String>) -> Self {
        PipelineError::Source(message.into())
    }

    /// Create an analysis error
    pub fn analysis(message: impl Into<String>) -> Self {
        PipelineError::Analysis(message.into())
    }

    /// Create a visualization error
    pub fn visualization(message: impl Into<String>) -> Self {
        PipelineError::Visualization(message.into())
    }

    /// True for the only variant that is surfaced to the caller
    pub fn is_user_visible(&self) -> bool {
        matches!(self, PipelineError::InvalidInput(_))
    }
}
