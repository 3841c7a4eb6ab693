//! Error handling for the data tools SDK.
//!
//! Collaborator failures are categorized so the orchestration core can decide
//! how to degrade: timeouts and network failures take the source fallback
//! path, oversize renders take the placeholder path, and so on.

use thiserror::Error;

/// Result type for data tools operations
pub type Result<T> = std::result::Result<T, ToolError>;

/// Main error type for collaborator operations
#[derive(Error, Debug)]
pub enum ToolError {
    /// Network or connection errors while fetching a source
    #[error("Network error: {0}")]
    Network(String),

    /// A collaborator call exceeded its own deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Response or table payload could not be parsed
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// The dataset/table contained no usable rows for the operation
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Chart rendering failed
    #[error("Rendering error: {0}")]
    Rendering(String),

    /// Encoded image could not be brought under the size ceiling
    #[error("Image over size ceiling: {0} bytes")]
    Oversize(usize),

    /// The requested source or operation is not supported by this collaborator
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl ToolError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        ToolError::Network(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ToolError::Timeout(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ToolError::Parsing(message.into())
    }

    /// Create an empty-data error
    pub fn empty_data(message: impl Into<String>) -> Self {
        ToolError::EmptyData(message.into())
    }

    /// Create a rendering error
    pub fn rendering(message: impl Into<String>) -> Self {
        ToolError::Rendering(message.into())
    }

    /// Create an unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        ToolError::Unsupported(message.into())
    }

    /// True if the failure was a deadline overrun rather than a hard error
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::Timeout(_))
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ToolError::Timeout(err.to_string())
        } else if err.is_decode() {
            ToolError::Parsing(err.to_string())
        } else {
            ToolError::Network(err.to_string())
        }
    }
}
