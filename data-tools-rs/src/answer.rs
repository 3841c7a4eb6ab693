//! Free-form question answering collaborators.
//!
//! Questions that match neither the scrape-table nor the dataset rules have
//! no tabular plan; they are routed to a `QuestionAnswerer`. A real language
//! model client plugs in behind this trait. The shipped implementation
//! declines every question, so the core degrades to its per-kind defaults
//! exactly as it does when any other collaborator is unavailable.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, ToolError};

/// Free-form answering collaborator contract
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    /// Collaborator name, for logging
    fn name(&self) -> &str;

    /// Produce a JSON answer for a free-form question
    async fn answer(&self, question: &str) -> Result<Value>;
}

/// Answerer shipped when no language model collaborator is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnroutedAnswerer;

#[async_trait]
impl QuestionAnswerer for UnroutedAnswerer {
    fn name(&self) -> &str {
        "unrouted-answerer"
    }

    async fn answer(&self, _question: &str) -> Result<Value> {
        Err(ToolError::unsupported(
            "no language model collaborator is configured",
        ))
    }
}
