//! Core data model: request context, task families, sub-questions, stage
//! results and the response envelope.
//!
//! Everything here is created once and read thereafter; per-request values are
//! owned by the task handling that request and never shared across requests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use data_tools::SourceRef;

use crate::budget::BudgetController;

/// The value shape a sub-question's answer is expected to take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// A non-negative integer count
    Count,
    /// A short text answer (a name, a title)
    Text,
    /// A numeric scalar (correlation, slope)
    Scalar,
    /// A base64 data-URI encoded image
    Image,
}

/// One discrete answerable unit extracted from the submitted question text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQuestion {
    /// The sub-question's text as it appeared in the submission
    pub text: String,
    /// Expected answer shape
    pub kind: AnswerKind,
    /// Zero-based position, fixed at classification time
    pub position: usize,
}

/// Response-shape category a question is classified into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFamily {
    /// Array-of-answers over a scraped tabular source
    ScrapedTable { source_url: String },
    /// Object-of-answers over a queryable dataset
    QueryDataset { reference: String },
    /// Unrecognized phrasing; one sub-question wrapping the whole text
    Generic,
}

impl TaskFamily {
    /// True when the envelope for this family is a JSON array
    pub fn is_array_shaped(&self) -> bool {
        !matches!(self, TaskFamily::QueryDataset { .. })
    }

    /// Where the acquisition stage should look for raw data
    pub fn source_ref(&self) -> SourceRef {
        match self {
            TaskFamily::ScrapedTable { source_url } => SourceRef::Url(source_url.clone()),
            TaskFamily::QueryDataset { reference } => SourceRef::Dataset(reference.clone()),
            TaskFamily::Generic => SourceRef::None,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            TaskFamily::ScrapedTable { .. } => "scraped_table",
            TaskFamily::QueryDataset { .. } => "query_dataset",
            TaskFamily::Generic => "generic",
        }
    }
}

/// Why a stage produced a fallback instead of a real result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The stage's own sub-timeout elapsed
    Timeout,
    /// The acquisition collaborator failed
    SourceError,
    /// The analysis computation failed on the available data
    AnalysisError,
    /// Rendering or encoding failed, or the image busted its ceiling
    VisualizationError,
    /// The request's global budget expired before the stage could start
    Budget,
}

impl FallbackReason {
    /// Stable string tag, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::Timeout => "timeout",
            FallbackReason::SourceError => "source_error",
            FallbackReason::AnalysisError => "analysis_error",
            FallbackReason::VisualizationError => "visualization_error",
            FallbackReason::Budget => "budget",
        }
    }
}

/// Tagged outcome of one pipeline stage for one sub-question
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult {
    /// The stage completed with real data end to end
    Success(Value),
    /// A substitute value was used; the reason records which stage degraded
    Fallback(Value, FallbackReason),
    /// The stage failed outright. The executor normalizes this into a
    /// `Fallback` before assembly; it never reaches the envelope.
    Failed(String),
}

impl StageResult {
    /// The carried value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            StageResult::Success(v) | StageResult::Fallback(v, _) => Some(v),
            StageResult::Failed(_) => None,
        }
    }

    /// True when a substitute value was used
    pub fn is_fallback(&self) -> bool {
        matches!(self, StageResult::Fallback(..))
    }
}

/// Immutable per-request record, owned by the task handling the request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request id, for log correlation
    pub id: Uuid,
    /// The raw submitted question text
    pub question: String,
    /// Arrival timestamp
    pub received_at: DateTime<Utc>,
    /// The request's time budget, started on arrival
    pub budget: BudgetController,
    /// Classified task family
    pub family: TaskFamily,
    /// Ordered sub-questions, fixed at classification time
    pub sub_questions: Vec<SubQuestion>,
}

impl RequestContext {
    /// Assemble a context from classification output
    pub fn new(
        question: impl Into<String>,
        family: TaskFamily,
        sub_questions: Vec<SubQuestion>,
        budget: BudgetController,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            received_at: Utc::now(),
            budget,
            family,
            sub_questions,
        }
    }
}

/// The final response body: a JSON array or a JSON object per the task family
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    /// Ordered answers, one per sub-question
    Array(Vec<Value>),
    /// Answers keyed by the sub-question's original text
    Object(Map<String, Value>),
}

impl ResponseEnvelope {
    /// Number of answers carried
    pub fn len(&self) -> usize {
        match self {
            ResponseEnvelope::Array(items) => items.len(),
            ResponseEnvelope::Object(map) => map.len(),
        }
    }

    /// True when no answers are carried
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
