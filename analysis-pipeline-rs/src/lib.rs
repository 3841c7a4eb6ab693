//! # Analysis Pipeline
//!
//! Deadline-aware orchestration core for the data analyst agent.
//!
//! A request's life: raw question text is classified into a task family and
//! an ordered list of sub-questions; the executor runs the acquire → analyze
//! → visualize stages under a shared, shrinking time budget, substituting
//! deterministic fallback values whenever a stage fails or the budget runs
//! out; the assembler maps the ordered results into the family's JSON
//! envelope. The external contract is unconditional: valid input always
//! yields a complete, shape-correct JSON answer inside the deadline.
//!
//! Collaborators (source fetching, chart rendering) come in behind the
//! `data_tools` traits; each request owns its context and budget, so
//! concurrent requests cannot interfere with each other.

pub mod error;
pub use error::{PipelineError, Result};

pub mod types;
pub use types::{
    AnswerKind, FallbackReason, RequestContext, ResponseEnvelope, StageResult, SubQuestion,
    TaskFamily,
};

pub mod budget;
pub use budget::{BudgetConfig, BudgetController};

pub mod fallback;
pub use fallback::{FallbackProvider, PLACEHOLDER_IMAGE_URI};

pub mod classifier;
pub use classifier::QuestionClassifier;

pub mod executor;
pub use executor::PipelineExecutor;

pub mod assembler;
pub use assembler::ResponseAssembler;

use std::sync::Arc;
use std::time::Instant;

use data_tools::{ChartRenderer, QuestionAnswerer, TableSource};

/// The classify → execute → assemble facade the HTTP surface drives.
///
/// Cheap to share behind an `Arc`; all per-request state lives in the
/// `RequestContext` created by [`AnalysisPipeline::prepare`].
pub struct AnalysisPipeline {
    classifier: QuestionClassifier,
    executor: PipelineExecutor,
    assembler: ResponseAssembler,
    config: BudgetConfig,
}

impl AnalysisPipeline {
    /// Wire a pipeline around the given collaborators and timing config
    pub fn new(
        source: Arc<dyn TableSource>,
        renderer: Arc<dyn ChartRenderer>,
        config: BudgetConfig,
    ) -> Self {
        Self {
            classifier: QuestionClassifier,
            executor: PipelineExecutor::new(source, renderer, config),
            assembler: ResponseAssembler::default(),
            config,
        }
    }

    /// Route free-form questions through the given answering collaborator
    pub fn with_answerer(mut self, answerer: Arc<dyn QuestionAnswerer>) -> Self {
        self.executor = self.executor.with_answerer(answerer);
        self
    }

    /// Classify a question and start its budget now.
    ///
    /// The only error path the caller ever sees: blank/undecodable input.
    pub fn prepare(&self, question: &str) -> Result<RequestContext> {
        self.prepare_at(question, Instant::now())
    }

    /// Classify a question with its budget anchored to an arrival instant,
    /// so time already spent queued counts against the deadline.
    pub fn prepare_at(&self, question: &str, arrival: Instant) -> Result<RequestContext> {
        let (family, sub_questions) = self.classifier.classify(question)?;
        let budget = BudgetController::start_at(arrival, &self.config);
        let ctx = RequestContext::new(question, family, sub_questions, budget);
        log::info!(
            "[{}] prepared {} request with {} sub-question(s)",
            ctx.id,
            ctx.family.name(),
            ctx.sub_questions.len()
        );
        Ok(ctx)
    }

    /// Run the pipeline and assemble the envelope; never errors
    pub async fn run(&self, ctx: &RequestContext) -> ResponseEnvelope {
        let results = self.executor.execute(ctx).await;
        self.assembler.assemble(ctx, &results)
    }

    /// The all-defaults envelope for a prepared request, used as the
    /// last-resort answer if the pipeline itself cannot be awaited
    pub fn fallback_envelope(&self, ctx: &RequestContext) -> ResponseEnvelope {
        self.assembler.full_fallback(ctx)
    }

    /// Convenience: prepare and run in one call
    pub async fn handle(&self, question: &str) -> Result<ResponseEnvelope> {
        let ctx = self.prepare(question)?;
        Ok(self.run(&ctx).await)
    }
}
