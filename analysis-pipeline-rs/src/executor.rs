//! Pipeline execution.
//!
//! For each request: one source-acquisition attempt shared by all
//! sub-questions, then per-sub-question analysis and (where asked for)
//! visualization, run concurrently and joined back in classification order.
//! Every stage start is gated on the request's shared budget; every failure
//! is absorbed into a fallback `StageResult`, never propagated.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use data_tools::{
    run_operation, AnalysisOp, ChartRenderer, ChartSpec, QuestionAnswerer, SourceRef,
    TableSource, TabularData, UnroutedAnswerer,
};

use crate::budget::{BudgetConfig, BudgetController};
use crate::classifier::extract_parameters;
use crate::fallback::FallbackProvider;
use crate::types::{
    AnswerKind, FallbackReason, RequestContext, StageResult, SubQuestion, TaskFamily,
};

// Column defaults for the canonical film-table questions; questions that name
// their own columns override these via parameter extraction.
const DEFAULT_VALUE_COLUMN: &str = "Worldwide gross";
const DEFAULT_LABEL_COLUMN: &str = "Title";
const DEFAULT_ORDER_COLUMN: &str = "Year";
const DEFAULT_X_COLUMN: &str = "Rank";
const DEFAULT_Y_COLUMN: &str = "Peak";

static EARLIEST_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(earliest|first|oldest)\b").expect("static pattern"));
static SLOPE_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(slope|regression|trend)\b").expect("static pattern"));

/// Runs the acquire/analyze/visualize pipeline for one request at a time
pub struct PipelineExecutor {
    source: Arc<dyn TableSource>,
    renderer: Arc<dyn ChartRenderer>,
    answerer: Arc<dyn QuestionAnswerer>,
    fallback: FallbackProvider,
    config: BudgetConfig,
}

impl PipelineExecutor {
    /// Build an executor around the given collaborators; free-form questions
    /// get the declining stub answerer until one is plugged in
    pub fn new(
        source: Arc<dyn TableSource>,
        renderer: Arc<dyn ChartRenderer>,
        config: BudgetConfig,
    ) -> Self {
        Self {
            source,
            renderer,
            answerer: Arc::new(UnroutedAnswerer),
            fallback: FallbackProvider,
            config,
        }
    }

    /// Route free-form questions through the given answering collaborator
    pub fn with_answerer(mut self, answerer: Arc<dyn QuestionAnswerer>) -> Self {
        self.answerer = answerer;
        self
    }

    /// Execute the pipeline for one request.
    ///
    /// Always returns exactly one `StageResult` per sub-question, in
    /// classification order, with every `Failed` already normalized into a
    /// `Fallback`.
    pub async fn execute(&self, ctx: &RequestContext) -> Vec<StageResult> {
        let (table, acquisition_fallback) = self.acquire(ctx).await;

        let mut handles = Vec::with_capacity(ctx.sub_questions.len());
        for sub in &ctx.sub_questions {
            let sub = sub.clone();
            let family = ctx.family.clone();
            let table = Arc::clone(&table);
            let renderer = Arc::clone(&self.renderer);
            let answerer = Arc::clone(&self.answerer);
            let budget = ctx.budget;
            let fallback = self.fallback;
            let config = self.config;
            handles.push(tokio::spawn(async move {
                answer_sub_question(
                    sub,
                    family,
                    table,
                    acquisition_fallback,
                    budget,
                    renderer,
                    answerer,
                    fallback,
                    config,
                )
                .await
            }));
        }

        // join in spawn order, which is classification order
        let mut results = Vec::with_capacity(handles.len());
        for (sub, handle) in ctx.sub_questions.iter().zip(handles) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    log::error!("[{}] sub-question task failed: {}", ctx.id, e);
                    StageResult::Failed(e.to_string())
                }
            };
            results.push(self.normalize(ctx, sub, result));
        }

        log::info!(
            "[{}] pipeline finished: {}/{} sub-questions on real data, {:?} budget left",
            ctx.id,
            results.iter().filter(|r| !r.is_fallback()).count(),
            results.len(),
            ctx.budget.remaining()
        );
        results
    }

    /// Source acquisition: one real attempt under the stage cap, then the
    /// sample dataset. Returns the table every sub-question will analyze and
    /// the fallback reason when the sample was substituted.
    async fn acquire(&self, ctx: &RequestContext) -> (Arc<TabularData>, Option<FallbackReason>) {
        let sample = || Arc::new(self.fallback.sample_table(&ctx.family).clone());

        let source_ref = ctx.family.source_ref();
        if source_ref == SourceRef::None {
            // Free-form questions go to the answering collaborator, not to a
            // table; the sample is only a safety net here
            return (sample(), None);
        }
        if ctx.budget.expired() {
            log::warn!("[{}] budget expired before acquisition", ctx.id);
            return (sample(), Some(FallbackReason::Budget));
        }
        let allowance = ctx.budget.stage_allowance(self.config.source_timeout);
        if allowance.is_zero() {
            return (sample(), Some(FallbackReason::Budget));
        }

        match tokio::time::timeout(allowance, self.source.fetch(&source_ref)).await {
            Ok(Ok(table)) if !table.is_empty() => {
                log::info!("[{}] acquired {} rows", ctx.id, table.len());
                (Arc::new(table), None)
            }
            Ok(Ok(_)) => {
                log::warn!("[{}] source returned an empty table", ctx.id);
                (sample(), Some(FallbackReason::SourceError))
            }
            Ok(Err(e)) => {
                log::warn!("[{}] acquisition failed: {}", ctx.id, e);
                let reason = if e.is_timeout() {
                    FallbackReason::Timeout
                } else {
                    FallbackReason::SourceError
                };
                (sample(), Some(reason))
            }
            Err(_) => {
                log::warn!(
                    "[{}] acquisition abandoned after {:?}",
                    ctx.id,
                    allowance
                );
                (sample(), Some(FallbackReason::Timeout))
            }
        }
    }

    /// `Failed` never reaches the assembler; it becomes the family's
    /// substitute for the kind
    fn normalize(&self, ctx: &RequestContext, sub: &SubQuestion, result: StageResult) -> StageResult {
        match result {
            StageResult::Failed(reason) => {
                log::warn!(
                    "substituting default for sub-question {}: {}",
                    sub.position,
                    reason
                );
                StageResult::Fallback(
                    self.fallback.placeholder_answer(&ctx.family, sub.kind),
                    FallbackReason::AnalysisError,
                )
            }
            other => other,
        }
    }
}

/// Analysis + visualization for one sub-question
async fn answer_sub_question(
    sub: SubQuestion,
    family: TaskFamily,
    table: Arc<TabularData>,
    acquisition_fallback: Option<FallbackReason>,
    budget: BudgetController,
    renderer: Arc<dyn ChartRenderer>,
    answerer: Arc<dyn QuestionAnswerer>,
    fallback: FallbackProvider,
    config: BudgetConfig,
) -> StageResult {
    if budget.expired() {
        return StageResult::Fallback(
            fallback.placeholder_answer(&family, sub.kind),
            FallbackReason::Budget,
        );
    }

    if family == TaskFamily::Generic {
        return answer_free_form(&sub, &family, budget, answerer, fallback, config.source_timeout)
            .await;
    }

    // Dataset questions without real data get the canned placeholder set;
    // the film sample is no substitute for a court-judgments table.
    if matches!(family, TaskFamily::QueryDataset { .. }) {
        if let Some(reason) = acquisition_fallback {
            return StageResult::Fallback(fallback.placeholder_answer(&family, sub.kind), reason);
        }
    }

    if sub.kind == AnswerKind::Image {
        return visualize(
            &sub,
            &family,
            &table,
            acquisition_fallback,
            budget,
            renderer,
            fallback,
            config.viz_timeout,
        )
        .await;
    }

    // Analysis never fails outward: unplannable or erroring operations
    // produce the family's substitute for the expected kind.
    let Some(op) = plan_operation(&sub) else {
        return StageResult::Fallback(
            fallback.placeholder_answer(&family, sub.kind),
            FallbackReason::AnalysisError,
        );
    };
    match run_operation(&table, &op) {
        Ok(value) => match acquisition_fallback {
            Some(reason) => StageResult::Fallback(value, reason),
            None => StageResult::Success(value),
        },
        Err(e) => {
            log::warn!("analysis failed for sub-question {}: {}", sub.position, e);
            StageResult::Fallback(
                fallback.placeholder_answer(&family, sub.kind),
                FallbackReason::AnalysisError,
            )
        }
    }
}

/// Free-form questions: one answering collaborator call under its cap, then
/// the kind's default
async fn answer_free_form(
    sub: &SubQuestion,
    family: &TaskFamily,
    budget: BudgetController,
    answerer: Arc<dyn QuestionAnswerer>,
    fallback: FallbackProvider,
    cap: Duration,
) -> StageResult {
    let allowance = budget.stage_allowance(cap);
    if allowance.is_zero() {
        return StageResult::Fallback(
            fallback.placeholder_answer(family, sub.kind),
            FallbackReason::Budget,
        );
    }
    match tokio::time::timeout(allowance, answerer.answer(&sub.text)).await {
        Ok(Ok(value)) => StageResult::Success(value),
        Ok(Err(e)) => {
            log::warn!(
                "{} declined sub-question {}: {}",
                answerer.name(),
                sub.position,
                e
            );
            StageResult::Fallback(
                fallback.placeholder_answer(family, sub.kind),
                FallbackReason::SourceError,
            )
        }
        Err(_) => {
            log::warn!(
                "{} abandoned after {:?} for sub-question {}",
                answerer.name(),
                allowance,
                sub.position
            );
            StageResult::Fallback(
                fallback.placeholder_answer(family, sub.kind),
                FallbackReason::Timeout,
            )
        }
    }
}

/// Visualization stage: one render attempt under its cap (the renderer may
/// internally degrade fidelity once), then the placeholder image
async fn visualize(
    sub: &SubQuestion,
    family: &TaskFamily,
    table: &TabularData,
    acquisition_fallback: Option<FallbackReason>,
    budget: BudgetController,
    renderer: Arc<dyn ChartRenderer>,
    fallback: FallbackProvider,
    viz_timeout: Duration,
) -> StageResult {
    let allowance = budget.stage_allowance(viz_timeout);
    if allowance.is_zero() {
        return StageResult::Fallback(
            fallback.placeholder_answer(family, AnswerKind::Image),
            FallbackReason::Budget,
        );
    }
    let spec = plan_chart(sub);
    match tokio::time::timeout(allowance, renderer.render(table, &spec)).await {
        Ok(Ok(image)) => {
            let value = json!(image.data_uri);
            match acquisition_fallback {
                Some(reason) => StageResult::Fallback(value, reason),
                None => StageResult::Success(value),
            }
        }
        Ok(Err(e)) => {
            log::warn!("render failed for sub-question {}: {}", sub.position, e);
            StageResult::Fallback(
                fallback.placeholder_answer(family, AnswerKind::Image),
                FallbackReason::VisualizationError,
            )
        }
        Err(_) => {
            log::warn!(
                "render abandoned after {:?} for sub-question {}",
                allowance,
                sub.position
            );
            StageResult::Fallback(
                fallback.placeholder_answer(family, AnswerKind::Image),
                FallbackReason::Timeout,
            )
        }
    }
}

/// Map a sub-question onto a concrete analysis operation
fn plan_operation(sub: &SubQuestion) -> Option<AnalysisOp> {
    let params = extract_parameters(&sub.text);
    let lower = sub.text.to_lowercase();
    match sub.kind {
        AnswerKind::Count => {
            if params.amounts.is_empty() && params.years.is_empty() {
                Some(AnalysisOp::RowCount)
            } else {
                Some(AnalysisOp::CountOver {
                    value_column: DEFAULT_VALUE_COLUMN.into(),
                    threshold: params.amounts.first().copied().unwrap_or(0.0),
                    year_column: params
                        .years
                        .first()
                        .map(|_| DEFAULT_ORDER_COLUMN.to_string()),
                    before_year: params.years.first().copied(),
                })
            }
        }
        AnswerKind::Text => {
            if EARLIEST_HINT.is_match(&lower) {
                Some(AnalysisOp::EarliestOver {
                    value_column: DEFAULT_VALUE_COLUMN.into(),
                    threshold: params.amounts.first().copied().unwrap_or(0.0),
                    label_column: DEFAULT_LABEL_COLUMN.into(),
                    order_column: DEFAULT_ORDER_COLUMN.into(),
                })
            } else {
                // No deterministic plan for open text questions
                None
            }
        }
        AnswerKind::Scalar => {
            let (x, y) = params
                .columns
                .unwrap_or_else(|| (DEFAULT_X_COLUMN.into(), DEFAULT_Y_COLUMN.into()));
            if SLOPE_HINT.is_match(&lower) && !lower.contains("correlation") {
                Some(AnalysisOp::RegressionSlope { x, y })
            } else {
                Some(AnalysisOp::Correlation { x, y })
            }
        }
        AnswerKind::Image => None,
    }
}

/// Chart specification for an image sub-question
fn plan_chart(sub: &SubQuestion) -> ChartSpec {
    let params = extract_parameters(&sub.text);
    let (x, y) = params
        .columns
        .unwrap_or_else(|| (DEFAULT_X_COLUMN.into(), DEFAULT_Y_COLUMN.into()));
    ChartSpec::scatter_with_regression(x, y)
}
