//! End-to-end pipeline behavior: envelope shapes, degradation paths, budget
//! enforcement and cross-request isolation, all against fake collaborators.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use analysis_pipeline::{AnalysisPipeline, BudgetConfig, ResponseEnvelope};
use data_tools::{
    ChartRenderer, QuestionAnswerer, SourceRef, SvgChartRenderer, TableSource, TabularData,
    ToolError, MAX_ENCODED_IMAGE_BYTES,
};

const WIKI_QUESTION: &str = "Scrape the list of highest grossing films from Wikipedia and answer:\n\
1. How many $2 bn movies were released before 2000?\n\
2. Which is the earliest film that grossed over $1.5 bn?\n\
3. What's the correlation between the Rank and Peak?\n\
4. Draw a scatterplot of Rank vs Peak with a dotted red regression line.\n";

const DATASET_QUESTION: &str = "Query the Indian high court judgments dataset with DuckDB.\n\
Which high court disposed the most cases from 2019 - 2022?\n\
What's the regression slope between Year and Peak?\n";

/// Source collaborator with scriptable behavior
enum FakeMode {
    Table(TabularData),
    Fail,
    Hang(Duration),
}

struct FakeSource {
    mode: FakeMode,
}

#[async_trait]
impl TableSource for FakeSource {
    fn name(&self) -> &str {
        "fake-source"
    }

    async fn fetch(&self, _source: &SourceRef) -> data_tools::Result<TabularData> {
        match &self.mode {
            FakeMode::Table(table) => Ok(table.clone()),
            FakeMode::Fail => Err(ToolError::network("connection refused")),
            FakeMode::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Err(ToolError::timeout("upstream never answered"))
            }
        }
    }
}

/// Answering collaborator that returns one canned value for every question
struct CannedAnswerer(Value);

#[async_trait]
impl QuestionAnswerer for CannedAnswerer {
    fn name(&self) -> &str {
        "canned-answerer"
    }

    async fn answer(&self, _question: &str) -> data_tools::Result<Value> {
        Ok(self.0.clone())
    }
}

/// A film table whose canonical answers differ from the fallback sample's
fn scraped_films() -> TabularData {
    let mut t = TabularData::new(vec![
        "Rank".into(),
        "Peak".into(),
        "Title".into(),
        "Worldwide gross".into(),
        "Year".into(),
    ]);
    let rows: [(i64, i64, &str, f64, i64); 6] = [
        (1, 1, "Avatar", 2.923, 2009),
        (2, 1, "Titanic", 2.257, 1997),
        (3, 2, "Star Wars: Episode I", 2.040, 1999),
        (4, 3, "Jurassic Park", 1.046, 1993),
        (5, 4, "The Lion King", 1.657, 2019),
        (6, 5, "The Avengers", 1.519, 2012),
    ];
    for (rank, peak, title, gross, year) in rows {
        t.push_row(vec![
            json!(rank),
            json!(peak),
            json!(title),
            json!(gross),
            json!(year),
        ])
        .unwrap();
    }
    t
}

fn test_budget() -> BudgetConfig {
    BudgetConfig {
        total: Duration::from_secs(5),
        stage_floor: Duration::from_millis(10),
        source_timeout: Duration::from_millis(300),
        viz_timeout: Duration::from_secs(1),
    }
}

fn pipeline(mode: FakeMode, config: BudgetConfig) -> AnalysisPipeline {
    AnalysisPipeline::new(
        Arc::new(FakeSource { mode }),
        Arc::new(SvgChartRenderer::default()),
        config,
    )
}

fn as_array(envelope: &ResponseEnvelope) -> Vec<Value> {
    match serde_json::to_value(envelope).unwrap() {
        Value::Array(items) => items,
        other => panic!("expected array envelope, got {}", other),
    }
}

#[tokio::test]
async fn scraped_question_yields_ordered_typed_array() -> Result<()> {
    let pipeline = pipeline(FakeMode::Table(scraped_films()), test_budget());
    let envelope = pipeline.handle(WIKI_QUESTION).await?;
    let items = as_array(&envelope);

    assert_eq!(items.len(), 4);
    // Two films over $2bn before 2000: Titanic and Episode I
    assert_eq!(items[0], json!(2));
    assert_eq!(items[1], json!("Titanic"));
    assert!(items[2].is_number());
    let image = items[3].as_str().expect("image answer is a string");
    assert!(image.starts_with("data:image/"));
    Ok(())
}

#[tokio::test]
async fn forced_source_failure_still_yields_complete_array() -> Result<()> {
    let pipeline = pipeline(FakeMode::Fail, test_budget());
    let envelope = pipeline.handle(WIKI_QUESTION).await?;
    let items = as_array(&envelope);

    assert_eq!(items.len(), 4);
    // Answers are derived from the deterministic sample dataset
    assert_eq!(items[0], json!(1));
    assert_eq!(items[1], json!("Titanic"));
    assert!(items[2].is_number());
    assert!(items[3].as_str().unwrap().starts_with("data:image/"));
    Ok(())
}

#[tokio::test]
async fn fallback_answers_are_stable_across_runs() -> Result<()> {
    let pipeline = pipeline(FakeMode::Fail, test_budget());
    let first = pipeline.handle(WIKI_QUESTION).await?;
    let second = pipeline.handle(WIKI_QUESTION).await?;
    assert_eq!(
        serde_json::to_value(&first)?,
        serde_json::to_value(&second)?
    );
    Ok(())
}

#[tokio::test]
async fn hung_source_is_abandoned_within_its_sub_timeout() -> Result<()> {
    let pipeline = pipeline(FakeMode::Hang(Duration::from_secs(30)), test_budget());
    let started = Instant::now();
    let envelope = pipeline.handle(WIKI_QUESTION).await?;
    let elapsed = started.elapsed();

    assert_eq!(as_array(&envelope).len(), 4);
    // Source cap is 300ms; the whole request must finish well under the
    // 5s budget, nowhere near the 30s hang.
    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
    Ok(())
}

#[tokio::test]
async fn exhausted_budget_short_circuits_to_defaults() -> Result<()> {
    // Floor above total: expired from the first check point
    let config = BudgetConfig {
        total: Duration::from_millis(10),
        stage_floor: Duration::from_millis(50),
        source_timeout: Duration::from_millis(300),
        viz_timeout: Duration::from_millis(300),
    };
    let pipeline = pipeline(FakeMode::Table(scraped_films()), config);
    let started = Instant::now();
    let envelope = pipeline.handle(WIKI_QUESTION).await?;

    let items = as_array(&envelope);
    assert_eq!(items.len(), 4);
    assert_eq!(items[0], json!(0));
    assert_eq!(items[1], Value::Null);
    assert_eq!(items[2], Value::Null);
    assert!(items[3].as_str().unwrap().starts_with("data:image/png"));
    assert!(started.elapsed() < Duration::from_secs(1));
    Ok(())
}

#[tokio::test]
async fn dataset_question_yields_complete_object() -> Result<()> {
    // Dataset querying is an external collaborator; the fake fails like the
    // shipped client does, and the envelope must still be fully keyed.
    let pipeline = pipeline(FakeMode::Fail, test_budget());
    let envelope = pipeline.handle(DATASET_QUESTION).await?;
    let value = serde_json::to_value(&envelope)?;
    let map = value.as_object().expect("object envelope");

    assert_eq!(map.len(), 2);
    // Unrouted dataset questions answer with the canned placeholder set
    assert_eq!(
        map["Which high court disposed the most cases from 2019 - 2022?"],
        json!("Placeholder response")
    );
    assert_eq!(
        map["What's the regression slope between Year and Peak?"],
        json!(0.0)
    );
    Ok(())
}

#[tokio::test]
async fn generic_question_yields_single_element_array() -> Result<()> {
    let pipeline = pipeline(FakeMode::Fail, test_budget());
    let envelope = pipeline
        .handle("Tell me something interesting about penguins.")
        .await?;
    let items = as_array(&envelope);
    assert_eq!(items.len(), 1);
    // No answering collaborator is plugged in, so the answer is the default
    assert_eq!(items[0], Value::Null);
    Ok(())
}

#[tokio::test]
async fn generic_question_routes_through_the_answerer() -> Result<()> {
    let pipeline = pipeline(FakeMode::Fail, test_budget())
        .with_answerer(Arc::new(CannedAnswerer(json!("Emperor penguins dive deepest."))));
    let envelope = pipeline
        .handle("Tell me something interesting about penguins.")
        .await?;
    assert_eq!(
        as_array(&envelope),
        vec![json!("Emperor penguins dive deepest.")]
    );
    Ok(())
}

#[tokio::test]
async fn embedded_images_respect_the_size_ceiling() -> Result<()> {
    let pipeline = pipeline(FakeMode::Table(scraped_films()), test_budget());
    let envelope = pipeline.handle(WIKI_QUESTION).await?;
    for item in as_array(&envelope) {
        if let Some(s) = item.as_str() {
            if s.starts_with("data:image/") {
                assert!(s.len() <= MAX_ENCODED_IMAGE_BYTES, "image is {} bytes", s.len());
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn slow_request_does_not_delay_concurrent_requests() -> Result<()> {
    let slow = Arc::new(pipeline(
        FakeMode::Hang(Duration::from_millis(1500)),
        BudgetConfig {
            source_timeout: Duration::from_secs(3),
            ..test_budget()
        },
    ));
    let fast_a = Arc::new(pipeline(FakeMode::Table(scraped_films()), test_budget()));
    let fast_b = Arc::new(pipeline(FakeMode::Fail, test_budget()));

    let run_timed = |p: Arc<AnalysisPipeline>| async move {
        let started = Instant::now();
        let envelope = p.handle(WIKI_QUESTION).await?;
        Ok::<_, analysis_pipeline::PipelineError>((envelope, started.elapsed()))
    };

    let (slow_res, fast_a_res, fast_b_res) = tokio::join!(
        run_timed(slow),
        run_timed(fast_a),
        run_timed(fast_b)
    );

    let (slow_env, slow_elapsed) = slow_res?;
    let (fast_a_env, fast_a_elapsed) = fast_a_res?;
    let (fast_b_env, fast_b_elapsed) = fast_b_res?;

    // The slow request waits out its hang; the others do not
    assert!(slow_elapsed >= Duration::from_millis(1500));
    assert!(fast_a_elapsed < Duration::from_millis(800), "took {:?}", fast_a_elapsed);
    assert!(fast_b_elapsed < Duration::from_millis(800), "took {:?}", fast_b_elapsed);

    // And nobody's results are corrupted by anyone else's
    assert_eq!(as_array(&fast_a_env)[0], json!(2));
    assert_eq!(as_array(&fast_b_env)[0], json!(1));
    assert_eq!(as_array(&slow_env).len(), 4);
    Ok(())
}
