// agent-api-rs/src/main.rs
// HTTP entry point for the data analyst agent.

use std::sync::Arc;

use anyhow::Context;

use agent_api::{build_router, AppState, RuntimeConfig};
use analysis_pipeline::AnalysisPipeline;
use data_tools::{HttpTableClient, SvgChartRenderer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = RuntimeConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    let source = Arc::new(
        HttpTableClient::new(config.budget.source_timeout)
            .context("building HTTP table client")?,
    );
    let renderer = Arc::new(SvgChartRenderer::default());
    let pipeline = Arc::new(AnalysisPipeline::new(source, renderer, config.budget));

    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(pipeline, config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    log::info!("Data analyst agent listening on {}", bind_addr);
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}
