//! Crawl worker
//!
//! Consumes crawl requests and agent completions from NATS, runs them
//! through the orchestrator against Postgres, and answers conversation
//! questions over the crawled data.

mod config;
mod nats;
mod worker;

use anyhow::{Context, Result};
use crawl_orchestrator::{
    ContextBuilder, HttpCrawlAgent, JobOrchestrator, LanguageModel, LanguageModelPromptAnalyzer,
    NoopProductSearch, OpenAiChatModel, PostgresQuotaLedger, PostgresStore, ProductSearchProvider,
    ProductSimilarityEnricher, TavilyProductSearch,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use nats::{NatsClientPublisher, NatsEventPublisher};
use worker::Worker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crawl_orchestrator=debug,crawl_worker=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting crawl worker");

    let config = Config::from_env().context("Failed to load configuration")?;

    // Connect to database
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PostgresStore::from_pool(pool.clone()));
    store.migrate().await.context("Failed to run migrations")?;
    let quota = Arc::new(PostgresQuotaLedger::new(pool));

    let client = async_nats::connect(&config.nats_url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats_url))?;
    tracing::info!(url = %config.nats_url, "Connected to NATS");

    let mut model = OpenAiChatModel::new(config.openai_api_key.clone());
    if let Some(name) = &config.openai_model {
        model = model.with_model(name.clone());
    }
    tracing::info!(model = model.model(), "Language model configured");
    let model: Arc<dyn LanguageModel> = Arc::new(model);

    let search: Arc<dyn ProductSearchProvider> = match &config.tavily_api_key {
        Some(key) => Arc::new(TavilyProductSearch::new(key.clone())),
        None => {
            tracing::warn!("TAVILY_API_KEY not set, similar-product search disabled");
            Arc::new(NoopProductSearch)
        }
    };

    let orchestrator = Arc::new(JobOrchestrator::new(
        store.clone(),
        quota,
        Arc::new(LanguageModelPromptAnalyzer::new(model.clone())),
        Arc::new(HttpCrawlAgent::new(config.crawl_agent_url.clone())),
        Arc::new(NatsEventPublisher::new(NatsClientPublisher::new(client.clone()))),
    ));

    let context = Arc::new(
        ContextBuilder::new(store, model)
            .with_limits(config.context_limits.clone())
            .with_enricher(ProductSimilarityEnricher::new(search)),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        signal.cancel();
    });

    Worker::new(client, orchestrator, context)
        .run(shutdown)
        .await?;

    tracing::info!("Crawl worker stopped");
    Ok(())
}
