use anyhow::{Context, Result};
use crawl_orchestrator::ContextLimits;
use dotenvy::dotenv;
use std::env;

/// Worker configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub nats_url: String,
    pub crawl_agent_url: String,
    pub openai_api_key: String,
    pub openai_model: Option<String>,
    pub tavily_api_key: Option<String>,
    pub context_limits: ContextLimits,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = ContextLimits::default();
        let context_limits = defaults
            .clone()
            .with_max_jobs(parse_or("CONTEXT_MAX_JOBS", defaults.max_jobs)?)
            .with_max_items_per_job(parse_or(
                "CONTEXT_MAX_ITEMS_PER_JOB",
                defaults.max_items_per_job,
            )?)
            .with_summary_char_budget(parse_or(
                "SUMMARY_CHAR_BUDGET",
                defaults.summary_char_budget,
            )?);

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            crawl_agent_url: env::var("CRAWL_AGENT_URL").context("CRAWL_AGENT_URL must be set")?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_model: env::var("OPENAI_MODEL").ok(),
            tavily_api_key: env::var("TAVILY_API_KEY").ok().filter(|k| !k.is_empty()),
            context_limits,
        })
    }
}

fn parse_or(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
