use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Budgets for the retrieval context handed to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextLimits {
    /// Most recent completed jobs included in a Q&A context
    pub max_jobs: usize,
    /// Most recent results included per job in a Q&A context
    pub max_items_per_job: usize,
    /// Hard ceiling on the whole summarization prompt, in characters
    pub summary_char_budget: usize,
    /// Product descriptors extracted per result set
    pub max_products: usize,
    /// Distinct similarity queries per message
    pub max_similarity_queries: usize,
    /// Links kept per similarity query
    pub max_links_per_query: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_jobs: 10,
            max_items_per_job: 500,
            summary_char_budget: 120_000,
            max_products: 12,
            max_similarity_queries: 3,
            max_links_per_query: 3,
        }
    }
}

impl ContextLimits {
    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_max_items_per_job(mut self, max_items: usize) -> Self {
        self.max_items_per_job = max_items;
        self
    }

    pub fn with_summary_char_budget(mut self, budget: usize) -> Self {
        self.summary_char_budget = budget;
        self
    }
}

/// Orchestrator behaviour knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Crawl units charged per accepted request
    pub units_per_crawl: u32,
    /// Error recorded when the agent gives no reason
    pub default_failure_message: String,
    /// Refund the unit when the agent rejects a submission outright
    pub refund_on_rejection: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            units_per_crawl: 1,
            default_failure_message: OrchestratorError::AgentReturnedEmpty.to_string(),
            refund_on_rejection: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_units_per_crawl(mut self, units: u32) -> Self {
        self.units_per_crawl = units;
        self
    }

    pub fn with_refund_on_rejection(mut self, refund: bool) -> Self {
        self.refund_on_rejection = refund;
        self
    }
}
