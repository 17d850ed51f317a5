//! Storage traits for jobs, results, strategies, and prompt history.
//!
//! The storage layer is split into focused traits:
//! - `JobStore`: crawl jobs and their lifecycle updates
//! - `ResultStore`: extracted items per job
//! - `StrategyStore`: navigation strategies per domain
//! - `PromptHistoryStore`: prompt audit rows
//! - `CrawlStore`: composite trait combining all four
//!
//! Implementations are assumed transactional per call. Strategy updates are
//! last-writer-wins.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    job::{CrawlJob, JobId},
    prompt::PromptHistory,
    result::CrawlResult,
    strategy::NavigationStrategy,
};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &CrawlJob) -> Result<()>;

    /// Overwrite the mutable lifecycle fields of an existing job.
    async fn update_job(&self, job: &CrawlJob) -> Result<()>;

    async fn get_job(&self, id: JobId) -> Result<Option<CrawlJob>>;

    /// All jobs linked to a conversation, any status, any order.
    async fn list_jobs_for_conversation(&self, conversation_id: Uuid) -> Result<Vec<CrawlJob>>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert a batch of results atomically.
    async fn insert_results(&self, results: &[CrawlResult]) -> Result<()>;

    /// All results for a job, any order.
    async fn list_results_for_job(&self, job_id: JobId) -> Result<Vec<CrawlResult>>;

    async fn count_results_for_job(&self, job_id: JobId) -> Result<usize> {
        Ok(self.list_results_for_job(job_id).await?.len())
    }
}

#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Active strategies for a domain, in creation order.
    async fn find_active_strategies(&self, domain: &str) -> Result<Vec<NavigationStrategy>>;

    async fn get_strategy(&self, id: Uuid) -> Result<Option<NavigationStrategy>>;

    async fn insert_strategy(&self, strategy: &NavigationStrategy) -> Result<()>;

    /// Persist counters, average, and flags.
    async fn update_strategy(&self, strategy: &NavigationStrategy) -> Result<()>;
}

#[async_trait]
pub trait PromptHistoryStore: Send + Sync {
    async fn insert_prompt_history(&self, history: &PromptHistory) -> Result<()>;

    async fn get_prompt_history(&self, id: Uuid) -> Result<Option<PromptHistory>>;

    async fn update_prompt_history(&self, history: &PromptHistory) -> Result<()>;
}

/// Composite storage trait used by the orchestrator and context builder.
pub trait CrawlStore: JobStore + ResultStore + StrategyStore + PromptHistoryStore {}

// Blanket implementation: anything implementing all four traits is a CrawlStore
impl<T: JobStore + ResultStore + StrategyStore + PromptHistoryStore> CrawlStore for T {}
