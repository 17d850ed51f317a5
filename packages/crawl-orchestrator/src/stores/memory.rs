//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::traits::store::{JobStore, PromptHistoryStore, ResultStore, StrategyStore};
use crate::types::{
    job::{CrawlJob, JobId},
    prompt::PromptHistory,
    result::CrawlResult,
    strategy::NavigationStrategy,
};

#[derive(Debug, thiserror::Error)]
enum MemoryStoreError {
    #[error("duplicate key: {0}")]
    Duplicate(Uuid),
    #[error("row not found: {0}")]
    Missing(Uuid),
}

/// In-memory storage for jobs, results, strategies, and prompt history.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<JobId, CrawlJob>>,
    results: RwLock<Vec<CrawlResult>>,
    strategies: RwLock<Vec<NavigationStrategy>>,
    prompts: RwLock<HashMap<Uuid, PromptHistory>>,
    result_reads: AtomicUsize,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_count(&self) -> usize {
        read(&self.jobs).len()
    }

    pub fn result_count(&self) -> usize {
        read(&self.results).len()
    }

    pub fn strategy_count(&self) -> usize {
        read(&self.strategies).len()
    }

    pub fn prompt_count(&self) -> usize {
        read(&self.prompts).len()
    }

    /// How many times results were listed for a job.
    pub fn result_reads(&self) -> usize {
        self.result_reads.load(Ordering::Relaxed)
    }

    /// Snapshot of every stored strategy.
    pub fn strategies(&self) -> Vec<NavigationStrategy> {
        read(&self.strategies).clone()
    }

    /// Snapshot of every stored prompt history row.
    pub fn prompt_histories(&self) -> Vec<PromptHistory> {
        read(&self.prompts).values().cloned().collect()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: &CrawlJob) -> Result<()> {
        let mut jobs = write(&self.jobs);
        if jobs.contains_key(&job.id) {
            return Err(OrchestratorError::storage(MemoryStoreError::Duplicate(job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &CrawlJob) -> Result<()> {
        let mut jobs = write(&self.jobs);
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(OrchestratorError::storage(MemoryStoreError::Missing(job.id))),
        }
    }

    async fn get_job(&self, id: JobId) -> Result<Option<CrawlJob>> {
        Ok(read(&self.jobs).get(&id).cloned())
    }

    async fn list_jobs_for_conversation(&self, conversation_id: Uuid) -> Result<Vec<CrawlJob>> {
        Ok(read(&self.jobs)
            .values()
            .filter(|j| j.linkage.conversation_id == Some(conversation_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_results(&self, results: &[CrawlResult]) -> Result<()> {
        write(&self.results).extend_from_slice(results);
        Ok(())
    }

    async fn list_results_for_job(&self, job_id: JobId) -> Result<Vec<CrawlResult>> {
        self.result_reads.fetch_add(1, Ordering::Relaxed);
        Ok(read(&self.results)
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn count_results_for_job(&self, job_id: JobId) -> Result<usize> {
        Ok(read(&self.results).iter().filter(|r| r.job_id == job_id).count())
    }
}

#[async_trait]
impl StrategyStore for MemoryStore {
    async fn find_active_strategies(&self, domain: &str) -> Result<Vec<NavigationStrategy>> {
        Ok(read(&self.strategies)
            .iter()
            .filter(|s| s.is_active && s.domain == domain)
            .cloned()
            .collect())
    }

    async fn get_strategy(&self, id: Uuid) -> Result<Option<NavigationStrategy>> {
        Ok(read(&self.strategies).iter().find(|s| s.id == id).cloned())
    }

    async fn insert_strategy(&self, strategy: &NavigationStrategy) -> Result<()> {
        let mut strategies = write(&self.strategies);
        if strategies.iter().any(|s| s.id == strategy.id) {
            return Err(OrchestratorError::storage(MemoryStoreError::Duplicate(strategy.id)));
        }
        strategies.push(strategy.clone());
        Ok(())
    }

    async fn update_strategy(&self, strategy: &NavigationStrategy) -> Result<()> {
        let mut strategies = write(&self.strategies);
        match strategies.iter_mut().find(|s| s.id == strategy.id) {
            Some(existing) => {
                *existing = strategy.clone();
                Ok(())
            }
            None => Err(OrchestratorError::storage(MemoryStoreError::Missing(strategy.id))),
        }
    }
}

#[async_trait]
impl PromptHistoryStore for MemoryStore {
    async fn insert_prompt_history(&self, history: &PromptHistory) -> Result<()> {
        write(&self.prompts).insert(history.id, history.clone());
        Ok(())
    }

    async fn get_prompt_history(&self, id: Uuid) -> Result<Option<PromptHistory>> {
        Ok(read(&self.prompts).get(&id).cloned())
    }

    async fn update_prompt_history(&self, history: &PromptHistory) -> Result<()> {
        let mut prompts = write(&self.prompts);
        match prompts.get_mut(&history.id) {
            Some(existing) => {
                *existing = history.clone();
                Ok(())
            }
            None => Err(OrchestratorError::storage(MemoryStoreError::Missing(history.id))),
        }
    }
}
