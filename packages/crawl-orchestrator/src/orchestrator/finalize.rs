//! Shared finalization for every dispatch path.

use chrono::Utc;
use std::time::Instant;

use super::{elapsed_ms, strategy, CrawlOutcome, JobOrchestrator};
use crate::error::{OrchestratorError, Result};
use crate::events::CrawlJobEvent;
use crate::traits::agent::AgentExecution;
use crate::types::{
    job::{CrawlJob, JobId, JobStatus},
    prompt::PromptHistory,
    result::CrawlResult,
    strategy::NavigationStrategy,
};

/// Item fields that may carry the page an item was extracted from.
const ITEM_URL_FIELDS: &[&str] = &["url", "source_url", "link"];

/// What the finalizer needs besides the job and the agent's answer.
#[derive(Debug, Clone, Default)]
pub struct FinalizeContext {
    pub history: Option<PromptHistory>,
    /// Strategy handed to the agent, if any
    pub strategy: Option<NavigationStrategy>,
    /// Whether strategy statistics should be touched at all
    pub navigation_used: bool,
}

fn item_source_url(item: &serde_json::Value, fallback: &str) -> String {
    ITEM_URL_FIELDS
        .iter()
        .find_map(|field| item.get(*field).and_then(|v| v.as_str()))
        .filter(|url| !url.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl JobOrchestrator {
    /// Complete a job whose agent run finished out of band.
    ///
    /// Fails with `JobNotFound` for unknown ids and `InvalidTransition` when
    /// the job is already terminal; nothing is touched in either case.
    #[tracing::instrument(skip(self, execution), fields(success = execution.success, items = execution.items.len()))]
    pub async fn finalize_from_external_result(
        &self,
        job_id: JobId,
        execution: AgentExecution,
    ) -> Result<CrawlOutcome> {
        let clock = Instant::now();
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(OrchestratorError::JobNotFound { job_id })?;

        if job.is_terminal() {
            let to = if execution.has_items() {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            };
            tracing::warn!(%job_id, status = %job.status, "Ignoring agent result for finished job");
            return Err(OrchestratorError::InvalidTransition {
                job_id,
                from: job.status,
                to,
            });
        }

        match self.finalize_external(&mut job, execution, clock).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Ok(self.recover(job_id, e, clock).await),
        }
    }

    async fn finalize_external(
        &self,
        job: &mut CrawlJob,
        execution: AgentExecution,
        clock: Instant,
    ) -> Result<CrawlOutcome> {
        let strategy = match job.navigation_strategy_id {
            Some(id) => self.store.get_strategy(id).await?,
            None => None,
        };
        let history = match job.parent_prompt_id {
            Some(id) => self.store.get_prompt_history(id).await?,
            None => None,
        };
        let navigation_used = strategy.is_some() || execution.executed_steps().is_some();

        job.start(Utc::now())?;
        let ctx = FinalizeContext {
            history,
            strategy,
            navigation_used,
        };
        self.finalize(job.clone(), ctx, execution, clock).await
    }

    /// Persist results, update strategy stats, mark the job terminal and
    /// announce it.
    pub(super) async fn finalize(
        &self,
        mut job: CrawlJob,
        ctx: FinalizeContext,
        execution: AgentExecution,
        clock: Instant,
    ) -> Result<CrawlOutcome> {
        let now = Utc::now();
        let execution_ms = if execution.execution_time_ms > 0 {
            execution.execution_time_ms
        } else {
            match job.started_at {
                Some(started) => u64::try_from((now - started).num_milliseconds()).unwrap_or(0),
                None => elapsed_ms(clock),
            }
        };
        let succeeded = execution.has_items();

        if succeeded {
            let results: Vec<CrawlResult> = execution
                .items
                .iter()
                .map(|item| {
                    CrawlResult::from_item(
                        job.id,
                        item_source_url(item, job.primary_url()),
                        job.prompt.clone(),
                        item.clone(),
                        now,
                    )
                })
                .collect();
            self.store.insert_results(&results).await?;
            tracing::debug!(job_id = %job.id, count = results.len(), "Stored crawl results");
        }

        if ctx.navigation_used {
            let update = strategy::record_run(
                &*self.store,
                ctx.strategy,
                job.primary_url(),
                execution.executed_steps(),
                succeeded,
                execution_ms as f64,
                job.id,
            )
            .await;
            if let Err(e) = update {
                tracing::warn!(error = %e, job_id = %job.id, "Failed to update navigation strategy");
            }
        }

        if succeeded {
            job.complete(execution.items.len(), execution.conversation_name.clone(), now)?;
        } else {
            let message = execution
                .error_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.config.default_failure_message.clone());
            job.fail(message, now)?;
        }
        self.store.update_job(&job).await?;

        if let Some(mut history) = ctx.history {
            history.conclude(job.id, i64::try_from(execution_ms).unwrap_or(i64::MAX));
            self.update_history_best_effort(&history).await;
        }

        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            result_count = job.result_count,
            execution_ms,
            "Crawl job finalized"
        );
        self.publish_best_effort(&CrawlJobEvent::completed(&job)).await;

        Ok(CrawlOutcome::from_job(&job, clock))
    }

    /// Mark a job failed after an unhandled fault and report it.
    pub(super) async fn recover(
        &self,
        job_id: JobId,
        error: OrchestratorError,
        clock: Instant,
    ) -> CrawlOutcome {
        let message = error.to_string();
        tracing::error!(%job_id, error = %message, "Crawl job failed");

        let mut job = match self.store.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return CrawlOutcome::failure(None, message, clock),
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Failed to reload job for recovery");
                return CrawlOutcome::failure(Some(job_id), message, clock);
            }
        };

        if job.is_terminal() {
            return CrawlOutcome::from_job(&job, clock);
        }

        if let Err(e) = job.fail(message.clone(), Utc::now()) {
            tracing::error!(%job_id, error = %e, "Failed to mark job failed");
            return CrawlOutcome::failure(Some(job_id), message, clock);
        }
        if let Err(e) = self.store.update_job(&job).await {
            tracing::error!(%job_id, error = %e, "Failed to persist failed job");
            return CrawlOutcome::failure(Some(job_id), message, clock);
        }
        self.publish_best_effort(&CrawlJobEvent::completed(&job)).await;
        CrawlOutcome::from_job(&job, clock)
    }
}
