//! Crawl job orchestration.
//!
//! Two ways in, one way out:
//! - [`JobOrchestrator::execute_intelligent_crawl`]: interactive, blocks on the agent
//! - [`JobOrchestrator::execute_intelligent_crawl_from_event`]: bus-driven, submits
//!   and returns; results may arrive inline or later through
//!   [`JobOrchestrator::finalize_from_external_result`]
//!
//! Both paths gate quota, record the prompt, create the job, pick a
//! navigation strategy and dispatch. Every finished run goes through the same
//! finalizer: persist results, update strategy statistics, mark the job
//! terminal, then publish `JobCompleted`.
//!
//! Public entry points never return an error for dispatch faults. Anything
//! that goes wrong after the job row exists marks the job `Failed` and comes
//! back as a failure outcome.

mod finalize;
pub mod strategy;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::events::{CrawlJobEvent, CrawlRequestedEvent};
use crate::traits::{
    agent::{AgentRequest, AgentSubmission, CrawlAgentClient},
    analyzer::{KeywordPromptAnalyzer, PromptAnalyzer},
    publisher::EventPublisher,
    quota::{QuotaDecision, QuotaGate},
    store::CrawlStore,
};
use crate::types::{
    config::OrchestratorConfig,
    job::{CrawlJob, JobId, JobLinkage, JobResultView, JobStatus},
    prompt::{PromptAnalysis, PromptHistory},
    strategy::NavigationStrategy,
};

pub use finalize::FinalizeContext;

/// Interactive crawl request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub user_id: Uuid,
    pub prompt: String,
    pub url: String,
    #[serde(default)]
    pub linkage: JobLinkage,
    #[serde(default)]
    pub max_pages: Option<u32>,
}

impl CrawlRequest {
    pub fn new(user_id: Uuid, url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            user_id,
            prompt: prompt.into(),
            url: url.into(),
            linkage: JobLinkage::default(),
            max_pages: None,
        }
    }

    pub fn with_linkage(mut self, linkage: JobLinkage) -> Self {
        self.linkage = linkage;
        self
    }
}

/// What a dispatch produced, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlOutcome {
    /// `None` only when nothing was persisted (cancelled before the job existed)
    pub job_id: Option<JobId>,
    pub success: bool,
    pub item_count: usize,
    pub elapsed_ms: u64,
    pub error_message: Option<String>,
    pub conversation_name: Option<String>,
}

impl CrawlOutcome {
    fn from_job(job: &CrawlJob, clock: Instant) -> Self {
        Self {
            job_id: Some(job.id),
            success: job.status == JobStatus::Completed,
            item_count: usize::try_from(job.result_count).unwrap_or_default(),
            elapsed_ms: elapsed_ms(clock),
            error_message: job.error_message.clone(),
            conversation_name: job.conversation_name.clone(),
        }
    }

    fn failure(job_id: Option<JobId>, message: impl Into<String>, clock: Instant) -> Self {
        Self {
            job_id,
            success: false,
            item_count: 0,
            elapsed_ms: elapsed_ms(clock),
            error_message: Some(message.into()),
            conversation_name: None,
        }
    }
}

/// Result of the event-driven entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Cancelled before anything was charged or persisted
    Skipped,
    /// Redelivery of a job id that already exists; nothing charged
    Duplicate { job_id: JobId },
    /// Balance too low; a `Failed` job was recorded
    QuotaExceeded { job_id: JobId },
    /// Agent declined; job `Failed`
    Rejected { job_id: JobId, message: String },
    /// Agent returned results inline and the job is terminal
    Finalized { outcome: CrawlOutcome },
    /// Agent accepted for background processing; job `InProgress`
    Started { job_id: JobId },
    /// Unhandled fault; job `Failed` if it existed
    Failed {
        job_id: Option<JobId>,
        message: String,
    },
}

pub(crate) fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Everything known once the job row exists.
struct Prepared {
    job: CrawlJob,
    history: PromptHistory,
    requires_navigation: bool,
    max_pages: Option<u32>,
}

/// Why dispatch stopped before a job was ready for the agent.
enum Halted {
    Cancelled,
    QuotaExceeded(CrawlJob),
}

/// Input shared by both dispatch paths.
struct DispatchInput<'a> {
    job_id: JobId,
    user_id: Uuid,
    url: &'a str,
    prompt: &'a str,
    linkage: JobLinkage,
    max_pages: Option<u32>,
    plan_navigation: bool,
    initial_status: JobStatus,
}

/// Coordinates quota, agent, persistence, and lifecycle events for crawl jobs.
pub struct JobOrchestrator {
    store: Arc<dyn CrawlStore>,
    quota: Arc<dyn QuotaGate>,
    analyzer: Arc<dyn PromptAnalyzer>,
    agent: Arc<dyn CrawlAgentClient>,
    publisher: Arc<dyn EventPublisher>,
    config: OrchestratorConfig,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn CrawlStore>,
        quota: Arc<dyn QuotaGate>,
        analyzer: Arc<dyn PromptAnalyzer>,
        agent: Arc<dyn CrawlAgentClient>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            quota,
            analyzer,
            agent,
            publisher,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // =========================================================================
    // Interactive path
    // =========================================================================

    /// Run a crawl end to end and wait for the agent.
    #[tracing::instrument(skip(self, request, cancel), fields(user_id = %request.user_id, url = %request.url))]
    pub async fn execute_intelligent_crawl(
        &self,
        request: CrawlRequest,
        cancel: &CancellationToken,
    ) -> CrawlOutcome {
        let clock = Instant::now();
        let input = DispatchInput {
            job_id: Uuid::now_v7(),
            user_id: request.user_id,
            url: &request.url,
            prompt: &request.prompt,
            linkage: request.linkage,
            max_pages: request.max_pages,
            plan_navigation: false,
            initial_status: JobStatus::InProgress,
        };

        let prepared = match self.prepare(input, cancel).await {
            Ok(Ok(prepared)) => prepared,
            Ok(Err(Halted::Cancelled)) => {
                return CrawlOutcome::failure(None, OrchestratorError::Cancelled.to_string(), clock)
            }
            Ok(Err(Halted::QuotaExceeded(job))) => return CrawlOutcome::from_job(&job, clock),
            Err(e) => {
                tracing::error!(error = %e, "Crawl dispatch failed before job creation");
                return CrawlOutcome::failure(None, e.to_string(), clock);
            }
        };

        let job_id = prepared.job.id;
        match self.run_interactive(prepared, cancel, clock).await {
            Ok(outcome) => outcome,
            Err(e) => self.recover(job_id, e, clock).await,
        }
    }

    async fn run_interactive(
        &self,
        prepared: Prepared,
        cancel: &CancellationToken,
        clock: Instant,
    ) -> Result<CrawlOutcome> {
        let Prepared {
            mut job,
            history,
            requires_navigation,
            max_pages,
        } = prepared;

        let strategy = self.resolve_strategy(&mut job, requires_navigation).await?;
        let request = agent_request(&job, strategy.as_ref(), max_pages);

        let execution = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            result = self.agent.execute(&request) => result?,
        };

        let ctx = FinalizeContext {
            history: Some(history),
            strategy,
            navigation_used: requires_navigation,
        };
        self.finalize(job, ctx, execution, clock).await
    }

    // =========================================================================
    // Event-driven path
    // =========================================================================

    /// Handle an inbound crawl request. Returns as soon as the agent has
    /// accepted, rejected, or completed the submission.
    #[tracing::instrument(skip(self, event, cancel), fields(job_id = %event.job_id, url = %event.url))]
    pub async fn execute_intelligent_crawl_from_event(
        &self,
        event: CrawlRequestedEvent,
        cancel: &CancellationToken,
    ) -> SubmissionOutcome {
        let clock = Instant::now();
        match self.store.get_job(event.job_id).await {
            Ok(Some(existing)) => {
                tracing::warn!(status = %existing.status, "Crawl request redelivered for existing job, ignoring");
                return SubmissionOutcome::Duplicate {
                    job_id: existing.id,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to look up job before submission");
                return SubmissionOutcome::Failed {
                    job_id: None,
                    message: e.to_string(),
                };
            }
        }

        let input = DispatchInput {
            job_id: event.job_id,
            user_id: event.sender_id,
            url: &event.url,
            prompt: &event.prompt,
            linkage: event.linkage(),
            max_pages: event.max_pages,
            plan_navigation: event.plan_navigation,
            initial_status: JobStatus::Queued,
        };

        let prepared = match self.prepare(input, cancel).await {
            Ok(Ok(prepared)) => prepared,
            Ok(Err(Halted::Cancelled)) => return SubmissionOutcome::Skipped,
            Ok(Err(Halted::QuotaExceeded(job))) => {
                return SubmissionOutcome::QuotaExceeded { job_id: job.id }
            }
            Err(e) => {
                tracing::error!(error = %e, "Crawl submission failed before job creation");
                return SubmissionOutcome::Failed {
                    job_id: None,
                    message: e.to_string(),
                };
            }
        };

        let job_id = prepared.job.id;
        match self.submit_and_maybe_finalize(prepared, cancel, clock).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let outcome = self.recover(job_id, e, clock).await;
                SubmissionOutcome::Failed {
                    job_id: outcome.job_id,
                    message: outcome.error_message.unwrap_or_default(),
                }
            }
        }
    }

    async fn submit_and_maybe_finalize(
        &self,
        prepared: Prepared,
        cancel: &CancellationToken,
        clock: Instant,
    ) -> Result<SubmissionOutcome> {
        let Prepared {
            mut job,
            mut history,
            requires_navigation,
            max_pages,
        } = prepared;

        let strategy = self.resolve_strategy(&mut job, requires_navigation).await?;
        let request = agent_request(&job, strategy.as_ref(), max_pages);

        let submission = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            result = self.agent.submit(&request) => result?,
        };

        match submission {
            AgentSubmission::Rejected { message } => {
                let rejection = OrchestratorError::AgentRejected {
                    message: message.clone(),
                };
                tracing::warn!(job_id = %job.id, error = %rejection, "Crawl submission not accepted");
                job.fail(message.clone(), chrono::Utc::now())?;
                self.store.update_job(&job).await?;
                if self.config.refund_on_rejection {
                    self.refund(job.user_id).await;
                }
                history.conclude(job.id, i64::try_from(elapsed_ms(clock)).unwrap_or(i64::MAX));
                self.update_history_best_effort(&history).await;
                self.publish_best_effort(&CrawlJobEvent::completed(&job)).await;
                Ok(SubmissionOutcome::Rejected {
                    job_id: job.id,
                    message,
                })
            }
            AgentSubmission::Completed { execution } => {
                job.start(chrono::Utc::now())?;
                let ctx = FinalizeContext {
                    history: Some(history),
                    strategy,
                    navigation_used: requires_navigation,
                };
                let outcome = self.finalize(job, ctx, execution, clock).await?;
                Ok(SubmissionOutcome::Finalized { outcome })
            }
            AgentSubmission::Accepted => {
                job.start(chrono::Utc::now())?;
                self.store.update_job(&job).await?;
                tracing::info!(job_id = %job.id, "Crawl accepted for background processing");
                self.publish_best_effort(&CrawlJobEvent::started(&job)).await;
                Ok(SubmissionOutcome::Started { job_id: job.id })
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Status/result projection for one job.
    pub async fn get_job_result(&self, job_id: JobId) -> Result<Option<JobResultView>> {
        Ok(self
            .store
            .get_job(job_id)
            .await?
            .map(|job| JobResultView::from(&job)))
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    /// Quota gate, prompt analysis, prompt history, job row.
    ///
    /// The outer `Result` carries unhandled faults; the inner one says whether
    /// dispatch should continue.
    async fn prepare(
        &self,
        input: DispatchInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<Prepared, Halted>> {
        if cancel.is_cancelled() {
            tracing::info!("Crawl cancelled before quota check");
            return Ok(Err(Halted::Cancelled));
        }

        let units = self.config.units_per_crawl;
        match self.quota.try_deduct(input.user_id, units).await? {
            QuotaDecision::Granted { remaining } => {
                tracing::debug!(remaining, units, "Crawl units deducted");
            }
            QuotaDecision::Insufficient { remaining } => {
                tracing::warn!(remaining, "Crawl quota exceeded");
                let job = self.reject_for_quota(&input).await?;
                return Ok(Err(Halted::QuotaExceeded(job)));
            }
        }

        let analysis = self.analyze(input.prompt, input.url).await;
        if cancel.is_cancelled() {
            tracing::info!("Crawl cancelled after quota deduction, refunding");
            self.refund(input.user_id).await;
            return Ok(Err(Halted::Cancelled));
        }

        let history = PromptHistory::new(input.user_id, input.prompt, &analysis);
        self.store.insert_prompt_history(&history).await?;

        let mut job = CrawlJob::queued(
            input.job_id,
            input.user_id,
            input.url,
            input.prompt,
            input.linkage,
        )
        .with_parent_prompt(history.id);
        if input.initial_status == JobStatus::InProgress {
            job.start(job.created_at)?;
        }
        self.store.insert_job(&job).await?;
        tracing::info!(job_id = %job.id, status = %job.status, "Crawl job created");

        Ok(Ok(Prepared {
            job,
            history,
            requires_navigation: analysis.requires_navigation || input.plan_navigation,
            max_pages: input.max_pages,
        }))
    }

    async fn analyze(&self, prompt: &str, url: &str) -> PromptAnalysis {
        match self.analyzer.analyze(prompt, url).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt analyzer failed, using keyword cues");
                KeywordPromptAnalyzer::new().analyze_sync(prompt)
            }
        }
    }

    /// Persist a job that failed on quota and announce it.
    async fn reject_for_quota(&self, input: &DispatchInput<'_>) -> Result<CrawlJob> {
        let mut job = CrawlJob::queued(
            input.job_id,
            input.user_id,
            input.url,
            input.prompt,
            input.linkage,
        );
        job.fail(OrchestratorError::QuotaExceeded.to_string(), chrono::Utc::now())?;
        self.store.insert_job(&job).await?;
        self.publish_best_effort(&CrawlJobEvent::crawler_failed(&job)).await;
        Ok(job)
    }

    /// Attach the best known strategy when navigation is needed.
    async fn resolve_strategy(
        &self,
        job: &mut CrawlJob,
        requires_navigation: bool,
    ) -> Result<Option<NavigationStrategy>> {
        if !requires_navigation {
            return Ok(None);
        }
        let strategy = strategy::find_best_strategy(&*self.store, job.primary_url()).await?;
        job.navigation_strategy_id = strategy.as_ref().map(|s| s.id);
        Ok(strategy)
    }

    async fn refund(&self, user_id: Uuid) {
        if let Err(e) = self.quota.refund(user_id, self.config.units_per_crawl).await {
            tracing::error!(error = %e, %user_id, "Failed to refund crawl units");
        }
    }

    async fn publish_best_effort(&self, event: &CrawlJobEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            tracing::error!(
                error = %e,
                job_id = %event.job_id(),
                kind = event.subject_suffix(),
                "Failed to publish crawl job event"
            );
        }
    }

    async fn update_history_best_effort(&self, history: &PromptHistory) {
        if let Err(e) = self.store.update_prompt_history(history).await {
            tracing::warn!(error = %e, prompt_id = %history.id, "Failed to update prompt history");
        }
    }
}

fn agent_request(
    job: &CrawlJob,
    strategy: Option<&NavigationStrategy>,
    max_pages: Option<u32>,
) -> AgentRequest {
    AgentRequest {
        url: job.primary_url().to_string(),
        prompt: job.prompt.clone(),
        navigation_steps: strategy.map(|s| s.steps.clone()),
        job_id: job.id,
        user_id: job.user_id,
        max_pages,
    }
}
