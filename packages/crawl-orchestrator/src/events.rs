//! Lifecycle events published by the orchestrator and the inbound events
//! that drive it.
//!
//! Outbound events are facts: they are only built from job state that has
//! already been persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::agent::AgentExecution;
use crate::types::job::{CrawlJob, JobId, JobLinkage, JobStatus};

/// Lifecycle notifications consumed by other services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlJobEvent {
    /// Background crawl accepted by the agent, job now in progress
    JobStarted {
        job_id: JobId,
        user_id: Uuid,
        linkage: JobLinkage,
        url: String,
        started_at: DateTime<Utc>,
    },

    /// Terminal state reached (success or failure)
    JobCompleted {
        job_id: JobId,
        user_id: Uuid,
        linkage: JobLinkage,
        status: JobStatus,
        result_count: i32,
        error_message: Option<String>,
        conversation_name: Option<String>,
        finished_at: DateTime<Utc>,
    },

    /// Early rejection before any agent work (quota exceeded)
    CrawlerFailed {
        job_id: JobId,
        user_id: Uuid,
        linkage: JobLinkage,
        message: String,
        url: String,
        failed_at: DateTime<Utc>,
    },
}

impl CrawlJobEvent {
    pub fn started(job: &CrawlJob) -> Self {
        CrawlJobEvent::JobStarted {
            job_id: job.id,
            user_id: job.user_id,
            linkage: job.linkage,
            url: job.primary_url().to_string(),
            started_at: job.started_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn completed(job: &CrawlJob) -> Self {
        CrawlJobEvent::JobCompleted {
            job_id: job.id,
            user_id: job.user_id,
            linkage: job.linkage,
            status: job.status,
            result_count: job.result_count,
            error_message: job.error_message.clone(),
            conversation_name: job.conversation_name.clone(),
            finished_at: job.completed_at.or(job.failed_at).unwrap_or_else(Utc::now),
        }
    }

    pub fn crawler_failed(job: &CrawlJob) -> Self {
        CrawlJobEvent::CrawlerFailed {
            job_id: job.id,
            user_id: job.user_id,
            linkage: job.linkage,
            message: job.error_message.clone().unwrap_or_default(),
            url: job.primary_url().to_string(),
            failed_at: job.failed_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            CrawlJobEvent::JobStarted { job_id, .. }
            | CrawlJobEvent::JobCompleted { job_id, .. }
            | CrawlJobEvent::CrawlerFailed { job_id, .. } => *job_id,
        }
    }

    /// Subject suffix for bus transports, e.g. `crawl.jobs.{suffix}`.
    pub fn subject_suffix(&self) -> &'static str {
        match self {
            CrawlJobEvent::JobStarted { .. } => "started",
            CrawlJobEvent::JobCompleted { .. } => "completed",
            CrawlJobEvent::CrawlerFailed { .. } => "failed",
        }
    }
}

/// Inbound crawl request from the message bus. The job id is assigned upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequestedEvent {
    pub job_id: JobId,
    pub conversation_id: Option<Uuid>,
    pub assignment_id: Option<Uuid>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    pub sender_id: Uuid,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub url: String,
    pub prompt: String,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default)]
    pub plan_navigation: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl CrawlRequestedEvent {
    pub fn linkage(&self) -> JobLinkage {
        JobLinkage {
            assignment_id: self.assignment_id,
            group_id: self.group_id,
            conversation_id: self.conversation_id,
        }
    }
}

/// Late result for a background crawl, delivered by the agent's completion channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCompletedEvent {
    pub job_id: JobId,
    pub execution: AgentExecution,
}
