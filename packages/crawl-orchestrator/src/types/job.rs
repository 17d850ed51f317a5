//! Crawl job model and its lifecycle state machine.
//!
//! `Queued → InProgress → {Completed | Failed}`. A job may also fail straight
//! from creation (quota, agent rejection). `Completed` and `Failed` are
//! absorbing: every transition method refuses to leave them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

pub type JobId = Uuid;

/// Crawler type recorded on every job dispatched by this orchestrator.
pub const INTELLIGENT_AGENT_CRAWLER: &str = "intelligent_agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(OrchestratorError::Config(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl JobPriority {
    /// Integer form for DB ordering (higher = more urgent)
    pub fn as_i16(&self) -> i16 {
        match self {
            JobPriority::Low => 0,
            JobPriority::Normal => 1,
            JobPriority::High => 2,
        }
    }

    pub fn from_i16(value: i16) -> Self {
        match value {
            i16::MIN..=0 => JobPriority::Low,
            1 => JobPriority::Normal,
            _ => JobPriority::High,
        }
    }
}

/// Whether the agent keeps a single browsing session or is driven step by step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Continuous,
    Stepped,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Continuous => "continuous",
            SessionType::Stepped => "stepped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "stepped" => SessionType::Stepped,
            _ => SessionType::Continuous,
        }
    }
}

/// Opaque foreign context carried through to events; never interpreted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobLinkage {
    pub assignment_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
}

impl JobLinkage {
    pub fn for_conversation(conversation_id: Uuid) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            ..Default::default()
        }
    }
}

/// A tracked unit of work for one crawl request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: JobId,
    pub user_id: Uuid,
    pub target_urls: Vec<String>,
    pub crawler_type: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub session_type: SessionType,
    pub parent_prompt_id: Option<Uuid>,
    pub navigation_strategy_id: Option<Uuid>,
    pub linkage: JobLinkage,
    pub prompt: String,
    pub conversation_name: Option<String>,
    pub result_count: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl CrawlJob {
    /// Create a job in `Queued`.
    pub fn queued(
        id: JobId,
        user_id: Uuid,
        url: impl Into<String>,
        prompt: impl Into<String>,
        linkage: JobLinkage,
    ) -> Self {
        Self {
            id,
            user_id,
            target_urls: vec![url.into()],
            crawler_type: INTELLIGENT_AGENT_CRAWLER.to_string(),
            status: JobStatus::Queued,
            priority: JobPriority::default(),
            session_type: SessionType::default(),
            parent_prompt_id: None,
            navigation_strategy_id: None,
            linkage,
            prompt: prompt.into(),
            conversation_name: None,
            result_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            error_message: None,
        }
    }

    /// Create a job that is already being worked on synchronously.
    pub fn in_progress(
        id: JobId,
        user_id: Uuid,
        url: impl Into<String>,
        prompt: impl Into<String>,
        linkage: JobLinkage,
    ) -> Self {
        let mut job = Self::queued(id, user_id, url, prompt, linkage);
        job.status = JobStatus::InProgress;
        job.started_at = Some(job.created_at);
        job
    }

    pub fn with_parent_prompt(mut self, prompt_id: Uuid) -> Self {
        self.parent_prompt_id = Some(prompt_id);
        self
    }

    /// First target URL (every job has at least one).
    pub fn primary_url(&self) -> &str {
        self.target_urls.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `Queued → InProgress`. Starting an in-progress job is a no-op.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            JobStatus::Queued => {
                self.status = JobStatus::InProgress;
                self.started_at = Some(now);
                Ok(())
            }
            JobStatus::InProgress => Ok(()),
            from => Err(self.invalid(from, JobStatus::InProgress)),
        }
    }

    /// Terminal success.
    pub fn complete(
        &mut self,
        result_count: usize,
        conversation_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.is_terminal() {
            return Err(self.invalid(self.status, JobStatus::Completed));
        }
        self.status = JobStatus::Completed;
        self.result_count = i32::try_from(result_count).unwrap_or(i32::MAX);
        if conversation_name.is_some() {
            self.conversation_name = conversation_name;
        }
        self.completed_at = Some(now);
        self.error_message = None;
        Ok(())
    }

    /// Terminal failure.
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        if self.is_terminal() {
            return Err(self.invalid(self.status, JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.failed_at = Some(now);
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Wall time from start (or creation) to the terminal timestamp.
    pub fn duration_ms(&self) -> Option<i64> {
        let end = self.completed_at.or(self.failed_at)?;
        let start = self.started_at.unwrap_or(self.created_at);
        Some((end - start).num_milliseconds().max(0))
    }

    fn invalid(&self, from: JobStatus, to: JobStatus) -> OrchestratorError {
        OrchestratorError::InvalidTransition {
            job_id: self.id,
            from,
            to,
        }
    }
}

/// Read-only projection returned by `get_job_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub result_count: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub conversation_name: Option<String>,
}

impl From<&CrawlJob> for JobResultView {
    fn from(job: &CrawlJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            result_count: job.result_count,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            failed_at: job.failed_at,
            duration_ms: job.duration_ms(),
            error_message: job.error_message.clone(),
            conversation_name: job.conversation_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> CrawlJob {
        CrawlJob::queued(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "https://shop.example/cat",
            "find running shoes",
            JobLinkage::default(),
        )
    }

    #[test]
    fn test_queued_to_completed() {
        let mut job = job();
        let now = Utc::now();
        job.start(now).unwrap();
        assert_eq!(job.status, JobStatus::InProgress);

        job.complete(5, Some("Running shoes".into()), now).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_count, 5);
        assert_eq!(job.completed_at, Some(now));
        assert!(job.failed_at.is_none());
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let mut job = job();
        let first = Utc::now();
        job.fail("boom", first).unwrap();

        let err = job.complete(1, None, Utc::now()).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        assert!(job.fail("again", Utc::now()).is_err());
        assert!(job.start(Utc::now()).is_err());

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failed_at, Some(first));
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_fail_directly_from_queued() {
        let mut job = job();
        job.fail("Quota exceeded", Utc::now()).unwrap();
        assert!(job.started_at.is_none());
        assert!(job.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::Queued,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("paused".parse::<JobStatus>().is_err());
    }
}
