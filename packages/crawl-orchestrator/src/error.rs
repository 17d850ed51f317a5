//! Typed errors for the orchestration library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match on
//! the failure taxonomy: quota, agent rejection, empty results, and
//! infrastructure faults.

use thiserror::Error;
use uuid::Uuid;

use crate::types::job::JobStatus;

/// Errors that can occur while orchestrating crawl jobs or building context.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The user has no crawl units left
    #[error("Quota exceeded: no crawl units remaining")]
    QuotaExceeded,

    /// The crawling agent declined the submission
    #[error("agent rejected submission: {message}")]
    AgentRejected { message: String },

    /// The agent reported success but produced no items
    #[error("Crawler returned no results")]
    AgentReturnedEmpty,

    /// Transport or protocol failure talking to the crawling agent
    #[error("agent error: {0}")]
    Agent(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Quota ledger operation failed (not the same as insufficient balance)
    #[error("quota ledger error: {0}")]
    Quota(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Event publishing failed
    #[error("publish error: {0}")]
    Publish(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Language model call failed
    #[error("language model error: {0}")]
    LanguageModel(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Product search provider failed
    #[error("search error: {0}")]
    Search(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Job not found in store
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: Uuid },

    /// Attempted to move a job out of a terminal state
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    /// URL could not be parsed or has no host
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Operation was cancelled
    #[error("Crawl cancelled")]
    Cancelled,

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl OrchestratorError {
    /// Wrap any error as a storage failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }

    /// Wrap any error as an agent transport failure.
    pub fn agent(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Agent(Box::new(err))
    }

    /// Wrap any error as a publish failure.
    pub fn publish(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Publish(Box::new(err))
    }

    /// Wrap any error as a language model failure.
    pub fn language_model(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::LanguageModel(Box::new(err))
    }

    /// Wrap any error as a search failure.
    pub fn search(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Search(Box::new(err))
    }

    /// Wrap any error as a quota ledger failure.
    pub fn quota(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Quota(Box::new(err))
    }
}

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
