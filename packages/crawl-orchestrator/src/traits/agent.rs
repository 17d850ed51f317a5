//! Crawling agent contract.
//!
//! The agent is an external, stateful service that browses the target site.
//! It is driven two ways:
//! - `execute`: block until the crawl is done (interactive requests)
//! - `submit`: hand off and maybe get results inline (event-driven requests)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{job::JobId, strategy::NavigationStep};

/// What the agent is asked to crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub url: String,
    pub prompt: String,
    /// Known steps for this domain; `None` lets the agent plan navigation itself
    pub navigation_steps: Option<Vec<NavigationStep>>,
    pub job_id: JobId,
    pub user_id: Uuid,
    pub max_pages: Option<u32>,
}

/// Result of a finished crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentExecution {
    #[serde(default)]
    pub success: bool,
    /// One entry per extracted item
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    /// Steps the agent actually executed, when it navigated
    #[serde(default)]
    pub navigation_trace: Option<Vec<NavigationStep>>,
    #[serde(default)]
    pub conversation_name: Option<String>,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl AgentExecution {
    pub fn succeeded(items: Vec<serde_json::Value>) -> Self {
        Self {
            success: true,
            items,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_trace(mut self, steps: Vec<NavigationStep>) -> Self {
        self.navigation_trace = Some(steps);
        self
    }

    pub fn with_conversation_name(mut self, name: impl Into<String>) -> Self {
        self.conversation_name = Some(name.into());
        self
    }

    pub fn with_execution_time_ms(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    /// A usable outcome: reported success with at least one item.
    pub fn has_items(&self) -> bool {
        self.success && !self.items.is_empty()
    }

    /// Executed steps, if the agent navigated at all.
    pub fn executed_steps(&self) -> Option<&[NavigationStep]> {
        self.navigation_trace
            .as_deref()
            .filter(|steps| !steps.is_empty())
    }
}

/// Outcome of a non-blocking submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentSubmission {
    /// Queued by the agent; results arrive later on the completion channel
    Accepted,
    /// The agent finished within the submission call
    Completed { execution: AgentExecution },
    /// The agent declined (bad URL, unavailable, ...)
    Rejected { message: String },
}

#[async_trait]
pub trait CrawlAgentClient: Send + Sync {
    /// Run the crawl and wait for the result.
    async fn execute(&self, request: &AgentRequest) -> Result<AgentExecution>;

    /// Submit the crawl without blocking on it.
    async fn submit(&self, request: &AgentRequest) -> Result<AgentSubmission>;
}
