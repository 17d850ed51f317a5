use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobId;

/// Prompt type recorded for crawl requests.
pub const CRAWL_PROMPT_TYPE: &str = "crawl_request";

/// Structured intent returned by a `PromptAnalyzer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PromptAnalysis {
    pub intent: String,
    #[serde(default)]
    pub entities: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub requires_navigation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_description: Option<String>,
}

impl PromptAnalysis {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            ..Default::default()
        }
    }

    pub fn with_navigation(mut self, requires_navigation: bool) -> Self {
        self.requires_navigation = requires_navigation;
        self
    }
}

/// Audit row capturing intent before a job exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub prompt_type: String,
    pub processed_at: DateTime<Utc>,
    pub analysis: serde_json::Value,
    pub crawl_job_id: Option<JobId>,
    pub processing_ms: Option<i64>,
}

impl PromptHistory {
    pub fn new(user_id: Uuid, prompt: impl Into<String>, analysis: &PromptAnalysis) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            prompt: prompt.into(),
            prompt_type: CRAWL_PROMPT_TYPE.to_string(),
            processed_at: Utc::now(),
            analysis: serde_json::to_value(analysis).unwrap_or(serde_json::Value::Null),
            crawl_job_id: None,
            processing_ms: None,
        }
    }

    /// Link the concluded job and record how long the request took.
    pub fn conclude(&mut self, job_id: JobId, processing_ms: i64) {
        self.crawl_job_id = Some(job_id);
        self.processing_ms = Some(processing_ms);
    }
}
