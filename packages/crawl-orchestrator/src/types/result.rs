use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobId;

/// One extracted item persisted for a job. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub id: Uuid,
    pub job_id: JobId,
    pub source_url: String,
    pub content: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
    pub prompt: String,
    pub success: bool,
    pub captured_at: DateTime<Utc>,
}

impl CrawlResult {
    /// Build a result row from one agent-extracted item.
    pub fn from_item(
        job_id: JobId,
        source_url: impl Into<String>,
        prompt: impl Into<String>,
        item: serde_json::Value,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_id,
            source_url: source_url.into(),
            content: None,
            extracted_data: Some(item),
            prompt: prompt.into(),
            success: true,
            captured_at,
        }
    }

    /// Structured payload, falling back to parsing raw content as JSON.
    pub fn payload(&self) -> Option<serde_json::Value> {
        if let Some(data) = &self.extracted_data {
            return Some(data.clone());
        }
        let content = self.content.as_deref()?;
        serde_json::from_str(content)
            .ok()
            .or_else(|| Some(serde_json::Value::String(content.to_string())))
    }
}
