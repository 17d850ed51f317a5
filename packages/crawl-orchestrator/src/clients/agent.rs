//! Crawling agent over JSON/HTTP.
//!
//! - `POST {base}/crawl` runs a crawl and returns an `AgentExecution`
//! - `POST {base}/crawl/submit` returns an `AgentSubmission`
//!
//! A 4xx on submit is the agent declining the job and maps to
//! `AgentSubmission::Rejected`; everything else non-2xx is a transport error.

use async_trait::async_trait;
use std::time::Duration;

use super::check_status;
use crate::error::{OrchestratorError, Result};
use crate::traits::agent::{AgentExecution, AgentRequest, AgentSubmission, CrawlAgentClient};

pub struct HttpCrawlAgent {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCrawlAgent {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client with a request timeout. Blocking crawls can take minutes.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OrchestratorError::agent)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl CrawlAgentClient for HttpCrawlAgent {
    async fn execute(&self, request: &AgentRequest) -> Result<AgentExecution> {
        tracing::debug!(job_id = %request.job_id, url = %request.url, "Executing crawl on agent");
        let response = self
            .client
            .post(self.url("/crawl"))
            .json(request)
            .send()
            .await
            .map_err(OrchestratorError::agent)?;
        let response = check_status("crawl agent", response)
            .await
            .map_err(OrchestratorError::agent)?;
        response.json().await.map_err(OrchestratorError::agent)
    }

    async fn submit(&self, request: &AgentRequest) -> Result<AgentSubmission> {
        tracing::debug!(job_id = %request.job_id, url = %request.url, "Submitting crawl to agent");
        let response = self
            .client
            .post(self.url("/crawl/submit"))
            .json(request)
            .send()
            .await
            .map_err(OrchestratorError::agent)?;

        let status = response.status();
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            let message = if message.trim().is_empty() {
                format!("agent declined the crawl (HTTP {status})")
            } else {
                message
            };
            return Ok(AgentSubmission::Rejected { message });
        }

        let response = check_status("crawl agent", response)
            .await
            .map_err(OrchestratorError::agent)?;
        response.json().await.map_err(OrchestratorError::agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let agent = HttpCrawlAgent::new("http://agent:8080/");
        assert_eq!(agent.url("/crawl"), "http://agent:8080/crawl");
    }

    #[test]
    fn test_submission_wire_format() {
        let accepted: AgentSubmission =
            serde_json::from_value(serde_json::json!({"status": "accepted"})).unwrap();
        assert_eq!(accepted, AgentSubmission::Accepted);

        let completed: AgentSubmission = serde_json::from_value(serde_json::json!({
            "status": "completed",
            "execution": {"success": true, "items": [{"name": "a"}], "executionTimeMs": 900}
        }))
        .unwrap();
        match completed {
            AgentSubmission::Completed { execution } => {
                assert!(execution.has_items());
                assert_eq!(execution.execution_time_ms, 900);
            }
            other => panic!("unexpected submission: {other:?}"),
        }
    }
}
