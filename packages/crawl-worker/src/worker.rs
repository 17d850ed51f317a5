//! NATS consumer loop.
//!
//! Every inbound message is handled on its own tracked tokio task. Crawl
//! requests and agent completions are fire-and-forget; conversation questions
//! and summary requests are answered on the message's reply subject. On
//! shutdown the loop stops consuming and waits for in-flight tasks, so a
//! cancelled crawl still gets to mark its job failed.

use anyhow::{Context, Result};
use bytes::Bytes;
use crawl_orchestrator::{
    AgentCompletedEvent, ContextBuilder, ConversationSummary, CrawlRequestedEvent, JobOrchestrator,
    OrchestratorError, SubmissionOutcome,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::nats::{
    AGENT_COMPLETED_SUBJECT, CONVERSATION_ASK_SUBJECT, CONVERSATION_SUMMARY_SUBJECT,
    CRAWL_REQUESTS_SUBJECT, WORKER_QUEUE_GROUP,
};

/// Question about a conversation's crawled data.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub conversation_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub uploaded_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AskReply {
    pub answer: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub conversation_id: Uuid,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReply {
    pub summary: Option<ConversationSummary>,
    pub error: Option<String>,
}

/// Shared handles for message handlers.
#[derive(Clone)]
pub struct Worker {
    client: async_nats::Client,
    orchestrator: Arc<JobOrchestrator>,
    context: Arc<ContextBuilder>,
    tasks: TaskTracker,
}

impl Worker {
    pub fn new(
        client: async_nats::Client,
        orchestrator: Arc<JobOrchestrator>,
        context: Arc<ContextBuilder>,
    ) -> Self {
        Self {
            client,
            orchestrator,
            context,
            tasks: TaskTracker::new(),
        }
    }

    /// Consume until `shutdown` fires or every subscription closes, then wait
    /// for in-flight handlers.
    ///
    /// In-flight crawls get a child token, so shutdown also cancels them.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut requests = self.subscribe(CRAWL_REQUESTS_SUBJECT).await?;
        let mut completions = self.subscribe(AGENT_COMPLETED_SUBJECT).await?;
        let mut questions = self.subscribe(CONVERSATION_ASK_SUBJECT).await?;
        let mut summaries = self.subscribe(CONVERSATION_SUMMARY_SUBJECT).await?;
        tracing::info!(queue_group = WORKER_QUEUE_GROUP, "Crawl worker consuming");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping consumers");
                    break;
                }
                Some(message) = requests.next() => {
                    spawn_crawl_request(
                        &self.tasks,
                        self.orchestrator.clone(),
                        message.payload,
                        shutdown.child_token(),
                    );
                }
                Some(message) = completions.next() => {
                    let orchestrator = self.orchestrator.clone();
                    self.tasks.spawn(async move {
                        handle_agent_completed(&orchestrator, &message.payload).await;
                    });
                }
                Some(message) = questions.next() => {
                    let worker = self.clone();
                    self.tasks.spawn(async move {
                        let reply = handle_ask(&worker.context, &message.payload).await;
                        worker.respond(message.reply, &reply).await;
                    });
                }
                Some(message) = summaries.next() => {
                    let worker = self.clone();
                    self.tasks.spawn(async move {
                        let reply = handle_summary(&worker.context, &message.payload).await;
                        worker.respond(message.reply, &reply).await;
                    });
                }
                else => {
                    tracing::warn!("All subscriptions closed");
                    break;
                }
            }
        }

        drop((requests, completions, questions, summaries));
        drain(&self.tasks).await;
        Ok(())
    }

    async fn subscribe(&self, subject: &'static str) -> Result<async_nats::Subscriber> {
        self.client
            .queue_subscribe(subject, WORKER_QUEUE_GROUP.to_string())
            .await
            .with_context(|| format!("Failed to subscribe to {subject}"))
    }

    async fn respond<T: Serialize>(&self, reply: Option<async_nats::Subject>, body: &T) {
        let Some(reply) = reply else {
            tracing::warn!("Request without reply subject, dropping response");
            return;
        };
        let payload = match serde_json::to_vec(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize reply");
                return;
            }
        };
        if let Err(e) = self.client.publish(reply, Bytes::from(payload)).await {
            tracing::error!(error = %e, "Failed to publish reply");
        }
    }
}

/// Run a crawl request on `tasks`, cancelled through `cancel`.
pub fn spawn_crawl_request(
    tasks: &TaskTracker,
    orchestrator: Arc<JobOrchestrator>,
    payload: Bytes,
    cancel: CancellationToken,
) {
    tasks.spawn(async move {
        handle_crawl_request(&orchestrator, &payload, &cancel).await;
    });
}

/// Stop accepting tasks and wait for the ones already running.
pub async fn drain(tasks: &TaskTracker) {
    tasks.close();
    if !tasks.is_empty() {
        tracing::info!(in_flight = tasks.len(), "Waiting for in-flight handlers");
    }
    tasks.wait().await;
}

/// Run one inbound crawl request. Malformed payloads are logged and dropped.
pub async fn handle_crawl_request(
    orchestrator: &JobOrchestrator,
    payload: &[u8],
    cancel: &CancellationToken,
) -> Option<SubmissionOutcome> {
    let event: CrawlRequestedEvent = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed crawl request");
            return None;
        }
    };

    let outcome = orchestrator
        .execute_intelligent_crawl_from_event(event, cancel)
        .await;
    match &outcome {
        SubmissionOutcome::Failed { job_id, message } => {
            tracing::error!(job_id = ?job_id, %message, "Crawl request failed")
        }
        other => tracing::info!(outcome = ?other, "Crawl request handled"),
    }
    Some(outcome)
}

/// Finalize a background crawl from the agent's completion message.
pub async fn handle_agent_completed(orchestrator: &JobOrchestrator, payload: &[u8]) {
    let event: AgentCompletedEvent = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed agent completion");
            return;
        }
    };

    let job_id = event.job_id;
    match orchestrator
        .finalize_from_external_result(job_id, event.execution)
        .await
    {
        Ok(outcome) => tracing::info!(%job_id, success = outcome.success, items = outcome.item_count, "Background crawl finalized"),
        Err(e @ OrchestratorError::InvalidTransition { .. }) => {
            tracing::warn!(%job_id, error = %e, "Duplicate or late agent completion ignored")
        }
        Err(e) => tracing::error!(%job_id, error = %e, "Failed to finalize background crawl"),
    }
}

pub async fn handle_ask(context: &ContextBuilder, payload: &[u8]) -> AskReply {
    let request: AskRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            return AskReply {
                answer: None,
                error: Some(format!("invalid request: {e}")),
            }
        }
    };

    match context
        .process_user_message(
            request.conversation_id,
            &request.message,
            request.uploaded_data.as_deref(),
        )
        .await
    {
        Ok(answer) => AskReply { answer, error: None },
        Err(e) => {
            tracing::error!(conversation_id = %request.conversation_id, error = %e, "Q&A failed");
            AskReply {
                answer: None,
                error: Some(e.to_string()),
            }
        }
    }
}

pub async fn handle_summary(context: &ContextBuilder, payload: &[u8]) -> SummaryReply {
    let request: SummaryRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            return SummaryReply {
                summary: None,
                error: Some(format!("invalid request: {e}")),
            }
        }
    };

    match context
        .get_conversation_summary(request.conversation_id, &request.prompt)
        .await
    {
        Ok(summary) => SummaryReply {
            summary,
            error: None,
        },
        Err(e) => {
            tracing::error!(conversation_id = %request.conversation_id, error = %e, "Summary failed");
            SummaryReply {
                summary: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawl_orchestrator::testing::{
        MemoryQuota, MockAgent, MockAnalyzer, MockLanguageModel, TestHarness,
    };
    use crawl_orchestrator::{AgentExecution, JobStatus, JobStore, MemoryStore};
    use serde_json::json;
    use std::time::Duration;

    fn crawl_request(user: Uuid, job_id: Uuid) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "jobId": job_id,
            "conversationId": null,
            "assignmentId": null,
            "senderId": user,
            "url": "https://shop.example/running",
            "prompt": "list running shoes",
            "timestamp": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_crawl_request_then_agent_completion() {
        let user = Uuid::new_v4();
        let job_id = Uuid::new_v4();
        let harness = TestHarness::new(
            MemoryQuota::new().with_balance(user, 1),
            MockAgent::new(),
            MockAnalyzer::single_page(),
        );
        let orchestrator = harness.orchestrator();

        let outcome =
            handle_crawl_request(&orchestrator, &crawl_request(user, job_id), &CancellationToken::new())
                .await;
        assert_eq!(outcome, Some(SubmissionOutcome::Started { job_id }));

        let completion = serde_json::to_vec(&AgentCompletedEvent {
            job_id,
            execution: AgentExecution::succeeded(vec![json!({"name": "Pegasus 40"})]),
        })
        .unwrap();
        handle_agent_completed(&orchestrator, &completion).await;
        // A second delivery is ignored
        handle_agent_completed(&orchestrator, &completion).await;

        let job = harness.store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_count, 1);
        assert_eq!(harness.publisher.kinds(), vec!["started", "completed"]);
    }

    #[tokio::test]
    async fn test_drain_waits_for_cancelled_crawl_to_fail_its_job() {
        let user = Uuid::new_v4();
        let job_id = Uuid::new_v4();
        let harness = TestHarness::new(
            MemoryQuota::new().with_balance(user, 1),
            MockAgent::new().with_delay(Duration::from_secs(30)),
            MockAnalyzer::single_page(),
        );
        let orchestrator = Arc::new(harness.orchestrator());
        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();

        spawn_crawl_request(
            &tasks,
            orchestrator,
            Bytes::from(crawl_request(user, job_id)),
            shutdown.child_token(),
        );
        while harness.agent.call_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), drain(&tasks))
            .await
            .expect("drain should finish once the crawl observes cancellation");

        assert!(tasks.is_empty());
        let job = harness.store.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("Crawl cancelled"));
    }

    #[tokio::test]
    async fn test_malformed_crawl_request_is_dropped() {
        let harness = TestHarness::new(MemoryQuota::new(), MockAgent::new(), MockAnalyzer::single_page());

        let outcome = handle_crawl_request(
            &harness.orchestrator(),
            br#"{"url": "https://shop.example"}"#,
            &CancellationToken::new(),
        )
        .await;

        assert!(outcome.is_none());
        assert_eq!(harness.store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_ask_without_history_replies_empty() {
        let context = ContextBuilder::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockLanguageModel::new()),
        );
        let payload = serde_json::to_vec(&json!({
            "conversationId": Uuid::new_v4(),
            "message": "what is cheapest?"
        }))
        .unwrap();

        let reply = handle_ask(&context, &payload).await;
        assert!(reply.answer.is_none());
        assert!(reply.error.is_none());

        let bad = handle_ask(&context, b"not json").await;
        assert!(bad.error.unwrap().starts_with("invalid request"));
    }

    #[tokio::test]
    async fn test_summary_reply_serializes_camel_case() {
        let context = ContextBuilder::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockLanguageModel::new()),
        );
        let payload = serde_json::to_vec(&json!({
            "conversationId": Uuid::new_v4(),
            "prompt": "summarize"
        }))
        .unwrap();

        let reply = handle_summary(&context, &payload).await;
        let value = serde_json::to_value(&reply).unwrap();
        assert!(value["summary"].is_null());
        assert!(value["error"].is_null());
    }
}
