//! NATS transport for crawl job events.
//!
//! Publishing goes through the [`NatsPublisher`] trait so the event sink can
//! run against a recording double in tests.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use crawl_orchestrator::{CrawlJobEvent, EventPublisher, OrchestratorError};

/// Inbound crawl requests.
pub const CRAWL_REQUESTS_SUBJECT: &str = "crawl.requests";
/// Late agent results for background crawls.
pub const AGENT_COMPLETED_SUBJECT: &str = "crawl.agent.completed";
/// Request/reply: answer a question over a conversation's crawls.
pub const CONVERSATION_ASK_SUBJECT: &str = "crawl.conversations.ask";
/// Request/reply: structured summary of a conversation's crawls.
pub const CONVERSATION_SUMMARY_SUBJECT: &str = "crawl.conversations.summary";
/// Queue group shared by all worker replicas.
pub const WORKER_QUEUE_GROUP: &str = "crawl-workers";

/// Outbound subject for a lifecycle event.
pub fn job_event_subject(event: &CrawlJobEvent) -> String {
    format!("crawl.jobs.{}", event.subject_suffix())
}

/// Trait for NATS publish operations.
#[async_trait]
pub trait NatsPublisher: Send + Sync {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()>;
}

/// Real NATS client publisher.
#[derive(Clone)]
pub struct NatsClientPublisher {
    client: async_nats::Client,
}

impl NatsClientPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NatsPublisher for NatsClientPublisher {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
        self.client.publish(subject, payload).await?;
        Ok(())
    }
}

/// Serializes lifecycle events to JSON on `crawl.jobs.{started|completed|failed}`.
pub struct NatsEventPublisher<P> {
    nats: P,
}

impl<P: NatsPublisher> NatsEventPublisher<P> {
    pub fn new(nats: P) -> Self {
        Self { nats }
    }
}

#[async_trait]
impl<P: NatsPublisher> EventPublisher for NatsEventPublisher<P> {
    async fn publish(&self, event: &CrawlJobEvent) -> crawl_orchestrator::Result<()> {
        let payload = serde_json::to_vec(event)?;
        let subject = job_event_subject(event);
        self.nats
            .publish(subject.clone(), Bytes::from(payload))
            .await
            .map_err(|e| OrchestratorError::Publish(e.into()))?;
        tracing::debug!(%subject, job_id = %event.job_id(), "Published crawl job event");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::RwLock;

    /// A published message.
    #[derive(Debug, Clone)]
    pub struct PublishedMessage {
        pub subject: String,
        pub payload: Bytes,
    }

    /// Recording publisher, optionally failing every call.
    #[derive(Default)]
    pub struct TestNats {
        published: RwLock<Vec<PublishedMessage>>,
        fail: bool,
    }

    impl TestNats {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn published_messages(&self) -> Vec<PublishedMessage> {
            self.published
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }
    }

    #[async_trait]
    impl NatsPublisher for TestNats {
        async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
            if self.fail {
                anyhow::bail!("nats connection closed");
            }
            self.published
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .push(PublishedMessage { subject, payload });
            Ok(())
        }
    }

    #[async_trait]
    impl NatsPublisher for std::sync::Arc<TestNats> {
        async fn publish(&self, subject: String, payload: Bytes) -> Result<()> {
            self.as_ref().publish(subject, payload).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TestNats;
    use super::*;
    use chrono::Utc;
    use crawl_orchestrator::{CrawlJob, JobLinkage};
    use std::sync::Arc;
    use uuid::Uuid;

    fn failed_job() -> CrawlJob {
        let mut job = CrawlJob::queued(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "https://shop.example",
            "list shoes",
            JobLinkage::default(),
        );
        job.fail("Quota exceeded: no crawl units remaining", Utc::now())
            .unwrap();
        job
    }

    #[tokio::test]
    async fn test_events_land_on_kind_subjects() {
        let nats = Arc::new(TestNats::default());
        let publisher = NatsEventPublisher::new(nats.clone());
        let job = failed_job();

        publisher
            .publish(&CrawlJobEvent::crawler_failed(&job))
            .await
            .unwrap();
        publisher
            .publish(&CrawlJobEvent::completed(&job))
            .await
            .unwrap();

        let messages = nats.published_messages();
        assert_eq!(messages[0].subject, "crawl.jobs.failed");
        assert_eq!(messages[1].subject, "crawl.jobs.completed");

        let body: serde_json::Value = serde_json::from_slice(&messages[1].payload).unwrap();
        assert_eq!(body["type"], "job_completed");
        assert_eq!(body["job_id"], job.id.to_string());
    }

    #[tokio::test]
    async fn test_transport_errors_map_to_publish() {
        let publisher = NatsEventPublisher::new(TestNats::failing());

        let err = publisher
            .publish(&CrawlJobEvent::completed(&failed_job()))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Publish(_)));
    }
}
