use async_trait::async_trait;

use crate::error::Result;
use crate::events::CrawlJobEvent;

/// Sink for lifecycle events. The orchestrator decides payload and timing.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &CrawlJobEvent) -> Result<()>;
}
