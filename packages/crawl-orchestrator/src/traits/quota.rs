use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Outcome of an atomic check-and-deduct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Units were deducted; `remaining` is the balance afterwards
    Granted { remaining: i64 },
    /// Balance too low, nothing deducted
    Insufficient { remaining: i64 },
}

/// Crawl-unit ledger.
///
/// Implementations must make `try_deduct` atomic so two concurrent requests
/// cannot both pass a check against the same remaining balance.
#[async_trait]
pub trait QuotaGate: Send + Sync {
    /// Check the balance and deduct `units` in one atomic step.
    async fn try_deduct(&self, user_id: Uuid, units: u32) -> Result<QuotaDecision>;

    /// Give units back after a deduction that bought no agent work.
    async fn refund(&self, user_id: Uuid, units: u32) -> Result<()>;
}
