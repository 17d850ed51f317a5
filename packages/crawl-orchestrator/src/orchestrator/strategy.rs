//! Navigation strategy selection and learning.
//!
//! Strategies are advisory: a stale counter or a lost update only affects
//! which steps get suggested next time, never job correctness.

use url::Url;

use crate::error::{OrchestratorError, Result};
use crate::traits::store::StrategyStore;
use crate::types::{
    job::JobId,
    strategy::{NavigationStep, NavigationStrategy},
};

/// Lowercased host of `url`, without a leading `www.`.
pub fn domain_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|_| OrchestratorError::InvalidUrl {
        url: url.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| OrchestratorError::InvalidUrl {
        url: url.to_string(),
    })?;
    let host = host.to_lowercase();
    Ok(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Pattern recorded on learned strategies: scheme + host wildcard.
pub fn url_pattern_for(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => format!("{}://{}/*", parsed.scheme(), host),
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

/// Highest success rate wins; on a tie the first candidate found is kept.
pub fn select_best_strategy(candidates: Vec<NavigationStrategy>) -> Option<NavigationStrategy> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if current.success_rate() >= candidate.success_rate() => Some(current),
        _ => Some(candidate),
    })
}

/// Look up the best active strategy for the URL's domain.
pub async fn find_best_strategy<S>(store: &S, url: &str) -> Result<Option<NavigationStrategy>>
where
    S: StrategyStore + ?Sized,
{
    let domain = domain_of(url)?;
    let candidates = store.find_active_strategies(&domain).await?;
    let count = candidates.len();
    let best = select_best_strategy(candidates);

    if let Some(strategy) = &best {
        tracing::debug!(
            domain = %domain,
            candidates = count,
            strategy_id = %strategy.id,
            success_rate = strategy.success_rate(),
            "Selected navigation strategy"
        );
    }
    Ok(best)
}

/// What happened to the strategy after a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyUpdate {
    Reused(NavigationStrategy),
    Learned(NavigationStrategy),
    FailureRecorded(NavigationStrategy),
    Unchanged,
}

/// Fold a finished run into strategy statistics.
///
/// - reused strategy + success: bump counters and the rolling average
/// - reused strategy + failure: count the failure
/// - no strategy + executed steps + success: learn a new strategy
pub async fn record_run<S>(
    store: &S,
    used: Option<NavigationStrategy>,
    url: &str,
    executed_steps: Option<&[NavigationStep]>,
    succeeded: bool,
    execution_ms: f64,
    job_id: JobId,
) -> Result<StrategyUpdate>
where
    S: StrategyStore + ?Sized,
{
    match (used, succeeded) {
        (Some(mut strategy), true) => {
            strategy.record_success(execution_ms);
            store.update_strategy(&strategy).await?;
            tracing::info!(
                strategy_id = %strategy.id,
                times_used = strategy.times_used,
                avg_execution_ms = strategy.avg_execution_ms,
                "Navigation strategy reused"
            );
            Ok(StrategyUpdate::Reused(strategy))
        }
        (Some(mut strategy), false) => {
            strategy.record_failure();
            store.update_strategy(&strategy).await?;
            Ok(StrategyUpdate::FailureRecorded(strategy))
        }
        (None, true) => match executed_steps {
            Some(steps) if !steps.is_empty() => {
                let strategy = NavigationStrategy::learned(
                    domain_of(url)?,
                    url_pattern_for(url),
                    steps.to_vec(),
                    execution_ms,
                    job_id,
                );
                store.insert_strategy(&strategy).await?;
                tracing::info!(
                    strategy_id = %strategy.id,
                    domain = %strategy.domain,
                    steps = strategy.steps.len(),
                    "Learned new navigation strategy"
                );
                Ok(StrategyUpdate::Learned(strategy))
            }
            _ => Ok(StrategyUpdate::Unchanged),
        },
        (None, false) => Ok(StrategyUpdate::Unchanged),
    }
}
