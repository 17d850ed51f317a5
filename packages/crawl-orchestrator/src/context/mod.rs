//! Bounded retrieval context over a conversation's crawl history.
//!
//! Selection is pure and lives here; rendering is in [`render`], the
//! store/model wiring in [`ContextBuilder`].

mod builder;
pub mod render;

use uuid::Uuid;

use crate::types::{
    job::{CrawlJob, JobStatus},
    result::CrawlResult,
};

pub use builder::ContextBuilder;
pub use render::{JobContext, RenderedContext, SummaryPrompt};

/// Completed jobs of one conversation, most recent first, at most `cap`.
///
/// Jobs without a completion timestamp are skipped even when marked
/// `Completed`.
pub fn select_recent_completed(
    jobs: Vec<CrawlJob>,
    conversation_id: Uuid,
    cap: usize,
) -> Vec<CrawlJob> {
    let mut selected: Vec<CrawlJob> = jobs
        .into_iter()
        .filter(|job| {
            job.status == JobStatus::Completed
                && job.completed_at.is_some()
                && job.linkage.conversation_id == Some(conversation_id)
        })
        .collect();
    selected.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    selected.truncate(cap);
    selected
}

/// Results most recent first, at most `cap`. Rows captured together keep
/// their stored order.
pub fn select_recent_results(mut results: Vec<CrawlResult>, cap: usize) -> Vec<CrawlResult> {
    results.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
    results.truncate(cap);
    results
}

/// Strip a Markdown code fence (```json ... ```) around a model response.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::JobLinkage;
    use chrono::{Duration, Utc};

    fn completed(conversation: Uuid, minutes_ago: i64) -> CrawlJob {
        let mut job = CrawlJob::in_progress(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "https://shop.example",
            "p",
            JobLinkage::for_conversation(conversation),
        );
        job.complete(1, None, Utc::now() - Duration::minutes(minutes_ago))
            .unwrap();
        job
    }

    #[test]
    fn test_select_recent_completed_orders_and_caps() {
        let conversation = Uuid::new_v4();
        let old = completed(conversation, 30);
        let new = completed(conversation, 1);
        let other = completed(Uuid::new_v4(), 0);
        let mut failed = completed(conversation, 0);
        failed.status = JobStatus::Failed;

        let new_id = new.id;
        let selected = select_recent_completed(vec![old, other, failed, new], conversation, 1);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, new_id);
    }

    #[test]
    fn test_completed_without_timestamp_is_skipped() {
        let conversation = Uuid::new_v4();
        let mut job = completed(conversation, 0);
        job.completed_at = None;
        assert!(select_recent_completed(vec![job], conversation, 10).is_empty());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
