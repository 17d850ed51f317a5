//! Text rendering of selected crawl history.

use serde_json::{json, Value};

use crate::types::{job::CrawlJob, result::CrawlResult};

/// Instructions for the summarization prompt. The model must answer with
/// JSON matching [`crate::types::summary::ConversationSummary`].
pub const SUMMARY_INSTRUCTIONS: &str = "You analyze web crawl results for a user. \
Respond with STRICT JSON only, no prose and no code fences, shaped as:\n\
{\"summary\": string, \"insights\": [string], \"charts\": [{\"type\": \"bar\"|\"line\"|\"pie\"|\"table\", \"title\": string, \"data\": object}]}\n\
Base every number on the data below. Omit charts when the data has no numeric fields.";

/// System prompt for summarization; the instructions travel in the budgeted
/// user prompt.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You summarize crawled web data as structured JSON.";

/// System prompt for conversational Q&A.
pub const QA_SYSTEM_PROMPT: &str = "You answer questions about data crawled from websites. \
Each item carries a `_source` object naming the crawl job, URL and request it came from; \
use it when comparing sources. Trust the item counts in the headers and the total line. \
If the data does not contain the answer, say so.";

/// One selected job and the results included for it.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job: CrawlJob,
    pub results: Vec<CrawlResult>,
}

/// Rendered Q&A context.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContext {
    pub text: String,
    pub job_count: usize,
    /// Equals the number printed in the footer
    pub item_count: usize,
}

/// Result payload with `_source` metadata so cross-source questions stay
/// answerable. Non-object payloads are wrapped under `value`.
pub fn tagged_payload(job: &CrawlJob, result: &CrawlResult) -> Value {
    let source = json!({
        "job_id": job.id,
        "url": result.source_url,
        "prompt": job.prompt,
    });
    match result.payload() {
        Some(Value::Object(mut obj)) => {
            obj.insert("_source".to_string(), source);
            Value::Object(obj)
        }
        Some(other) => json!({ "value": other, "_source": source }),
        None => json!({ "value": Value::Null, "_source": source }),
    }
}

fn job_header(index: usize, job: &CrawlJob, item_count: usize) -> String {
    format!(
        "### Source {}: \"{}\" | URL: {} | Items: {}\n",
        index + 1,
        job.prompt,
        job.primary_url(),
        item_count
    )
}

fn footer(total: usize) -> String {
    format!("Total items across all sources: {total}\n")
}

/// Q&A context: header per job, one tagged JSON line per item, total footer.
pub fn render_qa_context(jobs: &[JobContext]) -> RenderedContext {
    let mut text = String::new();
    let mut total = 0;

    for (index, ctx) in jobs.iter().enumerate() {
        text.push_str(&job_header(index, &ctx.job, ctx.results.len()));
        for result in &ctx.results {
            text.push_str(&tagged_payload(&ctx.job, result).to_string());
            text.push('\n');
        }
        text.push('\n');
        total += ctx.results.len();
    }
    text.push_str(&footer(total));

    RenderedContext {
        text,
        job_count: jobs.len(),
        item_count: total,
    }
}

/// Uploaded tabular data as its own labeled section.
pub fn render_uploaded_section(data: &str) -> String {
    format!("=== Uploaded data ===\n{}\n", data.trim())
}

/// Appends pieces until the character ceiling would be crossed, then
/// refuses everything after.
struct CharBudget {
    out: String,
    used: usize,
    limit: usize,
    exhausted: bool,
}

impl CharBudget {
    fn new(limit: usize) -> Self {
        Self {
            out: String::new(),
            used: 0,
            limit,
            exhausted: false,
        }
    }

    fn push(&mut self, piece: &str) -> bool {
        if self.exhausted {
            return false;
        }
        let len = piece.chars().count();
        if self.used + len > self.limit {
            self.exhausted = true;
            return false;
        }
        self.out.push_str(piece);
        self.used += len;
        true
    }

    /// Like `push` but keeps the prefix that fits.
    fn push_truncated(&mut self, piece: &str) {
        if !self.push(piece) {
            let room = self.limit - self.used;
            let prefix: String = piece.chars().take(room).collect();
            self.out.push_str(&prefix);
            self.used += room;
            self.exhausted = true;
        }
    }
}

/// Summarization prompt built one job at a time, never longer than its
/// character budget.
///
/// Jobs and items are appended in order until the next piece would not fit;
/// everything after that is refused, so callers can stop loading jobs once
/// [`SummaryPrompt::is_full`] turns true.
pub struct SummaryPrompt {
    budget: CharBudget,
    jobs: usize,
}

impl SummaryPrompt {
    pub fn new(user_prompt: &str, char_budget: usize) -> Self {
        let mut budget = CharBudget::new(char_budget);
        budget.push_truncated(&format!(
            "{SUMMARY_INSTRUCTIONS}\n\nUser request: {}\n\n",
            user_prompt.trim()
        ));
        Self { budget, jobs: 0 }
    }

    pub fn is_full(&self) -> bool {
        self.budget.exhausted
    }

    /// Jobs whose header made it into the prompt.
    pub fn job_count(&self) -> usize {
        self.jobs
    }

    /// Append one job; false once the budget is spent.
    pub fn push_job(&mut self, ctx: &JobContext) -> bool {
        if !self.budget.push(&job_header(self.jobs, &ctx.job, ctx.results.len())) {
            return false;
        }
        self.jobs += 1;
        for result in &ctx.results {
            let line = format!("{}\n", tagged_payload(&ctx.job, result));
            if !self.budget.push(&line) {
                return false;
            }
        }
        self.budget.push("\n")
    }

    pub fn finish(self) -> String {
        self.budget.out
    }
}

/// Render a whole summarization prompt from already loaded jobs.
pub fn render_summary_prompt(user_prompt: &str, jobs: &[JobContext], char_budget: usize) -> String {
    let mut prompt = SummaryPrompt::new(user_prompt, char_budget);
    for ctx in jobs {
        if !prompt.push_job(ctx) {
            break;
        }
    }
    prompt.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::JobLinkage;
    use chrono::Utc;
    use uuid::Uuid;

    fn job_with_items(n: usize) -> JobContext {
        let job = CrawlJob::in_progress(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "https://shop.example/cat",
            "find running shoes",
            JobLinkage::default(),
        );
        let results = (0..n)
            .map(|i| {
                CrawlResult::from_item(
                    job.id,
                    "https://shop.example/cat",
                    "find running shoes",
                    json!({"name": format!("Shoe {i}"), "price": 100 + i}),
                    Utc::now(),
                )
            })
            .collect();
        JobContext { job, results }
    }

    #[test]
    fn test_qa_footer_matches_items() {
        let jobs = vec![job_with_items(3), job_with_items(2)];
        let rendered = render_qa_context(&jobs);
        assert_eq!(rendered.item_count, 5);
        assert!(rendered.text.contains("Items: 3"));
        assert!(rendered.text.contains("Total items across all sources: 5"));
        assert_eq!(rendered.text.matches("\"_source\"").count(), 5);
    }

    #[test]
    fn test_non_object_payload_is_wrapped() {
        let ctx = job_with_items(0);
        let mut result = CrawlResult::from_item(ctx.job.id, "u", "p", json!("text"), Utc::now());
        result.extracted_data = Some(json!("plain text"));
        let tagged = tagged_payload(&ctx.job, &result);
        assert_eq!(tagged["value"], "plain text");
        assert_eq!(tagged["_source"]["url"], "u");
    }

    #[test]
    fn test_summary_prompt_respects_ceiling() {
        let jobs = vec![job_with_items(200), job_with_items(200)];
        let prompt = render_summary_prompt("summarize", &jobs, 5_000);
        assert!(prompt.chars().count() <= 5_000);
        assert!(prompt.starts_with(SUMMARY_INSTRUCTIONS));
        assert!(prompt.contains("Source 1"));
        assert!(!prompt.contains("Source 2"));
    }

    #[test]
    fn test_tiny_budget_truncates_preamble() {
        let prompt = render_summary_prompt("summarize", &[job_with_items(1)], 10);
        assert_eq!(prompt.chars().count(), 10);
    }
}
