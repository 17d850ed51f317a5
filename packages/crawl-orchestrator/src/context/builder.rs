use std::sync::Arc;
use uuid::Uuid;

use super::render::{
    render_qa_context, render_uploaded_section, JobContext, SummaryPrompt, QA_SYSTEM_PROMPT,
    SUMMARY_SYSTEM_PROMPT,
};
use super::{select_recent_completed, select_recent_results, strip_code_fence};
use crate::error::Result;
use crate::similarity::{self, ProductSimilarityEnricher};
use crate::traits::{llm::LanguageModel, store::CrawlStore};
use crate::types::{config::ContextLimits, summary::ConversationSummary};

/// Answers questions about, and summarizes, a conversation's crawl history.
pub struct ContextBuilder {
    store: Arc<dyn CrawlStore>,
    model: Arc<dyn LanguageModel>,
    enricher: Option<ProductSimilarityEnricher>,
    limits: ContextLimits,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn CrawlStore>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            store,
            model,
            enricher: None,
            limits: ContextLimits::default(),
        }
    }

    /// Enable similar-product enrichment for Q&A.
    pub fn with_enricher(mut self, enricher: ProductSimilarityEnricher) -> Self {
        self.enricher = Some(enricher.with_limits(&self.limits));
        self
    }

    pub fn with_limits(mut self, limits: ContextLimits) -> Self {
        self.enricher = self.enricher.map(|e| e.with_limits(&limits));
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ContextLimits {
        &self.limits
    }

    /// Load completed jobs and their results under the given caps.
    async fn load(
        &self,
        conversation_id: Uuid,
        max_jobs: usize,
        max_items_per_job: usize,
    ) -> Result<Vec<JobContext>> {
        let jobs = self.store.list_jobs_for_conversation(conversation_id).await?;
        let selected = select_recent_completed(jobs, conversation_id, max_jobs);

        let mut contexts = Vec::with_capacity(selected.len());
        for job in selected {
            let results = self.store.list_results_for_job(job.id).await?;
            let results = select_recent_results(results, max_items_per_job);
            contexts.push(JobContext { job, results });
        }
        Ok(contexts)
    }

    /// Answer a free-text question about the conversation's crawls.
    ///
    /// Returns `None` without calling the model when there is neither crawl
    /// history nor uploaded data.
    #[tracing::instrument(skip(self, message, uploaded_data), fields(has_upload = uploaded_data.is_some()))]
    pub async fn process_user_message(
        &self,
        conversation_id: Uuid,
        message: &str,
        uploaded_data: Option<&str>,
    ) -> Result<Option<String>> {
        let uploaded = uploaded_data.filter(|d| !d.trim().is_empty());
        let jobs = self
            .load(
                conversation_id,
                self.limits.max_jobs,
                self.limits.max_items_per_job,
            )
            .await?;

        if jobs.is_empty() && uploaded.is_none() {
            tracing::debug!("No crawl history or uploaded data, skipping model call");
            return Ok(None);
        }

        let mut context = String::new();
        if !jobs.is_empty() {
            let rendered = render_qa_context(&jobs);
            tracing::debug!(
                jobs = rendered.job_count,
                items = rendered.item_count,
                "Rendered Q&A context"
            );
            context.push_str(&rendered.text);
        }
        if let Some(data) = uploaded {
            context.push('\n');
            context.push_str(&render_uploaded_section(data));
        }

        if let Some(enricher) = &self.enricher {
            if similarity::detect_similarity_intent(message) {
                let results: Vec<_> = jobs.iter().flat_map(|j| j.results.iter().cloned()).collect();
                let descriptors =
                    similarity::extract_from_results(&results, self.limits.max_products);
                let groups = enricher.enrich(message, &descriptors).await;
                tracing::info!(
                    descriptors = descriptors.len(),
                    groups = groups.len(),
                    "Similar product enrichment"
                );
                if !groups.is_empty() {
                    context.push('\n');
                    context.push_str(&similarity::render_groups(&groups));
                }
            }
        }

        let user_prompt = format!("{context}\nQuestion: {message}");
        let answer = self.model.complete(QA_SYSTEM_PROMPT, &user_prompt).await?;
        Ok(Some(answer))
    }

    /// Structured summary across every completed job in the conversation.
    ///
    /// The prompt is capped at `summary_char_budget` characters; results are
    /// read job by job and reading stops once the budget is spent. A response
    /// that is not valid JSON becomes the summary text.
    #[tracing::instrument(skip(self, prompt))]
    pub async fn get_conversation_summary(
        &self,
        conversation_id: Uuid,
        prompt: &str,
    ) -> Result<Option<ConversationSummary>> {
        let jobs = self.store.list_jobs_for_conversation(conversation_id).await?;
        let selected = select_recent_completed(jobs, conversation_id, usize::MAX);
        if selected.is_empty() {
            tracing::debug!("No completed jobs, skipping summary");
            return Ok(None);
        }

        let available = selected.len();
        let mut summary_prompt = SummaryPrompt::new(prompt, self.limits.summary_char_budget);
        for job in selected {
            if summary_prompt.is_full() {
                break;
            }
            let results = self.store.list_results_for_job(job.id).await?;
            let results = select_recent_results(results, usize::MAX);
            if !summary_prompt.push_job(&JobContext { job, results }) {
                break;
            }
        }

        let jobs_rendered = summary_prompt.job_count();
        let user_prompt = summary_prompt.finish();
        tracing::debug!(
            chars = user_prompt.chars().count(),
            jobs = jobs_rendered,
            available,
            "Rendered summary prompt"
        );

        let raw = self
            .model
            .complete_json(SUMMARY_SYSTEM_PROMPT, &user_prompt)
            .await?;

        match serde_json::from_str::<ConversationSummary>(strip_code_fence(&raw)) {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                tracing::warn!(error = %e, "Summary response was not valid JSON, returning raw text");
                Ok(Some(ConversationSummary::raw(raw.trim())))
            }
        }
    }
}
