//! Prompt analysis: intent, entities, and whether the crawl needs the agent
//! to navigate (paginate, filter, click through) rather than read one page.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::traits::llm::LanguageModel;
use crate::types::prompt::PromptAnalysis;

#[async_trait]
pub trait PromptAnalyzer: Send + Sync {
    async fn analyze(&self, prompt: &str, url: &str) -> Result<PromptAnalysis>;
}

/// Phrases that imply multi-step navigation.
const NAVIGATION_CUES: &[&str] = &[
    "all pages",
    "every page",
    "next page",
    "paginat",
    "filter",
    "sort by",
    "category",
    "categories",
    "click",
    "search for",
    "log in",
    "login",
    "similar",
    "compare",
    "tất cả",
    "trang tiếp",
    "lọc",
    "danh mục",
    "tương tự",
    "so sánh",
];

/// Heuristic analyzer: keyword cues only, no model call.
#[derive(Debug, Default, Clone)]
pub struct KeywordPromptAnalyzer;

impl KeywordPromptAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_sync(&self, prompt: &str) -> PromptAnalysis {
        let lower = prompt.to_lowercase();
        let requires_navigation = NAVIGATION_CUES.iter().any(|cue| lower.contains(cue));
        let intent = if lower.contains("similar") || lower.contains("tương tự") {
            "find_similar"
        } else if lower.contains("compare") || lower.contains("so sánh") {
            "compare"
        } else {
            "extract"
        };
        PromptAnalysis::new(intent).with_navigation(requires_navigation)
    }
}

#[async_trait]
impl PromptAnalyzer for KeywordPromptAnalyzer {
    async fn analyze(&self, prompt: &str, _url: &str) -> Result<PromptAnalysis> {
        Ok(self.analyze_sync(prompt))
    }
}

const ANALYZE_SYSTEM_PROMPT: &str = "You classify web crawling requests. \
Return JSON with fields: intent (string), entities (object), \
requires_navigation (boolean: true when the crawler must paginate, filter, \
search or click through the site), target_description (string).";

/// Model-backed analyzer that falls back to keyword cues on any failure.
pub struct LanguageModelPromptAnalyzer {
    model: Arc<dyn LanguageModel>,
    fallback: KeywordPromptAnalyzer,
}

impl LanguageModelPromptAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            fallback: KeywordPromptAnalyzer,
        }
    }
}

#[async_trait]
impl PromptAnalyzer for LanguageModelPromptAnalyzer {
    async fn analyze(&self, prompt: &str, url: &str) -> Result<PromptAnalysis> {
        let user = format!("URL: {url}\nRequest: {prompt}");
        let raw = match self.model.complete_json(ANALYZE_SYSTEM_PROMPT, &user).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt analysis failed, using keyword cues");
                return Ok(self.fallback.analyze_sync(prompt));
            }
        };

        match serde_json::from_str::<PromptAnalysis>(crate::context::strip_code_fence(&raw)) {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable prompt analysis, using keyword cues");
                Ok(self.fallback.analyze_sync(prompt))
            }
        }
    }
}
