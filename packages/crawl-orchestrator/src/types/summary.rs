use serde::{Deserialize, Serialize};

/// Chart preview suggested by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPreview {
    #[serde(rename = "type", alias = "chart_type", alias = "chartType")]
    pub chart_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Structured multi-job summary for a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConversationSummary {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default, alias = "chartPreviews", alias = "chart_previews")]
    pub charts: Vec<ChartPreview>,
}

impl ConversationSummary {
    /// Summary used when the model did not return valid JSON.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            summary: text.into(),
            insights: Vec::new(),
            charts: Vec::new(),
        }
    }
}
