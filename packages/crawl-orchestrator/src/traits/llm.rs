//! Language model trait.
//!
//! Infrastructure only: the prompts live with the callers (context builder,
//! prompt analyzer). Responses are raw strings; callers parse them.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a conversation turn and return the raw text response.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Complete expecting a JSON body. Parse with `serde_json` in calling code.
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let system = format!("{system_prompt}\n\nRespond with valid JSON only.");
        self.complete(&system, user_prompt).await
    }
}
