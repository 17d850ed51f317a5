//! HTTP adapters for the external collaborators.
//!
//! - `HttpCrawlAgent` - crawling agent over JSON/HTTP
//! - `TavilyProductSearch` - product search via Tavily
//! - `OpenAiChatModel` - any OpenAI-compatible chat completion endpoint

mod agent;
mod openai;
mod secret;
mod tavily;

pub use agent::HttpCrawlAgent;
pub use openai::OpenAiChatModel;
pub use secret::SecretString;
pub use tavily::TavilyProductSearch;

/// Non-success HTTP status from an upstream service.
#[derive(Debug, thiserror::Error)]
#[error("{service} returned HTTP {status}: {body}")]
pub struct UpstreamStatusError {
    pub service: &'static str,
    pub status: reqwest::StatusCode,
    pub body: String,
}

/// Turn a non-2xx response into an [`UpstreamStatusError`], keeping a short
/// prefix of the body for the log.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, UpstreamStatusError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamStatusError {
        service,
        status,
        body: body.chars().take(500).collect(),
    })
}
