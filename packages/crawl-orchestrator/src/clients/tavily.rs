use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, SecretString};
use crate::error::{OrchestratorError, Result};
use crate::traits::search::ProductSearchProvider;
use crate::types::product::ProductLink;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Tavily-backed product search.
pub struct TavilyProductSearch {
    api_key: SecretString,
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
}

impl TavilyProductSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            client: reqwest::Client::new(),
            endpoint: TAVILY_SEARCH_URL.to_string(),
        }
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn into_links(response: SearchResponse, limit: usize) -> Vec<ProductLink> {
    response
        .results
        .into_iter()
        .filter(|r| url::Url::parse(&r.url).is_ok())
        .take(limit)
        .map(|r| ProductLink {
            title: r.title.unwrap_or_else(|| r.url.clone()),
            url: r.url,
            snippet: r.content,
        })
        .collect()
}

#[async_trait]
impl ProductSearchProvider for TavilyProductSearch {
    async fn search_products(&self, query: &str, limit: usize) -> Result<Vec<ProductLink>> {
        let request = SearchRequest {
            query,
            search_depth: "basic",
            max_results: limit,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(OrchestratorError::search)?;
        let response = check_status("tavily", response)
            .await
            .map_err(OrchestratorError::search)?;

        let body: SearchResponse = response.json().await.map_err(OrchestratorError::search)?;
        Ok(into_links(body, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_mapping_drops_bad_urls_and_caps() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "results": [
                {"url": "https://a.example/1", "title": "One", "content": "first"},
                {"url": "not a url"},
                {"url": "https://a.example/2"},
                {"url": "https://a.example/3", "title": "Three"}
            ]
        }))
        .unwrap();
        let links = into_links(body, 2);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].snippet.as_deref(), Some("first"));
        assert_eq!(links[1].title, "https://a.example/2");
    }
}
