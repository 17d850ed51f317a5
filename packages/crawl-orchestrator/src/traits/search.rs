//! External product search.
//!
//! Used only by the similarity enricher to find "similar product" links on
//! the open web for products seen in crawl results.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::product::ProductLink;

#[async_trait]
pub trait ProductSearchProvider: Send + Sync {
    /// Search for pages about `query`, returning at most `limit` links.
    async fn search_products(&self, query: &str, limit: usize) -> Result<Vec<ProductLink>>;
}

/// No-op provider for when no search API key is configured.
#[derive(Debug, Default, Clone)]
pub struct NoopProductSearch;

#[async_trait]
impl ProductSearchProvider for NoopProductSearch {
    async fn search_products(&self, query: &str, _limit: usize) -> Result<Vec<ProductLink>> {
        tracing::warn!(query, "NoopProductSearch: search called but no provider configured");
        Ok(vec![])
    }
}
