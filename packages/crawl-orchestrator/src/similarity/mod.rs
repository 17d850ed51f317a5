//! "Similar product" enrichment for Q&A context.
//!
//! When a user message asks for similar products, the enricher picks up to
//! a few product queries (from the message itself or from descriptors pulled
//! out of crawl results), asks the external search provider for links and
//! renders them as an extra context section.

pub mod extract;
pub mod intent;

use std::collections::HashSet;
use std::sync::Arc;

use crate::traits::search::ProductSearchProvider;
use crate::types::{
    config::ContextLimits,
    product::{ProductDescriptor, SimilarProductGroup},
};

pub use extract::{extract_descriptors, extract_from_results, infer_currency, parse_price};
pub use intent::{detect_similarity_intent, isolate_product_name, normalize};

/// One planned search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityQuery {
    pub product_name: String,
    pub query: String,
}

/// Decide what to search for.
///
/// 1. A product named in the message is the only query.
/// 2. Otherwise descriptors overlapping the message, or all descriptors when
///    none overlap.
/// 3. With no descriptors at all, the normalized message itself.
///
/// Queries are unique case-insensitively and capped at `max_queries`.
pub fn plan_queries(
    message: &str,
    descriptors: &[ProductDescriptor],
    max_queries: usize,
) -> Vec<SimilarityQuery> {
    if max_queries == 0 {
        return Vec::new();
    }

    if let Some(name) = isolate_product_name(message) {
        return vec![SimilarityQuery {
            product_name: name.clone(),
            query: name,
        }];
    }

    let normalized = normalize(message);
    if descriptors.is_empty() {
        if normalized.is_empty() {
            return Vec::new();
        }
        return vec![SimilarityQuery {
            product_name: normalized.clone(),
            query: normalized,
        }];
    }

    let tokens: Vec<String> = intent::words(message)
        .into_iter()
        .filter(|w| w.chars().count() >= 3 && !intent::is_filler(w))
        .collect();

    let matching: Vec<&ProductDescriptor> = descriptors
        .iter()
        .filter(|d| {
            let name = normalize(&d.name);
            normalized.contains(&name) || tokens.iter().any(|t| name.contains(t.as_str()))
        })
        .collect();
    let candidates = if matching.is_empty() {
        descriptors.iter().collect()
    } else {
        matching
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|d| seen.insert(d.name.to_lowercase()))
        .take(max_queries)
        .map(|d| SimilarityQuery {
            product_name: d.name.clone(),
            query: d.search_query(),
        })
        .collect()
}

/// Fetches similar-product links through a [`ProductSearchProvider`].
#[derive(Clone)]
pub struct ProductSimilarityEnricher {
    search: Arc<dyn ProductSearchProvider>,
    max_queries: usize,
    max_links_per_query: usize,
}

impl ProductSimilarityEnricher {
    pub fn new(search: Arc<dyn ProductSearchProvider>) -> Self {
        let limits = ContextLimits::default();
        Self {
            search,
            max_queries: limits.max_similarity_queries,
            max_links_per_query: limits.max_links_per_query,
        }
    }

    pub fn with_limits(mut self, limits: &ContextLimits) -> Self {
        self.max_queries = limits.max_similarity_queries;
        self.max_links_per_query = limits.max_links_per_query;
        self
    }

    /// Search for each planned query. Provider errors skip that query.
    pub async fn enrich(
        &self,
        message: &str,
        descriptors: &[ProductDescriptor],
    ) -> Vec<SimilarProductGroup> {
        let queries = plan_queries(message, descriptors, self.max_queries);
        let mut groups = Vec::with_capacity(queries.len());

        for planned in queries {
            match self
                .search
                .search_products(&planned.query, self.max_links_per_query)
                .await
            {
                Ok(mut links) => {
                    links.truncate(self.max_links_per_query);
                    tracing::debug!(query = %planned.query, links = links.len(), "Similar product search");
                    if !links.is_empty() {
                        groups.push(SimilarProductGroup {
                            product_name: planned.product_name,
                            links,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(query = %planned.query, error = %e, "Similar product search failed");
                }
            }
        }

        groups
    }
}

/// Render link groups as a labeled context section.
pub fn render_groups(groups: &[SimilarProductGroup]) -> String {
    let mut out = String::from("=== Similar products found online ===\n");
    for group in groups {
        out.push_str(&format!("Product: {}\n", group.product_name));
        for link in &group.links {
            match &link.snippet {
                Some(snippet) if !snippet.is_empty() => {
                    out.push_str(&format!("- {} ({}): {}\n", link.title, link.url, snippet))
                }
                _ => out.push_str(&format!("- {} ({})\n", link.title, link.url)),
            }
        }
    }
    out
}
