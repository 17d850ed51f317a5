use serde::{Deserialize, Serialize};

/// Product tuple pulled from a crawl result for similarity search. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub name: String,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub source_url: String,
    pub note: Option<String>,
}

impl ProductDescriptor {
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brand: None,
            price: None,
            currency: None,
            source_url: source_url.into(),
            note: None,
        }
    }

    /// Search query: brand prefixed unless the name already carries it.
    pub fn search_query(&self) -> String {
        match &self.brand {
            Some(brand) if !self.name.to_lowercase().contains(&brand.to_lowercase()) => {
                format!("{} {}", brand, self.name)
            }
            _ => self.name.clone(),
        }
    }
}

/// An external link returned by the product search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLink {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

/// Links found for one product query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarProductGroup {
    pub product_name: String,
    pub links: Vec<ProductLink>,
}
