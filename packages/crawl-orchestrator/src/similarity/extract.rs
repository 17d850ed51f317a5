//! Product descriptor extraction from crawl result payloads.
//!
//! Field names are matched against synonym tables in priority order. Extend
//! the tables to teach the extractor new site vocabularies.

use serde_json::{Map, Value};

use crate::types::{product::ProductDescriptor, result::CrawlResult};

/// An object is product-shaped when it has one of these.
pub const NAME_FIELDS: &[&str] = &[
    "product_name",
    "productName",
    "name",
    "title",
    "product",
    "product_title",
    "ten_san_pham",
    "tên sản phẩm",
    "ten",
    "tên",
];

pub const BRAND_FIELDS: &[&str] = &[
    "brand",
    "brand_name",
    "brandName",
    "manufacturer",
    "vendor",
    "maker",
    "thuong_hieu",
    "thương hiệu",
    "hãng",
];

pub const PRICE_FIELDS: &[&str] = &[
    "price",
    "sale_price",
    "salePrice",
    "current_price",
    "currentPrice",
    "final_price",
    "finalPrice",
    "offer_price",
    "amount",
    "cost",
    "gia",
    "giá",
    "gia_ban",
];

pub const CURRENCY_FIELDS: &[&str] = &[
    "currency",
    "currency_code",
    "currencyCode",
    "price_currency",
    "priceCurrency",
    "don_vi_tien",
];

pub const VARIANT_FIELDS: &[&str] = &[
    "variant",
    "model",
    "size",
    "color",
    "colour",
    "capacity",
    "phien_ban",
    "màu",
];

pub const URL_FIELDS: &[&str] = &["url", "product_url", "productUrl", "link", "href", "source_url"];

/// Characteristic substrings in price text, checked in order.
pub const CURRENCY_HINTS: &[(&str, &str)] = &[
    ("vnd", "VND"),
    ("vnđ", "VND"),
    ("₫", "VND"),
    ("đ", "VND"),
    ("us$", "USD"),
    ("usd", "USD"),
    ("€", "EUR"),
    ("eur", "EUR"),
    ("£", "GBP"),
    ("gbp", "GBP"),
    ("¥", "JPY"),
    ("jpy", "JPY"),
    ("$", "USD"),
];

/// Value of the first synonym present on `obj` (keys compared case-insensitively).
fn lookup<'a>(obj: &'a Map<String, Value>, synonyms: &[&str]) -> Option<&'a Value> {
    synonyms.iter().find_map(|synonym| {
        let synonym = synonym.to_lowercase();
        obj.iter()
            .find(|(key, value)| key.to_lowercase() == synonym && !value.is_null())
            .map(|(_, value)| value)
    })
}

fn lookup_text(obj: &Map<String, Value>, synonyms: &[&str]) -> Option<String> {
    match lookup(obj, synonyms)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a human-written price like `"1.299.000 ₫"`, `"$1,299.99"` or `"12,5 €"`.
///
/// When both separators appear the later one is the decimal point. A lone
/// separator followed by exactly three digits is a thousands separator.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ',');
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            cleaned
                .chars()
                .filter(|c| *c != thousands)
                .map(|c| if c == decimal { '.' } else { c })
                .collect::<String>()
        }
        (Some(_), None) => single_separator(cleaned, '.'),
        (None, Some(_)) => single_separator(cleaned, ','),
        (None, None) => cleaned.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|p| p.is_finite())
}

fn single_separator(cleaned: &str, sep: char) -> String {
    let count = cleaned.matches(sep).count();
    let digits_after = cleaned
        .rsplit(sep)
        .next()
        .map(str::len)
        .unwrap_or_default();
    if count > 1 || digits_after == 3 {
        cleaned.chars().filter(|c| *c != sep).collect()
    } else {
        cleaned.replace(sep, ".")
    }
}

/// Currency code inferred from characteristic substrings.
pub fn infer_currency(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    CURRENCY_HINTS
        .iter()
        .find(|(hint, _)| lower.contains(hint))
        .map(|(_, code)| (*code).to_string())
}

fn descriptor_from(obj: &Map<String, Value>, fallback_url: &str) -> Option<ProductDescriptor> {
    let name = lookup_text(obj, NAME_FIELDS)?;
    let url = lookup_text(obj, URL_FIELDS).unwrap_or_else(|| fallback_url.to_string());
    let mut descriptor = ProductDescriptor::new(name, url);
    descriptor.brand = lookup_text(obj, BRAND_FIELDS);

    let explicit_currency = lookup_text(obj, CURRENCY_FIELDS).map(|c| c.to_uppercase());
    match lookup(obj, PRICE_FIELDS) {
        Some(Value::Number(n)) => {
            descriptor.price = n.as_f64();
            descriptor.currency = explicit_currency;
        }
        Some(Value::String(s)) => {
            descriptor.price = parse_price(s);
            descriptor.currency = explicit_currency.or_else(|| infer_currency(s));
        }
        _ => descriptor.currency = explicit_currency,
    }

    descriptor.note = lookup_text(obj, VARIANT_FIELDS);
    Some(descriptor)
}

fn walk(value: &Value, fallback_url: &str, cap: usize, out: &mut Vec<ProductDescriptor>) {
    if out.len() >= cap {
        return;
    }
    match value {
        Value::Object(obj) => {
            if let Some(descriptor) = descriptor_from(obj, fallback_url) {
                let key = descriptor.name.to_lowercase();
                if !out.iter().any(|d| d.name.to_lowercase() == key) {
                    out.push(descriptor);
                }
                return;
            }
            for child in obj.values() {
                walk(child, fallback_url, cap, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, fallback_url, cap, out);
            }
        }
        _ => {}
    }
}

/// Descriptors found in one payload, deduplicated by case-insensitive name.
pub fn extract_descriptors(payload: &Value, source_url: &str, cap: usize) -> Vec<ProductDescriptor> {
    let mut out = Vec::new();
    walk(payload, source_url, cap, &mut out);
    out
}

/// Descriptors across a result set; at most `cap` in total.
pub fn extract_from_results(results: &[CrawlResult], cap: usize) -> Vec<ProductDescriptor> {
    let mut out = Vec::new();
    for result in results {
        if out.len() >= cap {
            break;
        }
        if let Some(payload) = result.payload() {
            walk(&payload, &result.source_url, cap, &mut out);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("1.299.000 ₫"), Some(1_299_000.0));
        assert_eq!(parse_price("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price("12,5 €"), Some(12.5));
        assert_eq!(parse_price("1.299"), Some(1299.0));
        assert_eq!(parse_price("19.99"), Some(19.99));
        assert_eq!(parse_price("1.234,56"), Some(1234.56));
        assert_eq!(parse_price("call us"), None);
    }

    #[test]
    fn test_infer_currency() {
        assert_eq!(infer_currency("1.299.000 VND").as_deref(), Some("VND"));
        assert_eq!(infer_currency("US$ 20").as_deref(), Some("USD"));
        assert_eq!(infer_currency("20 €").as_deref(), Some("EUR"));
        assert_eq!(infer_currency("20"), None);
    }

    #[test]
    fn test_walks_nested_payloads() {
        let payload = json!({
            "page": {
                "results": [
                    {"title": "Pegasus 40", "brand": "Nike", "price": "$129.99", "url": "https://shop.example/p/1"},
                    {"productName": "Gel Kayano", "manufacturer": "Asics", "price": 160, "currency": "usd"},
                    {"title": "PEGASUS 40", "price": "$99"}
                ]
            }
        });
        let found = extract_descriptors(&payload, "https://shop.example", 12);
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].name, "Pegasus 40");
        assert_eq!(found[0].brand.as_deref(), Some("Nike"));
        assert_eq!(found[0].price, Some(129.99));
        assert_eq!(found[0].currency.as_deref(), Some("USD"));
        assert_eq!(found[0].source_url, "https://shop.example/p/1");

        assert_eq!(found[1].brand.as_deref(), Some("Asics"));
        assert_eq!(found[1].currency.as_deref(), Some("USD"));
        assert_eq!(found[1].source_url, "https://shop.example");
    }

    #[test]
    fn test_name_priority_order() {
        let payload = json!({"title": "Page title", "product_name": "Real product"});
        let found = extract_descriptors(&payload, "u", 12);
        assert_eq!(found[0].name, "Real product");
    }

    #[test]
    fn test_cap_is_respected() {
        let items: Vec<_> = (0..40).map(|i| json!({"name": format!("Item {i}")})).collect();
        assert_eq!(extract_descriptors(&json!(items), "u", 12).len(), 12);
    }
}
