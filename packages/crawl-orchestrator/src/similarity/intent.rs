//! Similarity-intent detection and product-name isolation.
//!
//! All matching happens on [`normalize`]d text so "tương tự", "tuong tu" and
//! "TƯƠNG TỰ" are the same trigger.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Phrases that ask for similar products or an external lookup.
/// Stored normalized (lowercase, no diacritics).
pub const SIMILARITY_TRIGGERS: &[&str] = &[
    "similar",
    "alternative",
    "alternatives",
    "something like",
    "like this",
    "google this",
    "google it",
    "google for me",
    "search google",
    "search the web",
    "look it up",
    "tuong tu",
    "giong nhu",
    "giong voi",
    "san pham khac",
    "tim tren google",
    "google giup",
    "google dum",
    "google ho",
    "tra google",
];

/// Phrases that introduce a product name ("similar to X", "tương tự X").
const ANCHOR_PHRASES: &[&str] = &[
    "similar to",
    "similar",
    "alternatives to",
    "alternatives for",
    "alternative to",
    "something like",
    "like",
    "google",
    "tuong tu nhu",
    "tuong tu",
    "giong nhu",
    "giong voi",
    "giong",
];

/// Phrases removed from what follows the anchor, longest first.
const MARKER_PHRASES: &[&str] = &[
    "san pham khac",
    "san pham",
    "this for me",
    "for me",
    "cho toi",
    "giup toi",
    "please",
];

/// Single words that never belong to a product name.
const FILLER_WORDS: &[&str] = &[
    "find", "search", "show", "get", "give", "me", "please", "some", "any", "the", "a", "an",
    "for", "to", "of", "this", "that", "these", "those", "it", "is", "are", "what", "which",
    "there", "one", "ones", "product", "products", "item", "items", "similar", "alternative",
    "alternatives", "like", "google", "online", "web", "other", "more", "and", "or", "with",
    "tim", "kiem", "giup", "dum", "ho", "cac", "nhung", "mot", "cai", "nay", "do", "khac", "voi",
    "nhu", "hay", "di", "nhe", "toi", "minh", "ban",
];

/// Words that open a constraint clause ("under 100", "cost less than").
/// The product name ends before the first of them.
const CONSTRAINT_WORDS: &[&str] = &[
    "cost", "costs", "costing", "price", "priced", "prices", "cheaper", "cheapest", "less",
    "more", "than", "under", "below", "over", "above", "around", "about", "between", "within",
    "budget", "gia", "re", "hon", "duoi", "tren", "khoang", "tam",
];

/// Lowercase, strip diacritics (NFD + drop combining marks, `đ` → `d`),
/// collapse whitespace.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' | 'Đ' => 'd',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Does the message ask for similar products?
pub fn detect_similarity_intent(message: &str) -> bool {
    let normalized = normalize(message);
    SIMILARITY_TRIGGERS
        .iter()
        .any(|trigger| normalized.contains(trigger))
}

/// True when a word carries no product information.
pub(crate) fn is_filler(word: &str) -> bool {
    FILLER_WORDS.contains(&word)
}

/// Normalized words with punctuation turned into spaces.
pub(crate) fn words(text: &str) -> Vec<String> {
    normalize(text)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Pull a product name out of a message like "find similar to Nike Pegasus 40".
///
/// Takes the text after the last anchor phrase up to the first price or
/// comparison word, drops marker phrases, filler words and punctuation, and
/// returns it when at least three characters survive and not all of them
/// are digits.
pub fn isolate_product_name(message: &str) -> Option<String> {
    let padded = format!(" {} ", words(message).join(" "));
    let anchor_end = ANCHOR_PHRASES
        .iter()
        .filter_map(|anchor| {
            let needle = format!(" {anchor} ");
            padded.rfind(&needle).map(|pos| pos + needle.len() - 1)
        })
        .max()?;

    let mut rest = padded[anchor_end..].to_string();
    for phrase in MARKER_PHRASES {
        let needle = format!(" {phrase} ");
        while rest.contains(&needle) {
            rest = rest.replace(&needle, " ");
        }
    }

    let kept: Vec<&str> = rest
        .split_whitespace()
        .take_while(|w| !CONSTRAINT_WORDS.contains(w))
        .filter(|w| !is_filler(w))
        .collect();

    // A name needs at least one word that is not a bare number.
    if !kept
        .iter()
        .any(|w| !w.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let name = kept.join(" ");
    (name.chars().count() >= 3).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_vietnamese_diacritics() {
        assert_eq!(normalize("Sản phẩm TƯƠNG TỰ"), "san pham tuong tu");
        assert_eq!(normalize("Đồng hồ   đeo tay"), "dong ho deo tay");
    }

    #[test]
    fn test_detects_multilingual_triggers() {
        assert!(detect_similarity_intent("Find similar products"));
        assert!(detect_similarity_intent("tìm sản phẩm tương tự"));
        assert!(detect_similarity_intent("google this for me"));
        assert!(detect_similarity_intent("Google giúp mình"));
        assert!(!detect_similarity_intent("what is the cheapest shoe?"));
    }

    #[test]
    fn test_isolates_named_product() {
        assert_eq!(
            isolate_product_name("Find products similar to Nike Pegasus 40!").as_deref(),
            Some("nike pegasus 40")
        );
        assert_eq!(
            isolate_product_name("tìm sản phẩm tương tự iPhone 15").as_deref(),
            Some("iphone 15")
        );
    }

    #[test]
    fn test_no_product_when_only_markers_remain() {
        assert_eq!(isolate_product_name("find similar products"), None);
        assert_eq!(isolate_product_name("google this for me please"), None);
        assert_eq!(isolate_product_name("similar to xs"), None);
        assert_eq!(isolate_product_name("kayano: any similar ones?"), None);
        assert_eq!(isolate_product_name("what does the kayano cost"), None);
    }

    #[test]
    fn test_price_constraints_are_not_product_names() {
        assert_eq!(
            isolate_product_name("which similar products cost less than 100?"),
            None
        );
        assert_eq!(isolate_product_name("something like 2024"), None);
        assert_eq!(
            isolate_product_name("similar to Nike Pegasus 40 under 120").as_deref(),
            Some("nike pegasus 40")
        );
        assert_eq!(
            isolate_product_name("tương tự iPhone 15 giá dưới 20 triệu").as_deref(),
            Some("iphone 15")
        );
    }
}
