//! Integration tests for the retrieval context builder: Q&A context caps,
//! summarization budget and similar-product enrichment.

use std::sync::Arc;

use chrono::{Duration, Utc};
use crawl_orchestrator::{
    testing::{MockLanguageModel, MockProductSearch},
    ContextBuilder, ContextLimits, CrawlJob, CrawlResult, JobLinkage, JobStore, MemoryStore,
    ProductSimilarityEnricher, ResultStore,
};
use serde_json::json;
use uuid::Uuid;

/// Seed a completed job with `items` results, finished `minutes_ago`.
async fn seed_job(
    store: &MemoryStore,
    conversation: Uuid,
    prompt: &str,
    items: Vec<serde_json::Value>,
    minutes_ago: i64,
) -> CrawlJob {
    let finished = Utc::now() - Duration::minutes(minutes_ago);
    let mut job = CrawlJob::in_progress(
        Uuid::new_v4(),
        Uuid::new_v4(),
        "https://shop.example/running",
        prompt,
        JobLinkage::for_conversation(conversation),
    );
    job.complete(items.len(), None, finished).unwrap();
    store.insert_job(&job).await.unwrap();

    let results: Vec<CrawlResult> = items
        .into_iter()
        .map(|item| CrawlResult::from_item(job.id, "https://shop.example/running", prompt, item, finished))
        .collect();
    store.insert_results(&results).await.unwrap();
    job
}

fn shoes(n: usize) -> Vec<serde_json::Value> {
    (0..n)
        .map(|i| json!({"name": format!("Shoe {i}"), "brand": "Nike", "price": 100 + i}))
        .collect()
}

fn builder(store: &Arc<MemoryStore>, model: &Arc<MockLanguageModel>) -> ContextBuilder {
    ContextBuilder::new(store.clone(), model.clone())
}

// =============================================================================
// Q&A
// =============================================================================

#[tokio::test]
async fn test_no_history_and_no_upload_skips_model() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new());

    let answer = builder(&store, &model)
        .process_user_message(Uuid::new_v4(), "what is the cheapest shoe?", None)
        .await
        .unwrap();

    assert!(answer.is_none());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_failed_jobs_do_not_count_as_history() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new());
    let conversation = Uuid::new_v4();

    let mut failed = CrawlJob::in_progress(
        Uuid::new_v4(),
        Uuid::new_v4(),
        "https://shop.example",
        "list shoes",
        JobLinkage::for_conversation(conversation),
    );
    failed.fail("Crawler returned no results", Utc::now()).unwrap();
    store.insert_job(&failed).await.unwrap();

    let answer = builder(&store, &model)
        .process_user_message(conversation, "anything?", Some("   "))
        .await
        .unwrap();

    assert!(answer.is_none());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_uploaded_data_alone_is_answered() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new().with_response("Row 2 is cheapest"));

    let answer = builder(&store, &model)
        .process_user_message(Uuid::new_v4(), "which row is cheapest?", Some("name,price\nA,10\nB,5"))
        .await
        .unwrap();

    assert_eq!(answer.as_deref(), Some("Row 2 is cheapest"));
    let call = &model.calls()[0];
    assert!(call.user_prompt.contains("=== Uploaded data ==="));
    assert!(call.user_prompt.contains("B,5"));
    assert!(call.user_prompt.ends_with("Question: which row is cheapest?"));
}

#[tokio::test]
async fn test_context_caps_jobs_and_items() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new());
    let conversation = Uuid::new_v4();

    for i in 0..4 {
        seed_job(&store, conversation, &format!("crawl {i}"), shoes(5), i).await;
    }
    // Other conversations never leak in
    seed_job(&store, Uuid::new_v4(), "elsewhere", shoes(5), 0).await;

    let limits = ContextLimits::default()
        .with_max_jobs(3)
        .with_max_items_per_job(2);
    let answer = builder(&store, &model)
        .with_limits(limits)
        .process_user_message(conversation, "compare the crawls", None)
        .await
        .unwrap();
    assert!(answer.is_some());

    let prompt = &model.calls()[0].user_prompt;
    assert!(prompt.contains("Source 3"));
    assert!(!prompt.contains("Source 4"));
    assert!(prompt.contains("\"crawl 0\""));
    assert!(!prompt.contains("\"crawl 3\""));
    assert!(!prompt.contains("elsewhere"));
    assert_eq!(prompt.matches("\"_source\"").count(), 6);
    assert!(prompt.contains("Total items across all sources: 6"));
}

#[tokio::test]
async fn test_similarity_enrichment_is_bounded() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new());
    let search = Arc::new(MockProductSearch::new().with_links_per_query(5));
    let conversation = Uuid::new_v4();

    let products = vec![
        json!({"name": "Pegasus 40", "brand": "Nike", "price": "3.290.000 ₫"}),
        json!({"name": "Gel Kayano 30", "brand": "Asics", "price": 160}),
        json!({"name": "Ultraboost Light", "brand": "Adidas", "price": 190}),
        json!({"name": "Clifton 9", "brand": "Hoka", "price": 145}),
        json!({"name": "Ghost 15", "brand": "Brooks", "price": 140}),
    ];
    seed_job(&store, conversation, "list running shoes", products, 1).await;

    let answer = builder(&store, &model)
        .with_enricher(ProductSimilarityEnricher::new(search.clone()))
        .process_user_message(conversation, "show me similar products", None)
        .await
        .unwrap();
    assert!(answer.is_some());

    let queries = search.queries();
    assert!(!queries.is_empty());
    assert!(queries.len() <= 3);

    let prompt = &model.calls()[0].user_prompt;
    assert!(prompt.contains("=== Similar products found online ==="));
    let links = prompt.lines().filter(|l| l.starts_with("- ")).count();
    assert!(links <= 9, "got {links} links");
}

#[tokio::test]
async fn test_no_enrichment_without_intent() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new());
    let search = Arc::new(MockProductSearch::new());
    let conversation = Uuid::new_v4();
    seed_job(&store, conversation, "list running shoes", shoes(3), 1).await;

    builder(&store, &model)
        .with_enricher(ProductSimilarityEnricher::new(search.clone()))
        .process_user_message(conversation, "what is the cheapest shoe?", None)
        .await
        .unwrap();

    assert!(search.queries().is_empty());
    assert!(!model.calls()[0].user_prompt.contains("Similar products"));
}

#[tokio::test]
async fn test_search_failure_still_answers() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new());
    let search = Arc::new(MockProductSearch::failing());
    let conversation = Uuid::new_v4();
    seed_job(&store, conversation, "list running shoes", shoes(2), 1).await;

    let answer = builder(&store, &model)
        .with_enricher(ProductSimilarityEnricher::new(search.clone()))
        .process_user_message(conversation, "find similar to Nike Pegasus 40", None)
        .await
        .unwrap();

    assert_eq!(answer.as_deref(), Some("Mock answer"));
    assert_eq!(search.queries(), vec!["nike pegasus 40"]);
}

// =============================================================================
// Summary
// =============================================================================

#[tokio::test]
async fn test_summary_none_without_completed_jobs() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new());

    let summary = builder(&store, &model)
        .get_conversation_summary(Uuid::new_v4(), "summarize")
        .await
        .unwrap();

    assert!(summary.is_none());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_summary_prompt_respects_char_budget() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new().with_response(
        r#"{"summary": "Prices range from 100 to 399", "insights": ["Nike dominates"], "charts": [{"type": "bar", "title": "Price", "data": {}}]}"#,
    ));
    let conversation = Uuid::new_v4();
    for i in 0..3 {
        seed_job(&store, conversation, &format!("crawl {i}"), shoes(300), i).await;
    }

    let summary = builder(&store, &model)
        .with_limits(ContextLimits::default().with_summary_char_budget(4_000))
        .get_conversation_summary(conversation, "summarize prices")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.summary, "Prices range from 100 to 399");
    assert_eq!(summary.insights, vec!["Nike dominates"]);
    assert_eq!(summary.charts[0].chart_type, "bar");

    let call = &model.calls()[0];
    assert!(call.user_prompt.chars().count() <= 4_000);
    assert!(call.user_prompt.contains("User request: summarize prices"));
}

#[tokio::test]
async fn test_summary_stops_reading_results_once_budget_is_spent() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new().with_response(r#"{"summary": "ok"}"#));
    let conversation = Uuid::new_v4();
    for i in 0..5 {
        seed_job(&store, conversation, &format!("crawl {i}"), shoes(300), i).await;
    }

    builder(&store, &model)
        .with_limits(ContextLimits::default().with_summary_char_budget(4_000))
        .get_conversation_summary(conversation, "summarize prices")
        .await
        .unwrap()
        .unwrap();

    // The most recent job alone fills the budget
    assert_eq!(store.result_reads(), 1);
    let prompt = &model.calls()[0].user_prompt;
    assert!(prompt.contains("crawl 0"));
    assert!(!prompt.contains("crawl 1"));
}

#[tokio::test]
async fn test_summary_reads_every_job_when_budget_allows() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new().with_response(r#"{"summary": "ok"}"#));
    let conversation = Uuid::new_v4();
    for i in 0..3 {
        seed_job(&store, conversation, &format!("crawl {i}"), shoes(2), i).await;
    }

    builder(&store, &model)
        .get_conversation_summary(conversation, "summarize")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(store.result_reads(), 3);
    let prompt = &model.calls()[0].user_prompt;
    assert_eq!(prompt.matches("\"_source\"").count(), 6);
}

#[tokio::test]
async fn test_summary_accepts_fenced_json() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(
        MockLanguageModel::new().with_response("```json\n{\"summary\": \"Fenced\", \"insights\": []}\n```"),
    );
    let conversation = Uuid::new_v4();
    seed_job(&store, conversation, "list running shoes", shoes(2), 1).await;

    let summary = builder(&store, &model)
        .get_conversation_summary(conversation, "summarize")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.summary, "Fenced");
    assert!(summary.charts.is_empty());
}

#[tokio::test]
async fn test_summary_falls_back_to_raw_text() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockLanguageModel::new().with_response("  Mostly Nike shoes around $120.  "));
    let conversation = Uuid::new_v4();
    seed_job(&store, conversation, "list running shoes", shoes(2), 1).await;

    let summary = builder(&store, &model)
        .get_conversation_summary(conversation, "summarize")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.summary, "Mostly Nike shoes around $120.");
    assert!(summary.insights.is_empty());
    assert!(summary.charts.is_empty());
}
