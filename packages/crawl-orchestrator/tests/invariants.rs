//! Property tests for invariants that must hold for any input.

use chrono::Utc;
use crawl_orchestrator::{
    context::render::{render_summary_prompt, JobContext},
    select_recent_completed,
    similarity::{extract_descriptors, parse_price, plan_queries},
    CrawlJob, CrawlResult, JobLinkage, NavigationStrategy, ProductDescriptor,
};
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

fn job_context(prompt: &str, names: &[String]) -> JobContext {
    let job = CrawlJob::in_progress(
        Uuid::new_v4(),
        Uuid::new_v4(),
        "https://shop.example",
        prompt,
        JobLinkage::default(),
    );
    let results = names
        .iter()
        .map(|name| {
            CrawlResult::from_item(job.id, "https://shop.example", prompt, json!({"name": name}), Utc::now())
        })
        .collect();
    JobContext { job, results }
}

proptest! {
    #[test]
    fn success_rate_stays_in_unit_interval(runs in proptest::collection::vec((any::<bool>(), 0u32..100_000), 0..50)) {
        let mut strategy = NavigationStrategy::learned(
            "shop.example",
            "https://shop.example/*",
            vec![],
            500.0,
            Uuid::new_v4(),
        );
        for (ok, ms) in runs {
            if ok {
                strategy.record_success(f64::from(ms));
            } else {
                strategy.record_failure();
            }
        }
        let rate = strategy.success_rate();
        prop_assert!((0.0..=1.0).contains(&rate));
        prop_assert_eq!(strategy.success_count + strategy.failure_count, strategy.times_used);
        prop_assert!(strategy.avg_execution_ms >= 0.0);
    }

    #[test]
    fn summary_prompt_never_exceeds_budget(
        budget in 0usize..6_000,
        prompt in "\\PC{0,200}",
        names in proptest::collection::vec("\\PC{0,40}", 0..60),
    ) {
        let jobs = vec![job_context("first", &names), job_context("second", &names)];
        let rendered = render_summary_prompt(&prompt, &jobs, budget);
        prop_assert!(rendered.chars().count() <= budget);
    }

    #[test]
    fn descriptors_are_capped_and_unique(
        names in proptest::collection::vec("[A-Za-z]{3,12}( [0-9]{1,3})?", 0..40),
        cap in 0usize..15,
    ) {
        let payload = json!({
            "products": names.iter().map(|n| json!({"name": n, "price": 10})).collect::<Vec<_>>()
        });
        let descriptors = extract_descriptors(&payload, "https://shop.example", cap);
        prop_assert!(descriptors.len() <= cap);

        let mut seen = std::collections::HashSet::new();
        for d in &descriptors {
            prop_assert!(seen.insert(d.name.to_lowercase()), "duplicate {}", d.name);
        }
    }

    #[test]
    fn planned_queries_respect_cap(
        message in "\\PC{0,80}",
        names in proptest::collection::vec("[A-Za-z]{3,10}", 0..10),
        cap in 0usize..5,
    ) {
        let descriptors: Vec<ProductDescriptor> = names
            .iter()
            .map(|n| ProductDescriptor::new(n.as_str(), "https://shop.example"))
            .collect();
        let queries = plan_queries(&message, &descriptors, cap);
        prop_assert!(queries.len() <= cap);
    }

    #[test]
    fn parsed_prices_are_finite_and_non_negative(raw in "\\PC{0,30}") {
        if let Some(price) = parse_price(&raw) {
            prop_assert!(price.is_finite());
            prop_assert!(price >= 0.0);
        }
    }

    #[test]
    fn plain_integers_parse_exactly(n in 0u32..1_000_000) {
        prop_assert_eq!(parse_price(&n.to_string()), Some(f64::from(n)));
    }

    #[test]
    fn recent_completed_is_bounded(count in 0usize..30, cap in 0usize..12) {
        let conversation = Uuid::new_v4();
        let jobs: Vec<CrawlJob> = (0..count)
            .map(|i| {
                let mut job = CrawlJob::in_progress(
                    Uuid::new_v4(),
                    Uuid::new_v4(),
                    "https://shop.example",
                    "p",
                    JobLinkage::for_conversation(conversation),
                );
                if i % 3 != 0 {
                    job.complete(1, None, Utc::now()).unwrap();
                }
                job
            })
            .collect();
        let selected = select_recent_completed(jobs, conversation, cap);
        prop_assert!(selected.len() <= cap);
        prop_assert!(selected.windows(2).all(|w| w[0].completed_at >= w[1].completed_at));
    }
}
