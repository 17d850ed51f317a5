//! Crawl Job Orchestration and Retrieval Context
//!
//! Turns natural-language crawl requests into tracked jobs, dispatches them to
//! an external crawling agent, learns reusable navigation strategies per
//! domain and answers follow-up questions over the crawled data.
//!
//! # Design
//!
//! - The core decides *what* happens and *when*; agents, ledgers, buses,
//!   search providers and models are traits
//! - Job state is persisted before any event announces it
//! - Public entry points report failures as outcomes, never as panics or
//!   propagated dispatch errors
//! - Context handed to a language model is always bounded
//!
//! # Usage
//!
//! ```rust,ignore
//! use crawl_orchestrator::{CrawlRequest, JobOrchestrator, MemoryStore};
//! use crawl_orchestrator::testing::{MemoryQuota, MockAgent, MockAnalyzer, RecordingPublisher};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = JobOrchestrator::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryQuota::new().with_balance(user_id, 5)),
//!     Arc::new(MockAnalyzer::navigating()),
//!     Arc::new(MockAgent::new()),
//!     Arc::new(RecordingPublisher::new()),
//! );
//!
//! let request = CrawlRequest::new(user_id, "https://shop.example/cat", "find running shoes");
//! let outcome = orchestrator
//!     .execute_intelligent_crawl(request, &CancellationToken::new())
//!     .await;
//! ```
//!
//! # Modules
//!
//! - [`orchestrator`] - Job lifecycle, dispatch paths and strategy learning
//! - [`context`] - Bounded Q&A and summarization context
//! - [`similarity`] - Similar-product enrichment
//! - [`traits`] - Collaborator contracts (agent, quota, store, bus, search, model)
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`clients`] - HTTP adapters (agent, Tavily search, OpenAI-compatible model)
//! - [`testing`] - Mock implementations for testing

pub mod clients;
pub mod context;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod similarity;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{OrchestratorError, Result};
pub use events::{AgentCompletedEvent, CrawlJobEvent, CrawlRequestedEvent};
pub use traits::{
    agent::{AgentExecution, AgentRequest, AgentSubmission, CrawlAgentClient},
    analyzer::{KeywordPromptAnalyzer, LanguageModelPromptAnalyzer, PromptAnalyzer},
    llm::LanguageModel,
    publisher::EventPublisher,
    quota::{QuotaDecision, QuotaGate},
    search::{NoopProductSearch, ProductSearchProvider},
    store::{CrawlStore, JobStore, PromptHistoryStore, ResultStore, StrategyStore},
};
pub use types::{
    config::{ContextLimits, OrchestratorConfig},
    job::{CrawlJob, JobId, JobLinkage, JobPriority, JobResultView, JobStatus, SessionType},
    product::{ProductDescriptor, ProductLink, SimilarProductGroup},
    prompt::{PromptAnalysis, PromptHistory},
    result::CrawlResult,
    strategy::{NavigationAction, NavigationStep, NavigationStrategy, StrategyType},
    summary::{ChartPreview, ConversationSummary},
};

pub use context::{select_recent_completed, ContextBuilder};
pub use orchestrator::{CrawlOutcome, CrawlRequest, JobOrchestrator, SubmissionOutcome};
pub use similarity::ProductSimilarityEnricher;

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::{PostgresQuotaLedger, PostgresStore};

// Re-export clients
pub use clients::{HttpCrawlAgent, OpenAiChatModel, TavilyProductSearch};
