//! Testing utilities including mock implementations.
//!
//! These let applications exercise the orchestrator and context builder
//! without a crawling agent, quota ledger, bus, search provider or model.
//! Every mock records its calls for assertions.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::events::CrawlJobEvent;
use crate::traits::{
    agent::{AgentExecution, AgentRequest, AgentSubmission, CrawlAgentClient},
    analyzer::PromptAnalyzer,
    llm::LanguageModel,
    publisher::EventPublisher,
    quota::{QuotaDecision, QuotaGate},
    search::ProductSearchProvider,
};
use crate::types::{product::ProductLink, prompt::PromptAnalysis};

/// Error raised by mocks configured to fail.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

// =============================================================================
// Agent
// =============================================================================

/// Record of a call made to the mock agent.
#[derive(Debug, Clone, PartialEq)]
pub enum MockAgentCall {
    Execute(AgentRequest),
    Submit(AgentRequest),
}

impl MockAgentCall {
    pub fn request(&self) -> &AgentRequest {
        match self {
            MockAgentCall::Execute(r) | MockAgentCall::Submit(r) => r,
        }
    }
}

/// Scripted crawling agent.
///
/// `execute` pops queued executions (empty success when the queue is dry);
/// `submit` pops queued submissions (`Accepted` when dry).
#[derive(Default)]
pub struct MockAgent {
    executions: Mutex<VecDeque<AgentExecution>>,
    submissions: Mutex<VecDeque<AgentSubmission>>,
    error: Option<String>,
    delay: Option<Duration>,
    calls: RwLock<Vec<MockAgentCall>>,
}

impl MockAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution(self, execution: AgentExecution) -> Self {
        self.executions.lock().unwrap().push_back(execution);
        self
    }

    pub fn with_submission(self, submission: AgentSubmission) -> Self {
        self.submissions.lock().unwrap().push_back(submission);
        self
    }

    /// Every call fails with a transport error.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Sleep before answering, to exercise cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MockAgentCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    async fn answer(&self, call: MockAgentCall) -> Result<()> {
        self.calls.write().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.error {
            Some(message) => Err(OrchestratorError::agent(MockError(message.clone()))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CrawlAgentClient for MockAgent {
    async fn execute(&self, request: &AgentRequest) -> Result<AgentExecution> {
        self.answer(MockAgentCall::Execute(request.clone())).await?;
        let next = self.executions.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| AgentExecution::succeeded(vec![])))
    }

    async fn submit(&self, request: &AgentRequest) -> Result<AgentSubmission> {
        self.answer(MockAgentCall::Submit(request.clone())).await?;
        let next = self.submissions.lock().unwrap().pop_front();
        Ok(next.unwrap_or(AgentSubmission::Accepted))
    }
}

// =============================================================================
// Quota
// =============================================================================

/// In-memory quota ledger. Unknown users start at zero.
#[derive(Default)]
pub struct MemoryQuota {
    balances: Mutex<HashMap<Uuid, i64>>,
    deductions: Mutex<Vec<(Uuid, u32)>>,
    refunds: Mutex<Vec<(Uuid, u32)>>,
    error: Option<String>,
}

impl MemoryQuota {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, user_id: Uuid, units: i64) -> Self {
        self.balances.lock().unwrap().insert(user_id, units);
        self
    }

    /// Every ledger call fails.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn balance(&self, user_id: Uuid) -> i64 {
        self.balances
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Successful deductions, in order.
    pub fn deductions(&self) -> Vec<(Uuid, u32)> {
        self.deductions.lock().unwrap().clone()
    }

    pub fn refunds(&self) -> Vec<(Uuid, u32)> {
        self.refunds.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        match &self.error {
            Some(message) => Err(OrchestratorError::quota(MockError(message.clone()))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QuotaGate for MemoryQuota {
    async fn try_deduct(&self, user_id: Uuid, units: u32) -> Result<QuotaDecision> {
        self.check()?;
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(user_id).or_default();
        if *balance < i64::from(units) {
            return Ok(QuotaDecision::Insufficient {
                remaining: *balance,
            });
        }
        *balance -= i64::from(units);
        self.deductions.lock().unwrap().push((user_id, units));
        Ok(QuotaDecision::Granted {
            remaining: *balance,
        })
    }

    async fn refund(&self, user_id: Uuid, units: u32) -> Result<()> {
        self.check()?;
        *self.balances.lock().unwrap().entry(user_id).or_default() += i64::from(units);
        self.refunds.lock().unwrap().push((user_id, units));
        Ok(())
    }
}

// =============================================================================
// Prompt analyzer
// =============================================================================

/// Analyzer returning a fixed analysis (or failing).
pub struct MockAnalyzer {
    analysis: Option<PromptAnalysis>,
    calls: RwLock<Vec<String>>,
}

impl MockAnalyzer {
    pub fn new(analysis: PromptAnalysis) -> Self {
        Self {
            analysis: Some(analysis),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Analysis that requires navigation.
    pub fn navigating() -> Self {
        Self::new(PromptAnalysis::new("extract").with_navigation(true))
    }

    /// Analysis for a single-page read.
    pub fn single_page() -> Self {
        Self::new(PromptAnalysis::new("extract"))
    }

    pub fn failing() -> Self {
        Self {
            analysis: None,
            calls: RwLock::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PromptAnalyzer for MockAnalyzer {
    async fn analyze(&self, prompt: &str, _url: &str) -> Result<PromptAnalysis> {
        self.calls.write().unwrap().push(prompt.to_string());
        self.analysis
            .clone()
            .ok_or_else(|| OrchestratorError::language_model(MockError("analysis failed".into())))
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Publisher that records every event it is handed.
#[derive(Default)]
pub struct RecordingPublisher {
    events: RwLock<Vec<CrawlJobEvent>>,
    failing: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the attempt, then returns an error.
    pub fn failing() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            failing: true,
        }
    }

    pub fn events(&self) -> Vec<CrawlJobEvent> {
        self.events.read().unwrap().clone()
    }

    /// Subject suffixes in publish order (`started`, `completed`, `failed`).
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events
            .read()
            .unwrap()
            .iter()
            .map(CrawlJobEvent::subject_suffix)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &CrawlJobEvent) -> Result<()> {
        self.events.write().unwrap().push(event.clone());
        if self.failing {
            return Err(OrchestratorError::publish(MockError("bus unavailable".into())));
        }
        Ok(())
    }
}

// =============================================================================
// Language model
// =============================================================================

/// Record of a call made to the mock language model.
#[derive(Debug, Clone)]
pub struct MockModelCall {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Language model returning queued responses, then a default.
pub struct MockLanguageModel {
    responses: Mutex<VecDeque<String>>,
    default_response: String,
    calls: RwLock<Vec<MockModelCall>>,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_response: "Mock answer".to_string(),
            calls: RwLock::new(Vec::new()),
        }
    }
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(response.into());
        self
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    pub fn calls(&self) -> Vec<MockModelCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.write().unwrap().push(MockModelCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
        });
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.default_response.clone()))
    }
}

// =============================================================================
// Product search
// =============================================================================

/// Search provider returning canned or generated links.
///
/// Unknown queries get `links_per_query` generated links, ignoring the
/// requested limit so callers' truncation can be checked.
pub struct MockProductSearch {
    canned: RwLock<HashMap<String, Vec<ProductLink>>>,
    links_per_query: usize,
    failing: bool,
    queries: RwLock<Vec<String>>,
}

impl Default for MockProductSearch {
    fn default() -> Self {
        Self {
            canned: RwLock::new(HashMap::new()),
            links_per_query: 5,
            failing: false,
            queries: RwLock::new(Vec::new()),
        }
    }
}

impl MockProductSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_links(self, query: impl Into<String>, links: Vec<ProductLink>) -> Self {
        self.canned.write().unwrap().insert(query.into(), links);
        self
    }

    pub fn with_links_per_query(mut self, n: usize) -> Self {
        self.links_per_query = n;
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.read().unwrap().clone()
    }
}

#[async_trait]
impl ProductSearchProvider for MockProductSearch {
    async fn search_products(&self, query: &str, _limit: usize) -> Result<Vec<ProductLink>> {
        self.queries.write().unwrap().push(query.to_string());
        if self.failing {
            return Err(OrchestratorError::search(MockError("search unavailable".into())));
        }
        if let Some(links) = self.canned.read().unwrap().get(query) {
            return Ok(links.clone());
        }
        Ok((0..self.links_per_query)
            .map(|i| ProductLink {
                title: format!("{query} result {i}"),
                url: format!("https://search.example/{i}?q={}", query.replace(' ', "+")),
                snippet: None,
            })
            .collect())
    }
}

/// Convenience bundle of the orchestrator's collaborators as shared mocks.
pub struct TestHarness {
    pub store: Arc<crate::stores::MemoryStore>,
    pub quota: Arc<MemoryQuota>,
    pub agent: Arc<MockAgent>,
    pub analyzer: Arc<MockAnalyzer>,
    pub publisher: Arc<RecordingPublisher>,
}

impl TestHarness {
    pub fn new(quota: MemoryQuota, agent: MockAgent, analyzer: MockAnalyzer) -> Self {
        Self {
            store: Arc::new(crate::stores::MemoryStore::new()),
            quota: Arc::new(quota),
            agent: Arc::new(agent),
            analyzer: Arc::new(analyzer),
            publisher: Arc::new(RecordingPublisher::new()),
        }
    }

    pub fn with_publisher(mut self, publisher: RecordingPublisher) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }

    pub fn orchestrator(&self) -> crate::orchestrator::JobOrchestrator {
        crate::orchestrator::JobOrchestrator::new(
            self.store.clone(),
            self.quota.clone(),
            self.analyzer.clone(),
            self.agent.clone(),
            self.publisher.clone(),
        )
    }
}
