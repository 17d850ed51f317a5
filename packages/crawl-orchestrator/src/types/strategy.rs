//! Navigation strategies: learned or templated action sequences per domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobId;

/// UI/navigation action performed by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationAction {
    Navigate,
    Click,
    Type,
    Select,
    Scroll,
    Wait,
    Paginate,
    Extract,
    #[serde(untagged)]
    Other(String),
}

/// One step of a navigation sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationStep {
    pub action: NavigationAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NavigationStep {
    pub fn new(action: NavigationAction) -> Self {
        Self {
            action,
            target: None,
            parameters: serde_json::Map::new(),
            description: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Template,
    #[default]
    Learned,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::Template => "template",
            StrategyType::Learned => "learned",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "template" => StrategyType::Template,
            _ => StrategyType::Learned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationStrategy {
    pub id: Uuid,
    pub domain: String,
    pub url_pattern: String,
    pub strategy_type: StrategyType,
    pub steps: Vec<NavigationStep>,
    pub times_used: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub avg_execution_ms: f64,
    pub is_active: bool,
    pub is_template: bool,
    pub created_from_job_id: Option<JobId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NavigationStrategy {
    /// Seed a learned strategy from one successful execution.
    pub fn learned(
        domain: impl Into<String>,
        url_pattern: impl Into<String>,
        steps: Vec<NavigationStep>,
        execution_ms: f64,
        job_id: JobId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            domain: domain.into(),
            url_pattern: url_pattern.into(),
            strategy_type: StrategyType::Learned,
            steps,
            times_used: 1,
            success_count: 1,
            failure_count: 0,
            avg_execution_ms: execution_ms,
            is_active: true,
            is_template: false,
            created_from_job_id: Some(job_id),
            created_at: now,
            updated_at: now,
        }
    }

    /// Hand-authored strategy that has never run.
    pub fn template(
        domain: impl Into<String>,
        url_pattern: impl Into<String>,
        steps: Vec<NavigationStep>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            domain: domain.into(),
            url_pattern: url_pattern.into(),
            strategy_type: StrategyType::Template,
            steps,
            times_used: 0,
            success_count: 0,
            failure_count: 0,
            avg_execution_ms: 0.0,
            is_active: true,
            is_template: true,
            created_from_job_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `success_count / times_used`, 0 for an unused strategy.
    pub fn success_rate(&self) -> f64 {
        if self.times_used <= 0 {
            return 0.0;
        }
        (f64::from(self.success_count) / f64::from(self.times_used)).min(1.0)
    }

    /// Count a successful reuse and fold the run into the rolling average.
    pub fn record_success(&mut self, execution_ms: f64) {
        self.times_used += 1;
        self.success_count += 1;
        let n = f64::from(self.times_used);
        self.avg_execution_ms = (self.avg_execution_ms * (n - 1.0) + execution_ms) / n;
        self.updated_at = Utc::now();
    }

    /// Count a reuse whose crawl failed. The average is left alone.
    pub fn record_failure(&mut self) {
        self.times_used += 1;
        self.failure_count += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let mut strategy = NavigationStrategy::learned(
            "shop.example",
            "https://shop.example/*",
            vec![NavigationStep::new(NavigationAction::Click).with_target("#next")],
            1000.0,
            Uuid::new_v4(),
        );
        strategy.record_success(2000.0);
        assert_eq!(strategy.times_used, 2);
        assert_eq!(strategy.success_count, 2);
        assert!((strategy.avg_execution_ms - 1500.0).abs() < f64::EPSILON);

        strategy.record_success(3000.0);
        assert!((strategy.avg_execution_ms - 2000.0).abs() < f64::EPSILON);
        assert!((strategy.success_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failure_lowers_success_rate() {
        let mut strategy = NavigationStrategy::learned("a.com", "https://a.com/*", vec![], 10.0, Uuid::new_v4());
        strategy.record_failure();
        assert_eq!(strategy.times_used, 2);
        assert_eq!(strategy.failure_count, 1);
        assert!((strategy.success_rate() - 0.5).abs() < f64::EPSILON);
        assert!((strategy.avg_execution_ms - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unused_template_has_zero_rate() {
        let strategy = NavigationStrategy::template("a.com", "https://a.com/*", vec![]);
        assert_eq!(strategy.success_rate(), 0.0);
    }

    #[test]
    fn test_step_serialization_uses_snake_case_and_fallback() {
        let step: NavigationStep = serde_json::from_value(serde_json::json!({
            "action": "paginate",
            "target": "a.next",
            "parameters": {"max": 3}
        }))
        .unwrap();
        assert_eq!(step.action, NavigationAction::Paginate);

        let custom: NavigationStep =
            serde_json::from_value(serde_json::json!({"action": "hover"})).unwrap();
        assert_eq!(custom.action, NavigationAction::Other("hover".into()));
        assert!(custom.parameters.is_empty());
    }
}
