//! Collaborator contracts.
//!
//! Everything the core talks to sits behind one of these traits so the
//! orchestration logic can run against in-memory mocks in tests.

pub mod agent;
pub mod analyzer;
pub mod llm;
pub mod publisher;
pub mod quota;
pub mod search;
pub mod store;
