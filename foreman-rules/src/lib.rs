//! Rule model and storage for the Foreman dispatch system.
//!
//! A foreman rule pairs a validity window with regex conditions over client
//! attribute snapshots and a list of remote tasks to start when the rule
//! matches. This crate owns the rule data model, the condition evaluator,
//! the durable versioned rule set store and the rule management API; the
//! evaluation engine that consumes them lives in `foreman-engine`.

mod action;
mod condition;
mod error;
mod loader;
mod rule;
mod service;
mod snapshot;
mod store;

pub use action::RuleAction;
pub use condition::RegexCondition;
pub use error::RuleError;
pub use loader::load_rules;
pub use rule::ForemanRule;
pub use service::{RuleApiBuilder, RuleServiceConfig};
pub use snapshot::ClientSnapshot;
pub use store::{FileBackend, MemoryBackend, RuleSet, RuleSetBackend, RuleSetStore};
