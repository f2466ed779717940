//! Dictionary-driven text correction
//!
//! A user-editable set of find/replace rules (literal substrings or regular
//! expressions) applied deterministically to arbitrary text.
//!
//! - `rules`: the rule model and `RuleStore` CRUD
//! - `persistence`: the JSON record, legacy layouts and the seed dictionary
//! - `engine`: `CorrectionEngine`, the literal and regex passes
//! - `config`: where the record and seed dictionary live

pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod rules;

pub use config::Config;
pub use engine::{Correction, CorrectionEngine, PatternIssue};
pub use error::{ConfigError, PersistenceError, StoreError};
pub use persistence::{JsonRuleFile, RulePersistence};
pub use rules::{Rule, RuleKey, RuleSet, RuleStore};
