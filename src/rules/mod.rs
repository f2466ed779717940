//! Correction rules and the rule set they live in
//!
//! - `Rule`: one pattern → replacement directive, literal or regex
//! - `RuleKey`: the `(pattern, is_regex)` identity two rules may never share
//! - `RuleSet`: the ordered rules plus the global enabled flag
//! - `store`: CRUD over a `RuleSet`, persisting after every change

pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use store::RuleStore;

/// Version tag written into every saved record.
pub const SCHEMA_VERSION: &str = "1.1";

/// Version assumed for records that predate the `version` field.
pub const LEGACY_SCHEMA_VERSION: &str = "1.0";

/// A single find/replace directive.
///
/// Serialized as `{"value", "is_regex", "replacement"}`. An empty
/// replacement deletes every match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "value")]
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default)]
    pub replacement: String,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, is_regex: bool, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex,
            replacement: replacement.into(),
        }
    }

    pub fn literal(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(pattern, false, replacement)
    }

    pub fn regex(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(pattern, true, replacement)
    }

    pub fn key(&self) -> RuleKey {
        RuleKey::new(self.pattern.clone(), self.is_regex)
    }

    pub fn has_key(&self, pattern: &str, is_regex: bool) -> bool {
        self.pattern == pattern && self.is_regex == is_regex
    }

    /// Listbox-style rendering: `[Regex] pattern  replacement`, with the
    /// tag and the replacement each omitted when not applicable.
    pub fn display_line(&self) -> String {
        let mut line = String::new();
        if self.is_regex {
            line.push_str("[Regex] ");
        }
        line.push_str(&self.pattern);
        if !self.replacement.is_empty() {
            line.push_str("  ");
            line.push_str(&self.replacement);
        }
        line
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

/// Uniqueness key of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub pattern: String,
    pub is_regex: bool,
}

impl RuleKey {
    pub fn new(pattern: impl Into<String>, is_regex: bool) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex,
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_regex {
            write!(f, "[Regex] {}", self.pattern)
        } else {
            f.write_str(&self.pattern)
        }
    }
}

/// The full collection of rules plus the global enabled flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub enabled: bool,
    pub schema_version: String,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            enabled: true,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, enabled: bool) -> Self {
        let mut set = Self {
            rules,
            enabled,
            schema_version: SCHEMA_VERSION.to_string(),
        };
        set.normalize();
        set
    }

    /// Restore the ordering and uniqueness invariants. Returns the number
    /// of duplicate rules dropped.
    pub fn normalize(&mut self) -> usize {
        let dropped = self.dedup_keys();
        self.sort();
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn position(&self, pattern: &str, is_regex: bool) -> Option<usize> {
        self.rules.iter().position(|r| r.has_key(pattern, is_regex))
    }

    pub fn contains_key(&self, pattern: &str, is_regex: bool) -> bool {
        self.position(pattern, is_regex).is_some()
    }

    /// Stable sort by lowercased pattern.
    pub fn sort(&mut self) {
        self.rules.sort_by_cached_key(|r| r.pattern.to_lowercase());
    }

    /// Drop rules whose key was already seen, keeping the first.
    /// Returns how many were removed.
    pub fn dedup_keys(&mut self) -> usize {
        let before = self.rules.len();
        let mut seen = std::collections::HashSet::new();
        self.rules.retain(|r| seen.insert(r.key()));
        before - self.rules.len()
    }
}
