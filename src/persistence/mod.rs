//! Durable storage for the rule set
//!
//! The record is a JSON document:
//!
//! ```text
//! {"entries": [{"value", "is_regex", "replacement"}, ...], "enabled": bool, "version": "1.1"}
//! ```
//!
//! A bare array of entries (the oldest layout) is still accepted on load.
//! When no record exists, or it cannot be parsed, the default dictionary is
//! loaded and written back immediately.

pub mod defaults;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::PersistenceError;
use crate::rules::{Rule, RuleSet, LEGACY_SCHEMA_VERSION, SCHEMA_VERSION};

/// Storage backend for a `RuleStore`
#[cfg_attr(test, mockall::automock)]
pub trait RulePersistence {
    /// Load the persisted rule set, bootstrapping defaults when needed.
    /// Never fails.
    fn load(&self) -> RuleSet;

    /// Write the rule set out in the current schema.
    fn save(&self, rules: &RuleSet) -> Result<(), PersistenceError>;

    /// The seed rules used for bootstrap and reset.
    fn default_rules(&self) -> Vec<Rule>;
}

#[derive(Serialize)]
struct RecordOut<'a> {
    entries: &'a [Rule],
    enabled: bool,
    version: &'static str,
}

/// Only `entries` must be well formed. A mistyped `enabled` reads as true
/// and a mistyped `version` as missing.
#[derive(Deserialize)]
struct RecordIn {
    #[serde(default)]
    entries: Vec<Rule>,
    #[serde(default)]
    enabled: Option<Value>,
    #[serde(default)]
    version: Option<Value>,
}

impl RecordIn {
    fn enabled(&self) -> bool {
        match &self.enabled {
            None | Some(Value::Null) => true,
            Some(Value::Bool(enabled)) => *enabled,
            Some(other) => {
                warn!("Record field 'enabled' is {}, treating it as true", json_kind(other));
                true
            }
        }
    }

    fn schema_version(&self) -> String {
        match &self.version {
            Some(Value::String(version)) => version.clone(),
            None | Some(Value::Null) => LEGACY_SCHEMA_VERSION.to_string(),
            Some(other) => {
                warn!("Record field 'version' is {}, ignoring it", json_kind(other));
                LEGACY_SCHEMA_VERSION.to_string()
            }
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a persisted record in either the current or the legacy layout.
pub fn parse_record(contents: &str) -> Result<RuleSet, PersistenceError> {
    let value: Value = serde_json::from_str(contents)?;

    let mut set = match value {
        Value::Object(_) => {
            let record: RecordIn = serde_json::from_value(value)?;
            let enabled = record.enabled();
            let schema_version = record.schema_version();
            RuleSet {
                rules: record.entries,
                enabled,
                schema_version,
            }
        }
        Value::Array(_) => RuleSet {
            rules: serde_json::from_value(value)?,
            enabled: true,
            schema_version: LEGACY_SCHEMA_VERSION.to_string(),
        },
        other => {
            return Err(PersistenceError::UnsupportedShape {
                found: json_kind(&other),
            })
        }
    };

    let dropped = set.normalize();
    if dropped > 0 {
        warn!("Dropped {} duplicate rule(s) from the stored record", dropped);
    }
    Ok(set)
}

/// Render a rule set as a current-schema record.
pub fn render_record(rules: &RuleSet) -> Result<String, PersistenceError> {
    let record = RecordOut {
        entries: &rules.rules,
        enabled: rules.enabled,
        version: SCHEMA_VERSION,
    };
    Ok(serde_json::to_string_pretty(&record)?)
}

/// File-backed persistence: the user record plus a bundled seed dictionary.
#[derive(Debug, Clone)]
pub struct JsonRuleFile {
    record_path: PathBuf,
    dictionary_path: PathBuf,
}

impl JsonRuleFile {
    pub fn new(record_path: impl Into<PathBuf>, dictionary_path: impl Into<PathBuf>) -> Self {
        Self {
            record_path: record_path.into(),
            dictionary_path: dictionary_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.rules_path, &config.dictionary_path)
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// `Ok(None)` when there is no record yet.
    fn read_record(&self) -> Result<Option<RuleSet>, PersistenceError> {
        match fs::read_to_string(&self.record_path) {
            Ok(contents) => parse_record(&contents).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn bootstrap(&self) -> RuleSet {
        let set = RuleSet::new(self.default_rules(), true);
        match self.save(&set) {
            Ok(()) => info!(
                "Seeded {} with {} default rules",
                self.record_path.display(),
                set.len()
            ),
            Err(e) => error!("Failed to save default rules: {}", e),
        }
        set
    }
}

impl RulePersistence for JsonRuleFile {
    fn load(&self) -> RuleSet {
        match self.read_record() {
            Ok(Some(set)) => {
                info!(
                    "Loaded {} rules from {} (schema {})",
                    set.len(),
                    self.record_path.display(),
                    set.schema_version
                );
                set
            }
            Ok(None) => {
                warn!(
                    "No rule record at {}, using the default dictionary",
                    self.record_path.display()
                );
                self.bootstrap()
            }
            Err(e) => {
                error!("Error loading rules from {}: {}", self.record_path.display(), e);
                self.bootstrap()
            }
        }
    }

    fn save(&self, rules: &RuleSet) -> Result<(), PersistenceError> {
        let contents = render_record(rules)?;

        if let Some(parent) = self.record_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.record_path, contents)?;
        Ok(())
    }

    fn default_rules(&self) -> Vec<Rule> {
        defaults::load_dictionary(&self.dictionary_path)
    }
}
