//! Seed dictionary loading
//!
//! Seed files are JSON arrays whose items come in three historical shapes:
//!
//! - `{"value": "...", "is_regex": bool, "replacement": "..."}` (current)
//! - `{"pattern": "replacement"}` or `{"pattern": [["replacement", ...]]}`
//! - `"pattern"` (delete every occurrence)
//!
//! Each item is classified into a `SeedItem` and normalized into `Rule`s.
//! A configured dictionary file is tried first, then the copy of
//! `dictionary/default.json` compiled into the binary, then a small built-in
//! list of Thai vowel-sign fixes, which cannot fail.

use std::fs;
use std::io;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::json_kind;
use crate::error::PersistenceError;
use crate::rules::Rule;

/// `dictionary/default.json`, as shipped.
pub const BUNDLED_DICTIONARY: &str = include_str!("../../dictionary/default.json");

static BUILTIN_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::literal("ำ่", "่ำ"),
        Rule::literal("ำ้", "้ำ"),
        Rule::literal("เเ", "แ"),
        Rule::literal("ํา", "ำ"),
        Rule::literal("ํ่า", "่ำ"),
        Rule::literal("ํ้า", "้ำ"),
    ]
});

/// Last-resort dictionary.
pub fn builtin_rules() -> Vec<Rule> {
    BUILTIN_RULES.clone()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CanonicalSeed {
    pub value: String,
    pub is_regex: bool,
    #[serde(default)]
    pub replacement: String,
}

/// One item of a seed dictionary array.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedItem {
    Canonical(CanonicalSeed),
    /// `{pattern: replacement-or-nested-list}`; every key becomes a literal rule.
    Mapping(Map<String, Value>),
    Bare(String),
    Unsupported(&'static str),
}

impl SeedItem {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::String(pattern) => SeedItem::Bare(pattern),
            Value::Object(map) if map.contains_key("value") && map.contains_key("is_regex") => {
                match serde_json::from_value(Value::Object(map)) {
                    Ok(seed) => SeedItem::Canonical(seed),
                    Err(e) => {
                        warn!("Skipping malformed dictionary entry: {}", e);
                        SeedItem::Unsupported("a malformed entry")
                    }
                }
            }
            Value::Object(map) => SeedItem::Mapping(map),
            other => SeedItem::Unsupported(json_kind(&other)),
        }
    }

    pub fn into_rules(self) -> Vec<Rule> {
        match self {
            SeedItem::Canonical(seed) => {
                vec![Rule::new(seed.value, seed.is_regex, seed.replacement)]
            }
            SeedItem::Mapping(map) => map
                .into_iter()
                .map(|(pattern, value)| Rule::literal(pattern, mapping_replacement(&value)))
                .collect(),
            SeedItem::Bare(pattern) => vec![Rule::literal(pattern, "")],
            SeedItem::Unsupported(_) => Vec::new(),
        }
    }
}

/// Replacement text of a mapping entry: either the string itself or the
/// first element of the first inner list. Anything else deletes.
fn mapping_replacement(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(outer) => match outer.first() {
            Some(Value::Array(inner)) => inner
                .first()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

/// Normalize a seed dictionary document into rules, in file order.
pub fn parse_dictionary(contents: &str) -> Result<Vec<Rule>, PersistenceError> {
    let items = match serde_json::from_str::<Value>(contents)? {
        Value::Array(items) => items,
        other => {
            return Err(PersistenceError::UnsupportedShape {
                found: json_kind(&other),
            })
        }
    };

    Ok(items
        .into_iter()
        .map(SeedItem::classify)
        .flat_map(SeedItem::into_rules)
        .collect())
}

/// Parsed seed rules, or `None` (logged) when `source` gave nothing usable.
fn usable(parsed: Result<Vec<Rule>, PersistenceError>, source: &str) -> Option<Vec<Rule>> {
    match parsed {
        Ok(rules) if rules.is_empty() => {
            warn!("Default dictionary {} has no usable entries", source);
            None
        }
        Ok(rules) => Some(rules),
        Err(e) => {
            error!("Error loading default dictionary {}: {}", source, e);
            None
        }
    }
}

/// The dictionary compiled into the binary, or the built-in rules.
pub fn bundled_rules() -> Vec<Rule> {
    usable(parse_dictionary(BUNDLED_DICTIONARY), "(bundled)").unwrap_or_else(builtin_rules)
}

/// Load the seed dictionary at `path`, falling back to `bundled_rules`.
/// Never returns an empty list.
pub fn load_dictionary(path: &Path) -> Vec<Rule> {
    let source = path.display().to_string();
    let from_file = match fs::read_to_string(path) {
        Ok(contents) => usable(parse_dictionary(&contents), &source),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No dictionary override at {}, using the bundled one", source);
            None
        }
        Err(e) => {
            error!("Error reading default dictionary {}: {}", source, e);
            None
        }
    };

    from_file.unwrap_or_else(bundled_rules)
}
