use tracing::{info, warn};

use super::{Rule, RuleKey, RuleSet, SCHEMA_VERSION};
use crate::error::{Result, StoreError};
use crate::persistence::RulePersistence;

/// CRUD over a `RuleSet`, saving through `P` after every change.
///
/// Mutators take `&mut self`; hosts that share a store between threads
/// wrap it in a `Mutex` so each read-modify-save runs alone.
///
/// A failed save is reported as `StoreError::Persistence` but the
/// in-memory change is kept.
pub struct RuleStore<P: RulePersistence> {
    persistence: P,
    rules: RuleSet,
}

impl<P: RulePersistence> RuleStore<P> {
    /// Load the rule set through `persistence`.
    pub fn open(persistence: P) -> Self {
        let rules = persistence.load();
        info!(
            "Rule store ready with {} rules ({})",
            rules.len(),
            if rules.enabled { "enabled" } else { "disabled" }
        );
        Self { persistence, rules }
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules.rules
    }

    pub fn is_enabled(&self) -> bool {
        self.rules.enabled
    }

    pub fn find(&self, pattern: &str, is_regex: bool) -> Option<&Rule> {
        self.rules
            .position(pattern, is_regex)
            .map(|index| &self.rules.rules[index])
    }

    pub fn display_lines(&self) -> Vec<String> {
        self.rules.rules.iter().map(Rule::display_line).collect()
    }

    pub fn add(&mut self, pattern: &str, is_regex: bool, replacement: &str) -> Result<()> {
        if pattern.is_empty() {
            return Err(StoreError::EmptyPattern);
        }
        if self.rules.contains_key(pattern, is_regex) {
            return Err(StoreError::Duplicate {
                key: RuleKey::new(pattern, is_regex),
            });
        }

        self.rules.rules.push(Rule::new(pattern, is_regex, replacement));
        self.rules.sort();
        self.persist()
    }

    /// Replace the rule identified by `old`'s key.
    ///
    /// If the new key already belongs to a different rule, `old` is removed
    /// and that other rule is left as it is: the existing identity wins and
    /// no duplicate is created.
    pub fn update(
        &mut self,
        old: &Rule,
        new_pattern: &str,
        new_is_regex: bool,
        new_replacement: &str,
    ) -> Result<()> {
        if new_pattern.is_empty() {
            return Err(StoreError::EmptyPattern);
        }

        let index = self
            .rules
            .position(&old.pattern, old.is_regex)
            .ok_or_else(|| StoreError::NotFound { key: old.key() })?;

        let collides = self
            .rules
            .rules
            .iter()
            .enumerate()
            .any(|(i, r)| i != index && r.has_key(new_pattern, new_is_regex));

        if collides {
            warn!(
                "Update of '{}' collides with an existing '{}'; dropping the original",
                old.key(),
                RuleKey::new(new_pattern, new_is_regex)
            );
            self.rules.rules.remove(index);
        } else {
            self.rules.rules[index] = Rule::new(new_pattern, new_is_regex, new_replacement);
        }

        self.rules.sort();
        self.persist()
    }

    /// Remove the rule equal to `rule` in all three fields.
    pub fn remove(&mut self, rule: &Rule) -> Result<()> {
        let index = self
            .rules
            .rules
            .iter()
            .position(|r| r == rule)
            .ok_or_else(|| StoreError::NotFound { key: rule.key() })?;

        self.rules.rules.remove(index);
        self.persist()
    }

    pub fn reset_to_defaults(&mut self) -> Result<()> {
        let mut defaults = RuleSet::new(self.persistence.default_rules(), self.rules.enabled);
        defaults.schema_version = self.rules.schema_version.clone();
        self.rules = defaults;
        info!("Rules reset to {} defaults", self.rules.len());
        self.persist()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.rules.enabled = enabled;
        self.persist()
    }

    /// Flip the enabled flag; returns the new state.
    pub fn toggle_enabled(&mut self) -> Result<bool> {
        let enabled = !self.rules.enabled;
        self.set_enabled(enabled)?;
        info!("Corrections {}", if enabled { "enabled" } else { "disabled" });
        Ok(enabled)
    }

    fn persist(&mut self) -> Result<()> {
        self.persistence.save(&self.rules)?;
        self.rules.schema_version = SCHEMA_VERSION.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::persistence::{JsonRuleFile, MockRulePersistence};
    use crate::rules::LEGACY_SCHEMA_VERSION;
    use std::io;
    use tempfile::TempDir;

    fn mock_with(rules: Vec<Rule>) -> MockRulePersistence {
        let mut mock = MockRulePersistence::new();
        let set = RuleSet::new(rules, true);
        mock.expect_load().return_once(move || set);
        mock.expect_default_rules()
            .returning(|| vec![Rule::literal("เเ", "แ")]);
        mock
    }

    fn saving(mut mock: MockRulePersistence) -> MockRulePersistence {
        mock.expect_save().returning(|_| Ok(()));
        mock
    }

    fn patterns<P: RulePersistence>(store: &RuleStore<P>) -> Vec<&str> {
        store.rules().iter().map(|r| r.pattern.as_str()).collect()
    }

    #[test]
    fn test_add_sorts_and_saves() {
        let mut mock = mock_with(vec![Rule::literal("m", "")]);
        mock.expect_save()
            .withf(|set: &RuleSet| set.len() == 2)
            .times(1)
            .returning(|_| Ok(()));
        let mut store = RuleStore::open(mock);

        store.add("B", false, "b").unwrap();
        assert_eq!(patterns(&store), vec!["B", "m"]);
    }

    #[test]
    fn test_add_duplicate_is_rejected() {
        let mut store = RuleStore::open(saving(mock_with(vec![])));

        store.add("foo", false, "bar").unwrap();
        let second = store.add("foo", false, "baz");

        assert!(matches!(second, Err(StoreError::Duplicate { .. })));
        assert_eq!(store.rules().len(), 1);
        assert_eq!(store.rules()[0].replacement, "bar");

        // Same pattern as a regex is a different key.
        store.add("foo", true, "qux").unwrap();
        assert_eq!(store.rules().len(), 2);
    }

    #[test]
    fn test_empty_pattern_is_rejected() {
        let mut mock = mock_with(vec![Rule::literal("a", "1")]);
        mock.expect_save().never();
        let mut store = RuleStore::open(mock);

        assert!(matches!(store.add("", false, "x"), Err(StoreError::EmptyPattern)));
        assert!(matches!(store.add("", true, "x"), Err(StoreError::EmptyPattern)));
        assert!(matches!(
            store.update(&Rule::literal("a", "1"), "", false, "x"),
            Err(StoreError::EmptyPattern)
        ));
        assert_eq!(store.rules(), &[Rule::literal("a", "1")]);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut store = RuleStore::open(saving(mock_with(vec![
            Rule::literal("a", "1"),
            Rule::literal("c", "3"),
        ])));

        let old = Rule::literal("a", "1");
        store.update(&old, "z", true, "26").unwrap();

        assert_eq!(store.rules(), &[Rule::literal("c", "3"), Rule::regex("z", "26")]);
    }

    #[test]
    fn test_update_matches_old_rule_by_key_only() {
        let mut store = RuleStore::open(saving(mock_with(vec![Rule::literal("a", "current")])));

        let stale = Rule::literal("a", "outdated");
        store.update(&stale, "a", false, "new").unwrap();
        assert_eq!(store.rules(), &[Rule::literal("a", "new")]);
    }

    #[test]
    fn test_update_collision_drops_original() {
        let mut store = RuleStore::open(saving(mock_with(vec![
            Rule::literal("x", "from-x"),
            Rule::literal("y", "from-y"),
        ])));

        store
            .update(&Rule::literal("x", "from-x"), "y", false, "renamed")
            .unwrap();

        assert_eq!(store.rules(), &[Rule::literal("y", "from-y")]);
    }

    #[test]
    fn test_update_missing_rule_is_not_found() {
        let mut mock = mock_with(vec![Rule::literal("a", "")]);
        mock.expect_save().never();
        let mut store = RuleStore::open(mock);

        let result = store.update(&Rule::regex("a", ""), "b", false, "");
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(patterns(&store), vec!["a"]);
    }

    #[test]
    fn test_remove_requires_exact_match() {
        let mut store = RuleStore::open(saving(mock_with(vec![Rule::literal("a", "1")])));

        let result = store.remove(&Rule::literal("a", "2"));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(store.rules().len(), 1);

        store.remove(&Rule::literal("a", "1")).unwrap();
        assert!(store.rules().is_empty());
    }

    #[test]
    fn test_reset_to_defaults_keeps_enabled_flag() {
        let mut store = RuleStore::open(saving(mock_with(vec![Rule::literal("x", "")])));
        store.set_enabled(false).unwrap();

        store.reset_to_defaults().unwrap();
        assert_eq!(store.rules(), &[Rule::literal("เเ", "แ")]);
        assert!(!store.is_enabled());
    }

    #[test]
    fn test_toggle_enabled() {
        let mut store = RuleStore::open(saving(mock_with(vec![])));
        assert!(store.is_enabled());
        assert!(!store.toggle_enabled().unwrap());
        assert!(store.toggle_enabled().unwrap());
    }

    #[test]
    fn test_failed_save_keeps_in_memory_change() {
        let mut mock = mock_with(vec![]);
        mock.expect_save().returning(|_| {
            Err(PersistenceError::from(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        });
        let mut store = RuleStore::open(mock);

        let result = store.add("teh", false, "the");
        assert!(matches!(result, Err(StoreError::Persistence { .. })));
        assert!(store.find("teh", false).is_some());
    }

    #[test]
    fn test_successful_save_upgrades_schema_version() {
        let mut mock = MockRulePersistence::new();
        mock.expect_load().return_once(|| RuleSet {
            schema_version: LEGACY_SCHEMA_VERSION.to_string(),
            ..RuleSet::default()
        });
        let mut store = RuleStore::open(saving(mock));
        assert_eq!(store.rule_set().schema_version, LEGACY_SCHEMA_VERSION);

        store.set_enabled(true).unwrap();
        assert_eq!(store.rule_set().schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_display_lines() {
        let store = RuleStore::open(mock_with(vec![
            Rule::regex("a+", "b"),
            Rule::literal("c", ""),
        ]));
        assert_eq!(store.display_lines(), vec!["[Regex] a+  b", "c"]);
    }

    #[test]
    fn test_changes_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let file = JsonRuleFile::new(
            temp_dir.path().join("rules.json"),
            temp_dir.path().join("dictionary.json"),
        );

        let mut store = RuleStore::open(file.clone());
        store.add("teh", false, "the").unwrap();
        store.set_enabled(false).unwrap();

        let reopened = RuleStore::open(file);
        assert_eq!(reopened.rule_set(), store.rule_set());
        assert!(!reopened.is_enabled());
        assert!(reopened.find("teh", false).is_some());
    }
}
