//! Rule application
//!
//! Corrections run in two passes over the running text:
//!
//! 1. Literal rules, longest pattern first, each a global non-overlapping
//!    substring replacement.
//! 2. Regex rules, in rule-set order, each a global substitution. A rule
//!    whose pattern does not compile, or whose replacement is malformed or
//!    names a group the pattern lacks, is skipped and reported in
//!    `Correction::issues`.
//!
//! Regex replacements are backslash templates: `\1` or `\g<name>` insert a
//! group, `\\` and the usual `\n`-style escapes insert characters, and
//! everything else (including `$`) is literal.
//!
//! The live path is gated by `RuleSet::enabled`; the manual path is not.

use std::cmp::Reverse;

use regex::Regex;
use tracing::{debug, error};

use crate::rules::{Rule, RuleSet};

/// A regex rule that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternIssue {
    pub pattern: String,
    pub reason: String,
}

/// Result of running the engine over one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    text: String,
    issues: Vec<PatternIssue>,
    changed: bool,
}

impl Correction {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            issues: Vec::new(),
            changed: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Regex rules skipped during this run, in the order they were met.
    pub fn issues(&self) -> &[PatternIssue] {
        &self.issues
    }

    /// Whether the output differs from the input.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

pub struct CorrectionEngine;

impl CorrectionEngine {
    /// Passive correction of outgoing text. Identity when the rule set is
    /// disabled or empty.
    pub fn live(text: &str, rules: &RuleSet) -> Correction {
        if !rules.enabled || rules.is_empty() {
            return Correction::unchanged(text);
        }
        Self::apply(text, &rules.rules)
    }

    /// Explicit, user-requested correction. Ignores the enabled flag.
    pub fn manual(text: &str, rules: &RuleSet) -> Correction {
        Self::apply(text, &rules.rules)
    }

    /// Run both passes over `text`.
    pub fn apply(text: &str, rules: &[Rule]) -> Correction {
        let (literals, patterns): (Vec<&Rule>, Vec<&Rule>) = rules
            .iter()
            .filter(|r| !r.pattern.is_empty())
            .partition(|r| !r.is_regex);

        let mut issues = Vec::new();
        let corrected = Self::literal_pass(text.to_string(), literals);
        let corrected = Self::regex_pass(corrected, &patterns, &mut issues);

        let changed = corrected != text;
        if changed {
            debug!("Corrected {:?} -> {:?}", text, corrected);
        }

        Correction {
            text: corrected,
            issues,
            changed,
        }
    }

    fn literal_pass(mut text: String, mut literals: Vec<&Rule>) -> String {
        // Longest first so a short pattern never fires inside a longer one.
        literals.sort_by_key(|r| Reverse(r.pattern.chars().count()));

        for rule in literals {
            if text.contains(rule.pattern.as_str()) {
                text = text.replace(rule.pattern.as_str(), &rule.replacement);
            }
        }
        text
    }

    fn regex_pass(mut text: String, patterns: &[&Rule], issues: &mut Vec<PatternIssue>) -> String {
        for rule in patterns {
            let (re, expansion) = match Self::compile(rule) {
                Ok(compiled) => compiled,
                Err(reason) => {
                    error!("Invalid regex skipped: '{}'. Error: {}", rule.pattern, reason);
                    issues.push(PatternIssue {
                        pattern: rule.pattern.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let replaced = re.replace_all(&text, expansion.as_str()).into_owned();
            text = replaced;
        }
        text
    }

    /// The compiled pattern and its replacement in `regex` expansion syntax.
    fn compile(rule: &Rule) -> Result<(Regex, String), String> {
        let re = Regex::new(&rule.pattern).map_err(|e| e.to_string())?;
        let expansion = translate_template(&re, &rule.replacement)?;
        Ok((re, expansion))
    }
}

fn is_octal(c: char) -> bool {
    ('0'..='7').contains(&c)
}

/// `$` is the only character `regex` treats specially in an expansion.
fn push_literal(out: &mut String, c: char) {
    if c == '$' {
        out.push_str("$$");
    } else {
        out.push(c);
    }
}

fn push_octal(out: &mut String, digits: &[char]) -> Result<(), String> {
    let digits: String = digits.iter().collect();
    let value = u32::from_str_radix(&digits, 8).map_err(|e| e.to_string())?;
    match u8::try_from(value) {
        Ok(byte) => {
            push_literal(out, char::from(byte));
            Ok(())
        }
        Err(_) => Err(format!("octal escape \\{} is out of range", digits)),
    }
}

fn push_group(re: &Regex, name: &str, out: &mut String) -> Result<(), String> {
    let known = match name.parse::<usize>() {
        Ok(index) => index < re.captures_len(),
        Err(_) => re.capture_names().flatten().any(|n| n == name),
    };
    if !known {
        return Err(format!("replacement refers to unknown group '{}'", name));
    }

    out.push_str("${");
    out.push_str(name);
    out.push('}');
    Ok(())
}

/// Rewrite a backslash replacement template for `re` into `regex`
/// expansion syntax.
///
/// `\N` and `\NN` are group numbers, `\g<name>` and `\g<N>` name a group,
/// three octal digits (or `\0` plus up to two) give a character. Escaped
/// ASCII letters other than `a b f n r t v g` are errors; any other escaped
/// character is kept with its backslash.
fn translate_template(re: &Regex, template: &str) -> Result<String, String> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' {
            push_literal(&mut out, c);
            continue;
        }

        let Some(&escaped) = chars.get(i) else {
            return Err("replacement ends with a lone backslash".to_string());
        };
        i += 1;

        match escaped {
            'g' => {
                let rest = &chars[i..];
                if rest.first() != Some(&'<') {
                    return Err("missing '<' after \\g in replacement".to_string());
                }
                let end = rest
                    .iter()
                    .position(|&c| c == '>')
                    .ok_or_else(|| "missing '>' in \\g<...> group reference".to_string())?;
                let name: String = rest[1..end].iter().collect();
                push_group(re, &name, &mut out)?;
                i += end + 1;
            }
            '0' => {
                let start = i - 1;
                while i < chars.len() && i - start < 3 && is_octal(chars[i]) {
                    i += 1;
                }
                push_octal(&mut out, &chars[start..i])?;
            }
            '1'..='9' => {
                let next = chars.get(i).copied();
                let after = chars.get(i + 1).copied();
                if is_octal(escaped) && next.map_or(false, is_octal) && after.map_or(false, is_octal) {
                    push_octal(&mut out, &chars[i - 1..i + 2])?;
                    i += 2;
                } else {
                    let mut name = escaped.to_string();
                    if let Some(d) = next.filter(char::is_ascii_digit) {
                        name.push(d);
                        i += 1;
                    }
                    push_group(re, &name, &mut out)?;
                }
            }
            '\\' => out.push('\\'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            c if c.is_ascii_alphabetic() => {
                return Err(format!("bad escape \\{} in replacement", c));
            }
            other => {
                out.push('\\');
                push_literal(&mut out, other);
            }
        }
    }

    Ok(out)
}
