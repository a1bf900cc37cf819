//! Heuristic detector rules.
//!
//! # Responsibilities
//! - Flag metacharacters common to SQL and shell injection
//! - Flag SQL tautologies, `union select` and keyword pairs
//!
//! # Design Decisions
//! - Purely lexical; no quoting context, so punctuation in legitimate text
//!   is flagged too
//! - Rules receive text that is already trimmed and lower-cased
//! - Literal tokens use substring search, structure uses regex

use once_cell::sync::Lazy;
use regex::Regex;

/// A single named detection heuristic.
pub trait DetectorRule: Send + Sync + std::fmt::Debug {
    /// Rule identifier used in logs.
    fn name(&self) -> &str;

    /// Returns true if the normalized text matches this rule.
    fn matches(&self, text: &str) -> bool;
}

/// Matches when any of a fixed set of tokens occurs in the text.
#[derive(Debug, Clone)]
pub struct TokenRule {
    name: &'static str,
    tokens: &'static [&'static str],
}

impl TokenRule {
    pub const fn new(name: &'static str, tokens: &'static [&'static str]) -> Self {
        Self { name, tokens }
    }
}

impl DetectorRule for TokenRule {
    fn name(&self) -> &str {
        self.name
    }

    fn matches(&self, text: &str) -> bool {
        self.tokens.iter().any(|token| text.contains(token))
    }
}

/// Matches a compiled regular expression.
#[derive(Debug, Clone)]
pub struct PatternRule {
    name: &'static str,
    pattern: &'static Regex,
}

impl PatternRule {
    pub fn new(name: &'static str, pattern: &'static Regex) -> Self {
        Self { name, pattern }
    }
}

impl DetectorRule for PatternRule {
    fn name(&self) -> &str {
        self.name
    }

    fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

static TAUTOLOGY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(or|and)\s*'?1'?\s*=\s*'?1'?\b").unwrap());

static UNION_SELECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bunion\s+select\b").unwrap());

static STATEMENT_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(select|insert|update|delete|drop|alter|create)\b.*\b(from|into|table)\b")
        .unwrap()
});

/// Metacharacter rules shared by both detectors, in evaluation order.
pub fn generic_rules() -> Vec<Box<dyn DetectorRule>> {
    vec![
        Box::new(TokenRule::new("quote", &["'", "\""])),
        Box::new(TokenRule::new("statement_terminator", &[";"])),
        Box::new(TokenRule::new("sql_comment", &["--", "/*", "*/"])),
        Box::new(TokenRule::new("shell_operator", &["&&", "|"])),
    ]
}

/// Rules specific to SQL, evaluated after the generic set.
pub fn sql_rules() -> Vec<Box<dyn DetectorRule>> {
    vec![
        Box::new(PatternRule::new("tautology", &TAUTOLOGY)),
        Box::new(PatternRule::new("union_select", &UNION_SELECT)),
        Box::new(PatternRule::new("statement_keywords", &STATEMENT_KEYWORDS)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule<'a>(rules: &'a [Box<dyn DetectorRule>], name: &str) -> &'a dyn DetectorRule {
        rules.iter().find(|r| r.name() == name).unwrap().as_ref()
    }

    #[test]
    fn test_generic_tokens() {
        let rules = generic_rules();
        assert!(rule(&rules, "quote").matches("o'brien"));
        assert!(rule(&rules, "quote").matches("say \"hi\""));
        assert!(rule(&rules, "statement_terminator").matches("1; ls"));
        assert!(rule(&rules, "sql_comment").matches("admin--"));
        assert!(rule(&rules, "sql_comment").matches("/* x */"));
        assert!(rule(&rules, "shell_operator").matches("127.0.0.1 && id"));
        assert!(rule(&rules, "shell_operator").matches("a|b"));
        assert!(!rule(&rules, "shell_operator").matches("a & b"));
        assert!(!rule(&rules, "sql_comment").matches("a-b"));
    }

    #[test]
    fn test_tautology() {
        let rules = sql_rules();
        let tautology = rule(&rules, "tautology");
        assert!(tautology.matches("x or 1=1"));
        assert!(tautology.matches("x and '1' = '1'"));
        assert!(tautology.matches("x or'1'='1"));
        assert!(!tautology.matches("color 1=1"));
        assert!(!tautology.matches("or 1=12"));
    }

    #[test]
    fn test_union_select() {
        let rules = sql_rules();
        let union = rule(&rules, "union_select");
        assert!(union.matches("1 union   select password"));
        assert!(!union.matches("union all select"));
        assert!(!union.matches("reunion selection"));
    }

    #[test]
    fn test_statement_keywords_require_order() {
        let rules = sql_rules();
        let keywords = rule(&rules, "statement_keywords");
        assert!(keywords.matches("select name from users"));
        assert!(keywords.matches("drop table users"));
        assert!(keywords.matches("insert x into y"));
        assert!(!keywords.matches("from a select"));
        assert!(!keywords.matches("selected items from list"));
    }
}
