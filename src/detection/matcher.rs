//! Pattern matcher combining the generic and SQL rule sets.

use crate::detection::rules::{generic_rules, sql_rules, DetectorRule};

/// Which rule set a check runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    /// Metacharacters shared by SQL and shell injection.
    Generic,
    /// Generic rules plus SQL structure.
    Sql,
}

/// Stateless injection detector.
#[derive(Debug)]
pub struct PatternMatcher {
    generic: Vec<Box<dyn DetectorRule>>,
    sql: Vec<Box<dyn DetectorRule>>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self {
            generic: generic_rules(),
            sql: sql_rules(),
        }
    }
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extra rule in the generic set (and therefore also the SQL set).
    pub fn with_generic_rule(mut self, rule: impl DetectorRule + 'static) -> Self {
        self.generic.push(Box::new(rule));
        self
    }

    /// Register an extra SQL-only rule.
    pub fn with_sql_rule(mut self, rule: impl DetectorRule + 'static) -> Self {
        self.sql.push(Box::new(rule));
        self
    }

    pub fn is_generic_injection(&self, text: &str) -> bool {
        self.first_match(Detector::Generic, text).is_some()
    }

    pub fn is_sql_injection(&self, text: &str) -> bool {
        self.first_match(Detector::Sql, text).is_some()
    }

    /// Name of the first rule matching `text`, if any.
    pub fn first_match(&self, detector: Detector, text: &str) -> Option<&str> {
        let text = normalize(text);
        if text.is_empty() {
            return None;
        }

        let specific: &[Box<dyn DetectorRule>] = match detector {
            Detector::Generic => &[],
            Detector::Sql => &self.sql,
        };

        self.generic
            .iter()
            .chain(specific)
            .find(|rule| rule.matches(&text))
            .map(|rule| rule.name())
    }
}

/// Trimmed, lower-cased copy used for matching and for reporting matches.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
