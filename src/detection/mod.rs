//! Injection detection subsystem.
//!
//! # Data Flow
//! ```text
//! parameter value
//!     → matcher.rs (trim, lower-case)
//!     → rules.rs (generic metacharacter rules, then SQL rules)
//!     → first matching rule name, or none
//! ```
//!
//! # Design Decisions
//! - Heuristic pattern matching, never parsing
//! - Stateless: one matcher is shared by every request

pub mod matcher;
pub mod rules;

pub use matcher::{normalize, Detector, PatternMatcher};
pub use rules::{DetectorRule, PatternRule, TokenRule};
