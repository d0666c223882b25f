//! Error Reporter
//!
//! Turns the validator's violations into one deterministic report and owns
//! the wording of every validation message.
//!
//! # Ordering
//!
//! Workflow-level violations come first, then violations inside states in
//! the order the states are declared. Within each group the validator's
//! emission order (field declaration order) is kept.
//!
//! # Example
//!
//! ```
//! use swflow::report::Report;
//! use swflow::validator::{RuleKind, Violation};
//!
//! let report = Report::new(vec![
//!     Violation::new("states[1].transition.nextState", RuleKind::Exists, "X", "no state X"),
//!     Violation::new("start.stateName", RuleKind::Exists, "Y", "no state Y"),
//! ]);
//! assert_eq!(
//!     report.to_string(),
//!     "start.stateName: no state Y\nstates[1].transition.nextState: no state X"
//! );
//! ```

use std::fmt;

use crate::validator::{Category, RuleKind, Violation};

/// Ordered, immutable set of violations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    violations: Vec<Violation>,
}

impl Report {
    pub fn new(mut violations: Vec<Violation>) -> Self {
        violations.sort_by_key(|v| sort_key(&v.path));
        Self { violations }
    }

    /// True when no violation was found.
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }

    /// Violations raised by one rule.
    pub fn by_kind(&self, rule: RuleKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.rule == rule)
    }

    /// Violations in one error category.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(move |v| v.category() == category)
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

impl From<Vec<Violation>> for Report {
    fn from(violations: Vec<Violation>) -> Self {
        Self::new(violations)
    }
}

/// Workflow-level paths sort before any state; states sort by position.
fn sort_key(path: &str) -> (u8, usize) {
    match state_position(path) {
        None => (0, 0),
        Some(i) => (1, i),
    }
}

/// Parses the `N` out of a `states[N]...` path.
fn state_position(path: &str) -> Option<usize> {
    let rest = path.strip_prefix("states[")?;
    let end = rest.find(']')?;
    rest[..end].parse().ok()
}

/// Builds the message for a violation.
///
/// `field` names the offending field, `value` is what was written and
/// `param` is rule-specific: the target collection for `exists`, the
/// alternative field for `required`, the group members for `exclusive`,
/// the collection for `unique`, and the underlying reason for `duration`,
/// `compensation` and `expression`.
pub fn phrase(rule: RuleKind, field: &str, value: &str, param: &str) -> String {
    match rule {
        RuleKind::Exists => format!("{} {:?} does not match any declared {}", field, value, param),
        RuleKind::Required if param.is_empty() => format!("{} is required", field),
        RuleKind::Required => format!("{} required when {} is not defined", field, param),
        RuleKind::Exclusive => format!("{} are mutually exclusive, found {}", param, value),
        RuleKind::Unique => format!("{} has duplicate {} name {:?}", field, param, value),
        RuleKind::Recursive => format!("{} {:?} must not point at its own state", field, value),
        RuleKind::Gt0 => format!("{} must be greater than 0, found {:?}", field, value),
        RuleKind::Duration if param.is_empty() => {
            format!("{} {:?} is not a valid ISO 8601 duration", field, value)
        }
        RuleKind::Duration => format!(
            "{} {:?} is not a valid ISO 8601 duration: {}",
            field, value, param
        ),
        RuleKind::Compensation => format!("{} {:?} {}", field, value, param),
        RuleKind::Expression => format!("{} {:?} is not a valid expression: {}", field, value, param),
    }
}

/// Message for an exclusive group where none of the members is set.
pub fn phrase_none_of(members: &[&str]) -> String {
    match members {
        [only] => format!("{} is required", only),
        _ => format!("one of {} is required", members.join(", ")),
    }
}
