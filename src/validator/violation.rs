//! Violations
//!
//! A violation is one independent problem found in a decoded workflow. It
//! carries a machine-checkable rule kind, the path of the offending field,
//! the offending value and a readable message.

use std::fmt;

use serde::Serialize;

/// Rule a violation was raised by.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// A name does not resolve
    Exists,
    /// A mandatory field or group is empty
    Required,
    /// More than one field of an exclusive group is set
    Exclusive,
    /// A name repeats within a collection
    Unique,
    /// A transition or compensation points back at its own state
    Recursive,
    /// An integer must be strictly positive
    Gt0,
    /// A value is not an ISO 8601 duration
    Duration,
    /// The compensation subgraph is not isolated
    Compensation,
    /// An expression was rejected by the configured checker
    Expression,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Required => "required",
            Self::Exclusive => "exclusive",
            Self::Unique => "unique",
            Self::Recursive => "recursive",
            Self::Gt0 => "gt0",
            Self::Duration => "duration",
            Self::Compensation => "compensation",
            Self::Expression => "expression",
        }
    }

    /// Error category the rule belongs to.
    pub fn category(&self) -> Category {
        match self {
            Self::Exists => Category::Reference,
            Self::Unique => Category::Uniqueness,
            Self::Required | Self::Exclusive => Category::Exclusivity,
            Self::Recursive | Self::Compensation => Category::Structural,
            Self::Gt0 => Category::Range,
            Self::Duration | Self::Expression => Category::Format,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping of rule kinds.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Reference,
    Uniqueness,
    Exclusivity,
    Structural,
    Range,
    Format,
}

/// One validation failure.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub rule: RuleKind,
    /// Offending value as written, empty when the field is missing
    pub value: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        path: impl Into<String>,
        rule: RuleKind,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            rule,
            value: value.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> Category {
        self.rule.category()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
