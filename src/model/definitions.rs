//! Named Definitions
//!
//! Flat, reusable definitions declared once at workflow level and
//! referenced by name from states and actions: functions, events, retry
//! policies and errors.

use serde::{Deserialize, Serialize};

use super::{is_true, Object};

/// Kind of operation a function definition describes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    #[default]
    Rest,
    Rpc,
    Expression,
    Graphql,
    Odata,
    Asyncapi,
    Custom,
}

/// A callable operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Function {
    pub name: String,

    /// Operation locator, e.g. `openapi.json#getPet` or an expression
    pub operation: String,

    #[serde(rename = "type")]
    pub function_type: FunctionType,

    /// Name of the auth definition used to invoke this function
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_ref: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Object>,
}

impl Function {
    pub fn new(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operation: operation.into(),
            ..Self::default()
        }
    }
}

/// Whether the workflow consumes or produces an event.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Consumed,
    Produced,
}

/// Correlates consumed events with a workflow instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Correlation {
    pub context_attribute_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_attribute_value: Option<String>,
}

/// A CloudEvent definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(rename = "type")]
    pub event_type: String,

    pub kind: EventKind,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub correlation: Vec<Correlation>,

    /// Only the event payload (not the full envelope) is exposed
    #[serde(skip_serializing_if = "is_true")]
    pub data_only: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Object>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            name: String::new(),
            source: None,
            event_type: String::new(),
            kind: EventKind::default(),
            correlation: Vec::new(),
            data_only: true,
            metadata: None,
        }
    }
}

impl Event {
    pub fn new(name: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event_type: event_type.into(),
            ..Self::default()
        }
    }
}

/// Integer value that may also be written as a string (`"5"`, `"50%"`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i64),
    String(String),
}

impl IntOrString {
    /// Parses the value as an integer, accepting a trailing `%`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::String(s) => {
                let s = s.trim();
                s.strip_suffix('%').unwrap_or(s).trim().parse().ok()
            }
        }
    }

    /// Renders the value as it was written.
    pub fn as_text(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

impl From<i64> for IntOrString {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for IntOrString {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Number that may also be written as a string (e.g. a duration).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FloatOrString {
    Float(f64),
    String(String),
}

/// Retry policy for failed actions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Retry {
    pub name: String,

    /// Time delay between attempts (ISO 8601 duration)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<String>,

    /// Static duration added to the delay on each attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<FloatOrString>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<IntOrString>,

    /// Fraction (0.0 - 1.0) or absolute duration of random jitter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<FloatOrString>,
}

impl Retry {
    pub fn new(name: impl Into<String>, max_attempts: i64) -> Self {
        Self {
            name: name.into(),
            max_attempts: Some(IntOrString::Int(max_attempts)),
            ..Self::default()
        }
    }
}

/// A known, named error a state may handle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ErrorDef {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ErrorDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
