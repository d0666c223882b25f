//! Transitions and End Markers
//!
//! Every state (and every switch condition and error handler) either moves
//! to another state through a [`Transition`] or stops through an [`End`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::ProduceEvent;
use super::workflow::WorkflowExecTimeout;
use super::{is_false, Object};
use crate::decode::shape::{bool_or_object_opt, shorthand_opt, Shorthand};

/// Moves execution to the named state.
///
/// Shorthand: `transition: "NextState"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Transition {
    pub next_state: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub produce_events: Vec<ProduceEvent>,

    /// Triggers compensation before moving on
    #[serde(skip_serializing_if = "is_false")]
    pub compensate: bool,
}

impl Transition {
    pub fn to(next_state: impl Into<String>) -> Self {
        Self {
            next_state: next_state.into(),
            ..Self::default()
        }
    }
}

impl Shorthand for Transition {
    const FIELD: &'static str = "transition";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(Transition::to)
    }
}

/// Marks a state or condition as terminal.
///
/// Shorthand: `end: true`. `end: false` leaves the marker unset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct End {
    /// Terminates the whole workflow instance, not just this path
    #[serde(skip_serializing_if = "is_false")]
    pub terminate: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub produce_events: Vec<ProduceEvent>,

    #[serde(skip_serializing_if = "is_false")]
    pub compensate: bool,

    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub continue_as: Option<ContinueAs>,
}

/// Restarts execution as a new instance of a workflow.
///
/// Shorthand: `continueAs: "workflowId"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ContinueAs {
    pub workflow_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub workflow_exec_timeout: Option<WorkflowExecTimeout>,
}

impl Shorthand for ContinueAs {
    const FIELD: &'static str = "continueAs";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(|id| ContinueAs {
            workflow_id: id.to_string(),
            ..ContinueAs::default()
        })
    }
}

/// Error handler attached to a state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct OnError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_ref: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_refs: Vec<String>,

    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub transition: Option<Transition>,

    #[serde(
        deserialize_with = "bool_or_object_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<End>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Object>,
}

impl OnError {
    /// Handler for one error that moves to `next_state`.
    pub fn transition(error_ref: impl Into<String>, next_state: impl Into<String>) -> Self {
        Self {
            error_ref: Some(error_ref.into()),
            transition: Some(Transition::to(next_state)),
            ..Self::default()
        }
    }

    /// All error names this handler catches.
    pub fn handled_errors(&self) -> impl Iterator<Item = &str> {
        self.error_ref
            .iter()
            .chain(self.error_refs.iter())
            .map(String::as_str)
    }
}
