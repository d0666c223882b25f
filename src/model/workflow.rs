//! Workflow Root
//!
//! The root document and the small string-or-object types hanging off it.
//!
//! # Example YAML Format
//!
//! ```yaml
//! id: order
//! version: "1.0"
//! specVersion: "0.8"
//! start: CheckInventory
//! functions: functions.json        # file reference
//! states:
//!   - name: CheckInventory
//!     type: operation
//!     actions:
//!       - functionRef: checkInventory
//!     end: true
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::auth::Auth;
use super::definitions::{ErrorDef, Event, Function, Retry};
use super::state::State;
use super::{is_false, is_true, Object};
use crate::decode::shape::{shorthand_opt, Shorthand};

/// Expression language used by every expression in the document.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionLang {
    #[default]
    Jq,
    Jsonpath,
    Cel,
}

/// Root of a workflow document.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Domain-specific key; required when `id` is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_input_schema: Option<DataInputSchema>,

    pub spec_version: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub constants: Option<Object>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<Start>,

    pub expression_lang: ExpressionLang,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDef>,

    #[serde(skip_serializing_if = "is_false")]
    pub keep_active: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Object>,

    #[serde(skip_serializing_if = "is_false")]
    pub auto_retries: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth: Vec<Auth>,

    pub states: Vec<State>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<Function>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub retries: Vec<Retry>,
}

impl Workflow {
    /// Creates an empty workflow with the given id and `specVersion`.
    pub fn new(id: impl Into<String>, spec_version: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            spec_version: spec_version.into(),
            ..Self::default()
        }
    }

    /// Creates a workflow from a list of states, starting at the first one.
    pub fn from_states(id: impl Into<String>, states: Vec<State>) -> Self {
        let start = states.first().map(|s| Start::at(s.name.clone()));
        Self {
            start,
            states,
            ..Self::new(id, crate::DEFAULT_SPEC_VERSION)
        }
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retries.push(retry);
        self
    }

    pub fn with_error(mut self, error: ErrorDef) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth.push(auth);
        self
    }

    /// Gets a state by name (first match).
    pub fn get_state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Identifier used in logs: `id`, else `key`, else `name`.
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.key.as_deref())
            .or(self.name.as_deref())
            .unwrap_or("<anonymous>")
    }

    /// Returns the number of states in the workflow.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if the workflow has no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Entry point of the workflow.
///
/// Shorthand: `start: "StateName"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Start {
    pub state_name: String,

    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule: Option<Schedule>,
}

impl Start {
    pub fn at(state_name: impl Into<String>) -> Self {
        Self {
            state_name: state_name.into(),
            schedule: None,
        }
    }
}

impl Shorthand for Start {
    const FIELD: &'static str = "start";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(Start::at)
    }
}

/// When new instances are created.
///
/// Shorthand: `schedule: "PT2H"` (an interval).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Schedule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub cron: Option<Cron>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Shorthand for Schedule {
    const FIELD: &'static str = "schedule";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(|interval| Schedule {
            interval: Some(interval.to_string()),
            ..Schedule::default()
        })
    }
}

/// Cron-based schedule.
///
/// Shorthand: `cron: "0 0/15 * * * ?"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Cron {
    pub expression: String,

    /// Date-time after which the cron expression no longer applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
}

impl Shorthand for Cron {
    const FIELD: &'static str = "cron";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(|expression| Cron {
            expression: expression.to_string(),
            valid_until: None,
        })
    }
}

/// Workflow-wide default timeouts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Timeouts {
    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub workflow_exec_timeout: Option<WorkflowExecTimeout>,

    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub state_exec_timeout: Option<StateExecTimeout>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_exec_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_exec_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_timeout: Option<String>,
}

/// Literal accepted in place of a duration to disable the timeout.
pub const UNLIMITED: &str = "unlimited";

/// Maximum run time of a workflow instance.
///
/// Shorthand: `workflowExecTimeout: "PT1H"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowExecTimeout {
    pub duration: String,

    /// Abort running work (vs. let the current state finish)
    #[serde(skip_serializing_if = "is_true")]
    pub interrupt: bool,

    /// State to run before the instance is timed out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_before: Option<String>,
}

impl Default for WorkflowExecTimeout {
    fn default() -> Self {
        Self {
            duration: UNLIMITED.to_string(),
            interrupt: true,
            run_before: None,
        }
    }
}

impl Shorthand for WorkflowExecTimeout {
    const FIELD: &'static str = "workflowExecTimeout";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(|duration| WorkflowExecTimeout {
            duration: duration.to_string(),
            ..WorkflowExecTimeout::default()
        })
    }
}

/// Maximum run time of a state.
///
/// Shorthand: `stateExecTimeout: "PT30S"` (the total).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct StateExecTimeout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single: Option<String>,

    pub total: String,
}

impl Shorthand for StateExecTimeout {
    const FIELD: &'static str = "stateExecTimeout";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(|total| StateExecTimeout {
            single: None,
            total: total.to_string(),
        })
    }
}

/// JSON schema validating workflow input.
///
/// Shorthand: `dataInputSchema: "schema.json"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DataInputSchema {
    /// Schema URI or inline schema object
    pub schema: Value,

    pub fail_on_validation_errors: bool,
}

impl Default for DataInputSchema {
    fn default() -> Self {
        Self {
            schema: Value::Null,
            fail_on_validation_errors: true,
        }
    }
}

impl Shorthand for DataInputSchema {
    const FIELD: &'static str = "dataInputSchema";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(|schema| DataInputSchema {
            schema: Value::String(schema.to_string()),
            ..DataInputSchema::default()
        })
    }
}
