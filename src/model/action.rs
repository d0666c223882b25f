//! Actions
//!
//! An action is the unit of work performed by operation, event, foreach,
//! parallel (via branches) and callback states. It invokes exactly one of a
//! function, an event exchange or a sub-workflow.
//!
//! ```yaml
//! actions:
//!   - functionRef: checkInventory          # string shorthand
//!   - name: notify
//!     functionRef:
//!       refName: sendEmail
//!       arguments:
//!         to: "${ .customer.email }"
//!     retryRef: emailRetry
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{is_true, Object};
use crate::decode::shape::{shorthand_opt, Shorthand};

/// Whether an invocation waits for its result.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Invoke {
    #[default]
    Sync,
    Async,
}

/// What happens to a sub-workflow when its parent completes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnParentComplete {
    #[default]
    Terminate,
    Continue,
}

/// A single unit of work inside a state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Action {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub function_ref: Option<FunctionRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_ref: Option<EventRef>,

    #[serde(
        deserialize_with = "shorthand_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_flow_ref: Option<WorkflowRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep: Option<ActionSleep>,

    /// Name of the retry policy used for this action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_ref: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub non_retryable_errors: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub retryable_errors: Vec<String>,

    /// Always encoded, even when every filter is left at its default
    pub action_data_filter: ActionDataFilter,

    /// Expression deciding whether the action runs at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Borrowed view of the invocation an action performs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Invocation<'a> {
    Function(&'a FunctionRef),
    Event(&'a EventRef),
    SubFlow(&'a WorkflowRef),
}

impl Action {
    /// Creates an action invoking the named function synchronously.
    ///
    /// # Example
    ///
    /// ```
    /// use swflow::model::Action;
    ///
    /// let action = Action::function("checkInventory").with_retry("default");
    /// assert_eq!(action.function_ref.unwrap().ref_name, "checkInventory");
    /// ```
    pub fn function(ref_name: impl Into<String>) -> Self {
        Self {
            function_ref: Some(FunctionRef::new(ref_name)),
            ..Self::default()
        }
    }

    /// Creates an action that produces `trigger` and waits for `result`.
    pub fn event(trigger: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            event_ref: Some(EventRef::new(trigger, result)),
            ..Self::default()
        }
    }

    /// Creates an action invoking another workflow by id.
    pub fn sub_flow(workflow_id: impl Into<String>) -> Self {
        Self {
            sub_flow_ref: Some(WorkflowRef::new(workflow_id)),
            ..Self::default()
        }
    }

    /// Sets the action name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the retry policy reference.
    pub fn with_retry(mut self, retry_ref: impl Into<String>) -> Self {
        self.retry_ref = Some(retry_ref.into());
        self
    }

    /// Returns the single invocation this action performs.
    ///
    /// `None` when zero or more than one reference is set; the validator
    /// reports both cases.
    pub fn invocation(&self) -> Option<Invocation<'_>> {
        match (&self.function_ref, &self.event_ref, &self.sub_flow_ref) {
            (Some(f), None, None) => Some(Invocation::Function(f)),
            (None, Some(e), None) => Some(Invocation::Event(e)),
            (None, None, Some(s)) => Some(Invocation::SubFlow(s)),
            _ => None,
        }
    }

    /// Label used in logs and error messages.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Reference to a function definition.
///
/// Shorthand: `functionRef: "name"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FunctionRef {
    pub ref_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Object>,

    /// GraphQL selection set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_set: Option<String>,

    pub invoke: Invoke,
}

impl FunctionRef {
    pub fn new(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            ..Self::default()
        }
    }
}

impl Shorthand for FunctionRef {
    const FIELD: &'static str = "functionRef";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(FunctionRef::new)
    }
}

/// Produce-then-consume event exchange.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct EventRef {
    pub trigger_event_ref: String,

    pub result_event_ref: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_event_timeout: Option<String>,

    /// Payload expression or literal object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_attributes: Option<Object>,

    pub invoke: Invoke,
}

impl EventRef {
    pub fn new(trigger: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            trigger_event_ref: trigger.into(),
            result_event_ref: result.into(),
            ..Self::default()
        }
    }
}

/// Reference to a sub-workflow.
///
/// Shorthand: `subFlowRef: "workflowId"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowRef {
    pub workflow_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub invoke: Invoke,

    pub on_parent_complete: OnParentComplete,
}

impl WorkflowRef {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Self::default()
        }
    }
}

impl Shorthand for WorkflowRef {
    const FIELD: &'static str = "subFlowRef";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(WorkflowRef::new)
    }
}

/// Pause before and/or after an action.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ActionSleep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// Selects which parts of state data an action sees and how its results
/// are merged back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionDataFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_state_data: Option<String>,

    pub use_results: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_state_data: Option<String>,
}

impl Default for ActionDataFilter {
    fn default() -> Self {
        Self {
            from_state_data: None,
            use_results: true,
            results: None,
            to_state_data: None,
        }
    }
}

impl ActionDataFilter {
    /// Non-empty filter expressions, paired with their field names.
    pub fn expressions(&self) -> Vec<(&'static str, &str)> {
        [
            ("fromStateData", &self.from_state_data),
            ("results", &self.results),
            ("toStateData", &self.to_state_data),
        ]
        .into_iter()
        .filter_map(|(field, expr)| {
            expr.as_deref()
                .filter(|e| !e.trim().is_empty())
                .map(|e| (field, e))
        })
        .collect()
    }
}

/// Filters the payload of a consumed event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EventDataFilter {
    #[serde(skip_serializing_if = "is_true")]
    pub use_data: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_state_data: Option<String>,
}

impl Default for EventDataFilter {
    fn default() -> Self {
        Self {
            use_data: true,
            data: None,
            to_state_data: None,
        }
    }
}

/// Filters state input and output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct StateDataFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Events produced when a transition or end is taken.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ProduceEvent {
    pub event_ref: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_attributes: Option<Object>,
}
