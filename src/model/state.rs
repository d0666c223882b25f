//! States
//!
//! A state is a node of the workflow graph. Every state shares a set of
//! common fields (name, transition/end, error handlers, compensation
//! settings) and carries exactly one kind-specific payload selected by its
//! `type` discriminator.
//!
//! ```yaml
//! states:
//!   - name: CheckInventory
//!     type: operation
//!     actions:
//!       - functionRef: checkInventory
//!     transition: ChargeCard
//!     compensatedBy: RestockItems
//!   - name: RestockItems
//!     type: operation
//!     usedForCompensation: true
//!     actions:
//!       - functionRef: restock
//!     end: true
//! ```

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{Action, EventDataFilter, StateDataFilter};
use super::definitions::IntOrString;
use super::transition::{End, OnError, Transition};
use super::workflow::StateExecTimeout;
use super::{is_false, is_true, Object};
use crate::decode::shape::{bool_or_object_opt, shorthand_opt, Shorthand};

/// Wire names of every state kind, in declaration order.
pub const STATE_TYPES: &[&str] = &[
    "delay",
    "event",
    "operation",
    "parallel",
    "switch",
    "foreach",
    "inject",
    "callback",
    "sleep",
];

/// A node of the workflow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// Unique name within the workflow
    pub name: String,
    pub on_errors: Vec<OnError>,
    pub transition: Option<Transition>,
    pub end: Option<End>,
    pub state_data_filter: Option<StateDataFilter>,
    /// Name of the state that undoes this one
    pub compensated_by: Option<String>,
    /// Marks the state as part of the compensation subgraph
    pub used_for_compensation: bool,
    pub metadata: Option<Object>,
    pub timeouts: Option<StateTimeouts>,
    pub kind: StateKind,
}

/// Kind-specific payload of a state.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum StateKind {
    Delay(DelayState),
    Event(EventState),
    Operation(OperationState),
    Parallel(ParallelState),
    Switch(SwitchState),
    ForEach(ForEachState),
    Inject(InjectState),
    Callback(CallbackState),
    Sleep(SleepState),
}

impl StateKind {
    /// Wire name of the `type` discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Delay(_) => "delay",
            Self::Event(_) => "event",
            Self::Operation(_) => "operation",
            Self::Parallel(_) => "parallel",
            Self::Switch(_) => "switch",
            Self::ForEach(_) => "foreach",
            Self::Inject(_) => "inject",
            Self::Callback(_) => "callback",
            Self::Sleep(_) => "sleep",
        }
    }
}

impl State {
    /// Creates a state with no transition, end or handlers.
    pub fn new(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            name: name.into(),
            on_errors: Vec::new(),
            transition: None,
            end: None,
            state_data_filter: None,
            compensated_by: None,
            used_for_compensation: false,
            metadata: None,
            timeouts: None,
            kind,
        }
    }

    /// Creates an operation state running `actions` sequentially.
    ///
    /// # Example
    ///
    /// ```
    /// use swflow::model::{Action, State};
    ///
    /// let state = State::operation("Charge", vec![Action::function("charge")])
    ///     .with_transition("Ship");
    /// assert_eq!(state.transition.unwrap().next_state, "Ship");
    /// ```
    pub fn operation(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self::new(
            name,
            StateKind::Operation(OperationState {
                action_mode: ActionMode::default(),
                actions,
            }),
        )
    }

    /// Creates an inject state with the given static data.
    pub fn inject(name: impl Into<String>, data: Object) -> Self {
        Self::new(name, StateKind::Inject(InjectState { data }))
    }

    /// Creates a sleep state.
    pub fn sleep(name: impl Into<String>, duration: impl Into<String>) -> Self {
        Self::new(
            name,
            StateKind::Sleep(SleepState {
                duration: duration.into(),
            }),
        )
    }

    pub fn with_transition(mut self, next_state: impl Into<String>) -> Self {
        self.transition = Some(Transition::to(next_state));
        self
    }

    pub fn with_end(mut self) -> Self {
        self.end = Some(End::default());
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_errors.push(on_error);
        self
    }

    pub fn compensated_by(mut self, state: impl Into<String>) -> Self {
        self.compensated_by = Some(state.into());
        self
    }

    pub fn for_compensation(mut self) -> Self {
        self.used_for_compensation = true;
        self
    }

    /// Wire name of the state's kind.
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Switch states route through their conditions instead of their own
    /// transition/end pair.
    pub fn is_switch(&self) -> bool {
        matches!(self.kind, StateKind::Switch(_))
    }

    /// Every action the state runs, directly or through branches and
    /// event handlers, in declaration order with its path suffix.
    pub fn actions(&self) -> Vec<(String, &Action)> {
        let mut found: Vec<(String, &Action)> = Vec::new();
        match &self.kind {
            StateKind::Operation(s) => push_actions(&mut found, "actions", &s.actions),
            StateKind::ForEach(s) => push_actions(&mut found, "actions", &s.actions),
            StateKind::Event(s) => {
                for (i, on_event) in s.on_events.iter().enumerate() {
                    let prefix = format!("onEvents[{}].actions", i);
                    push_actions(&mut found, &prefix, &on_event.actions);
                }
            }
            StateKind::Parallel(s) => {
                for (i, branch) in s.branches.iter().enumerate() {
                    let prefix = format!("branches[{}].actions", i);
                    push_actions(&mut found, &prefix, &branch.actions);
                }
            }
            StateKind::Callback(s) => found.push(("action".to_string(), &s.action)),
            StateKind::Delay(_) | StateKind::Switch(_) | StateKind::Inject(_) | StateKind::Sleep(_) => {}
        }
        found
    }
}

fn push_actions<'a>(found: &mut Vec<(String, &'a Action)>, prefix: &str, actions: &'a [Action]) {
    found.extend(
        actions
            .iter()
            .enumerate()
            .map(|(i, action)| (format!("{}[{}]", prefix, i), action)),
    );
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Repr<'a> {
            name: &'a str,
            #[serde(rename = "type")]
            state_type: &'static str,
            #[serde(flatten)]
            kind: &'a StateKind,
            #[serde(skip_serializing_if = "is_empty_slice")]
            on_errors: &'a [OnError],
            #[serde(skip_serializing_if = "Option::is_none")]
            transition: Option<&'a Transition>,
            #[serde(skip_serializing_if = "Option::is_none")]
            end: Option<&'a End>,
            #[serde(skip_serializing_if = "Option::is_none")]
            state_data_filter: Option<&'a StateDataFilter>,
            #[serde(skip_serializing_if = "Option::is_none")]
            compensated_by: Option<&'a str>,
            #[serde(skip_serializing_if = "is_false")]
            used_for_compensation: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            metadata: Option<&'a Object>,
            #[serde(skip_serializing_if = "Option::is_none")]
            timeouts: Option<&'a StateTimeouts>,
        }

        Repr {
            name: &self.name,
            state_type: self.type_name(),
            kind: &self.kind,
            on_errors: &self.on_errors,
            transition: self.transition.as_ref(),
            end: self.end.as_ref(),
            state_data_filter: self.state_data_filter.as_ref(),
            compensated_by: self.compensated_by.as_deref(),
            used_for_compensation: self.used_for_compensation,
            metadata: self.metadata.as_ref(),
            timeouts: self.timeouts.as_ref(),
        }
        .serialize(serializer)
    }
}

/// Timeouts a state (or branch) may declare.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct StateTimeouts {
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

/// Whether actions run one after another or concurrently.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Pauses the workflow for a fixed duration.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DelayState {
    pub time_delay: String,
}

/// Waits for one or more events, then runs actions.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventState {
    /// Any one of the `onEvents` triggers the state (vs. all of them)
    #[serde(skip_serializing_if = "is_true")]
    pub exclusive: bool,
    pub on_events: Vec<OnEvents>,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            exclusive: true,
            on_events: Vec::new(),
        }
    }
}

/// Events an event state waits for and the actions they trigger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct OnEvents {
    pub event_refs: Vec<String>,

    pub action_mode: ActionMode,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data_filter: Option<EventDataFilter>,
}

/// Runs a list of actions.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    pub action_mode: ActionMode,
    pub actions: Vec<Action>,
}

/// How many branches must complete before a parallel state completes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CompletionType {
    #[default]
    AllOf,
    AtLeast,
}

/// Runs branches concurrently.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParallelState {
    pub branches: Vec<Branch>,
    pub completion_type: CompletionType,
    /// Branch count required when `completionType` is `atLeast`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_completed: Option<IntOrString>,
}

/// One branch of a parallel state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Branch {
    pub name: String,

    pub actions: Vec<Action>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<StateTimeouts>,
}

/// Routes to one of several transitions based on data or events.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SwitchState {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_conditions: Vec<DataCondition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_conditions: Vec<EventCondition>,
    pub default_condition: DefaultCondition,
}

/// Switch branch taken when an expression over state data holds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DataCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub condition: String,

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

/// Switch branch taken when an event arrives.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct EventCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub event_ref: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data_filter: Option<EventDataFilter>,

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

/// Switch fallback when no condition matches.
///
/// Shorthand: `defaultCondition: "NextState"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DefaultCondition {
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
}

impl Shorthand for DefaultCondition {
    const FIELD: &'static str = "defaultCondition";

    fn from_primitive(value: &Value) -> Option<Self> {
        value.as_str().map(|next| DefaultCondition {
            transition: Some(Transition::to(next)),
            end: None,
        })
    }
}

/// How a foreach state iterates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForEachMode {
    #[default]
    Parallel,
    Sequential,
}

/// Runs actions once per element of a collection.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ForEachState {
    pub input_collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_param: Option<String>,
    /// Maximum concurrent iterations when `mode` is `parallel`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<IntOrString>,
    pub actions: Vec<Action>,
    pub mode: ForEachMode,
}

/// Injects static data into state data.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct InjectState {
    pub data: Object,
}

/// Runs an action and waits for a callback event.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallbackState {
    pub action: Action,
    pub event_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data_filter: Option<EventDataFilter>,
}

/// Sleeps for a fixed duration.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct SleepState {
    pub duration: String,
}
