//! Document Model
//!
//! Strongly-typed nodes of a workflow document. Every type encodes to its
//! canonical shape; the alternate shapes accepted on input are handled by
//! the [`decode`](crate::decode) layer.
//!
//! # Structure
//!
//! - [`workflow`]: Root document, start, schedule and timeouts
//! - [`state`]: States and their kind-specific payloads
//! - [`action`]: Actions and the references they carry
//! - [`transition`]: Transition, end and error handlers
//! - [`auth`]: Auth definitions (tagged by scheme)
//! - [`definitions`]: Functions, events, retries and errors

pub mod action;
pub mod auth;
pub mod definitions;
pub mod state;
pub mod transition;
pub mod workflow;

pub use action::{
    Action, ActionDataFilter, ActionSleep, EventDataFilter, EventRef, FunctionRef, Invocation,
    Invoke, OnParentComplete, ProduceEvent, StateDataFilter, WorkflowRef,
};
pub use auth::{
    Auth, AuthProperties, AuthScheme, BasicAuthProperties, BearerAuthProperties, GrantType,
    OAuth2AuthProperties,
};
pub use definitions::{
    Correlation, ErrorDef, Event, EventKind, FloatOrString, Function, FunctionType, IntOrString,
    Retry,
};
pub use state::{
    ActionMode, Branch, CallbackState, CompletionType, DataCondition, DefaultCondition,
    DelayState, EventCondition, EventState, ForEachMode, ForEachState, InjectState, OnEvents,
    OperationState, ParallelState, SleepState, State, StateKind, StateTimeouts, SwitchState,
    STATE_TYPES,
};
pub use transition::{ContinueAs, End, OnError, Transition};
pub use workflow::{
    Cron, DataInputSchema, ExpressionLang, Schedule, Start, StateExecTimeout, Timeouts, Workflow,
    WorkflowExecTimeout, UNLIMITED,
};

/// Free-form JSON object (arguments, metadata, constants, injected data).
pub type Object = serde_json::Map<String, serde_json::Value>;

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

pub(crate) fn is_true(value: &bool) -> bool {
    *value
}
