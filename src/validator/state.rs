//! State-level checks: common fields, error handlers, compensation targets,
//! kind-specific payloads and every action the state runs.

use super::rules::{exclusive, exists, exists_all, gt0, required};
use super::violation::{RuleKind, Violation};
use super::Context;
use crate::index::Bucket;
use crate::model::{
    Action, CompletionType, EventDataFilter, ForEachMode, OnError, State, StateKind,
    StateTimeouts,
};
use crate::report::phrase;

pub(super) fn check(ctx: &Context<'_, '_>, position: usize, state: &State) -> Vec<Violation> {
    let base = format!("states[{}]", position);
    let mut found = Vec::new();

    found.extend(required(&format!("{}.name", base), &state.name));

    if let Some(filter) = &state.state_data_filter {
        found.extend(ctx.expression_opt(&format!("{}.stateDataFilter.input", base), filter.input.as_deref()));
        found.extend(ctx.expression_opt(&format!("{}.stateDataFilter.output", base), filter.output.as_deref()));
    }
    if let Some(timeouts) = &state.timeouts {
        found.extend(check_timeouts(ctx, &format!("{}.timeouts", base), timeouts));
    }

    // Error handlers
    for (i, on_error) in state.on_errors.iter().enumerate() {
        found.extend(check_on_error(ctx, &format!("{}.onErrors[{}]", base, i), on_error));
    }

    found.extend(check_compensation(ctx, &base, state));
    found.extend(check_kind(ctx, &base, &state.kind));

    // Actions, including branches and event handlers
    for (suffix, action) in state.actions() {
        found.extend(check_action(ctx, &format!("{}.{}", base, suffix), action));
    }

    found
}

fn check_timeouts(ctx: &Context<'_, '_>, base: &str, timeouts: &StateTimeouts) -> Vec<Violation> {
    let mut found = Vec::new();
    if let Some(state_exec) = &timeouts.state_exec_timeout {
        let total = format!("{}.stateExecTimeout.total", base);
        found.extend(required(&total, &state_exec.total));
        found.extend(ctx.duration(&total, &state_exec.total));
        found.extend(ctx.duration_opt(
            &format!("{}.stateExecTimeout.single", base),
            state_exec.single.as_deref(),
        ));
    }
    for (field, value) in [
        ("actionExecTimeout", &timeouts.action_exec_timeout),
        ("branchExecTimeout", &timeouts.branch_exec_timeout),
        ("eventTimeout", &timeouts.event_timeout),
    ] {
        found.extend(ctx.duration_opt(&format!("{}.{}", base, field), value.as_deref()));
    }
    found
}

/// Error references of a handler; its transition/end pair is checked with
/// the other transition sites.
fn check_on_error(ctx: &Context<'_, '_>, base: &str, on_error: &OnError) -> Vec<Violation> {
    let mut found = Vec::new();
    found.extend(exclusive(
        &format!("{}.errorRef", base),
        &[
            ("errorRef", on_error.error_ref.is_some()),
            ("errorRefs", !on_error.error_refs.is_empty()),
        ],
        true,
    ));
    if let Some(error_ref) = &on_error.error_ref {
        found.extend(exists(&ctx.index, Bucket::Errors, &format!("{}.errorRef", base), error_ref));
    }
    found.extend(exists_all(
        &ctx.index,
        Bucket::Errors,
        &format!("{}.errorRefs", base),
        &on_error.error_refs,
    ));
    found
}

/// The compensating state must exist, be marked for compensation, not be
/// the state itself and not be an event state.
fn check_compensation(ctx: &Context<'_, '_>, base: &str, state: &State) -> Option<Violation> {
    let target = state.compensated_by.as_deref()?;
    let path = format!("{}.compensatedBy", base);

    if target.trim().is_empty() {
        return required(&path, target);
    }
    if target == state.name {
        let message = phrase(RuleKind::Recursive, "compensatedBy", target, "");
        return Some(Violation::new(path, RuleKind::Recursive, target, message));
    }

    let Some(compensating) = ctx.index.state(target) else {
        return exists(&ctx.index, Bucket::States, &path, target);
    };
    let reason = if !compensating.used_for_compensation {
        "must name a state with usedForCompensation set"
    } else if matches!(compensating.kind, StateKind::Event(_)) {
        "must not name an event state"
    } else {
        return None;
    };
    let message = phrase(RuleKind::Compensation, "compensatedBy", target, reason);
    Some(Violation::new(path, RuleKind::Compensation, target, message))
}

fn check_kind(ctx: &Context<'_, '_>, base: &str, kind: &StateKind) -> Vec<Violation> {
    let at = |field: &str| format!("{}.{}", base, field);
    let mut found = Vec::new();

    match kind {
        StateKind::Delay(delay) => {
            found.extend(required(&at("timeDelay"), &delay.time_delay));
            found.extend(ctx.duration(&at("timeDelay"), &delay.time_delay));
        }
        StateKind::Sleep(sleep) => {
            found.extend(required(&at("duration"), &sleep.duration));
            found.extend(ctx.duration(&at("duration"), &sleep.duration));
        }
        StateKind::Event(event) => {
            if event.on_events.is_empty() {
                found.extend(required(&at("onEvents"), ""));
            }
            for (i, on_events) in event.on_events.iter().enumerate() {
                let path = at(&format!("onEvents[{}]", i));
                if on_events.event_refs.is_empty() {
                    found.extend(required(&format!("{}.eventRefs", path), ""));
                }
                found.extend(exists_all(
                    &ctx.index,
                    Bucket::Events,
                    &format!("{}.eventRefs", path),
                    &on_events.event_refs,
                ));
                found.extend(check_event_data_filter(
                    ctx,
                    &format!("{}.eventDataFilter", path),
                    on_events.event_data_filter.as_ref(),
                ));
            }
        }
        StateKind::Operation(operation) => {
            if operation.actions.is_empty() {
                found.extend(required(&at("actions"), ""));
            }
        }
        StateKind::ForEach(for_each) => {
            found.extend(required(&at("inputCollection"), &for_each.input_collection));
            if for_each.actions.is_empty() {
                found.extend(required(&at("actions"), ""));
            }
            if for_each.mode == ForEachMode::Parallel {
                if let Some(batch_size) = &for_each.batch_size {
                    found.extend(gt0(&at("batchSize"), batch_size));
                }
            }
        }
        StateKind::Parallel(parallel) => {
            if parallel.branches.is_empty() {
                found.extend(required(&at("branches"), ""));
            }
            for (i, branch) in parallel.branches.iter().enumerate() {
                let path = at(&format!("branches[{}]", i));
                found.extend(required(&format!("{}.name", path), &branch.name));
                if let Some(timeouts) = &branch.timeouts {
                    found.extend(check_timeouts(ctx, &format!("{}.timeouts", path), timeouts));
                }
            }
            if parallel.completion_type == CompletionType::AtLeast {
                match &parallel.num_completed {
                    Some(num_completed) => found.extend(gt0(&at("numCompleted"), num_completed)),
                    None => found.extend(required(&at("numCompleted"), "")),
                }
            }
        }
        StateKind::Switch(switch) => {
            found.extend(exclusive(
                base,
                &[
                    ("dataConditions", !switch.data_conditions.is_empty()),
                    ("eventConditions", !switch.event_conditions.is_empty()),
                ],
                true,
            ));
            for (i, condition) in switch.data_conditions.iter().enumerate() {
                let path = at(&format!("dataConditions[{}].condition", i));
                found.extend(required(&path, &condition.condition));
                found.extend(ctx.expression(&path, &condition.condition));
            }
            for (i, condition) in switch.event_conditions.iter().enumerate() {
                let path = at(&format!("eventConditions[{}]", i));
                let event_ref = format!("{}.eventRef", path);
                if let Some(v) = required(&event_ref, &condition.event_ref) {
                    found.push(v);
                } else {
                    found.extend(exists(&ctx.index, Bucket::Events, &event_ref, &condition.event_ref));
                }
                found.extend(check_event_data_filter(
                    ctx,
                    &format!("{}.eventDataFilter", path),
                    condition.event_data_filter.as_ref(),
                ));
            }
        }
        StateKind::Callback(callback) => {
            let event_ref = at("eventRef");
            if let Some(v) = required(&event_ref, &callback.event_ref) {
                found.push(v);
            } else {
                found.extend(exists(&ctx.index, Bucket::Events, &event_ref, &callback.event_ref));
            }
            found.extend(check_event_data_filter(
                ctx,
                &at("eventDataFilter"),
                callback.event_data_filter.as_ref(),
            ));
        }
        StateKind::Inject(_) => {}
    }

    found
}

fn check_event_data_filter(
    ctx: &Context<'_, '_>,
    base: &str,
    filter: Option<&EventDataFilter>,
) -> Vec<Violation> {
    let Some(filter) = filter else {
        return Vec::new();
    };
    [
        ctx.expression_opt(&format!("{}.data", base), filter.data.as_deref()),
        ctx.expression_opt(&format!("{}.toStateData", base), filter.to_state_data.as_deref()),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Reference group, referenced definitions and timing of one action.
fn check_action(ctx: &Context<'_, '_>, base: &str, action: &Action) -> Vec<Violation> {
    let at = |field: &str| format!("{}.{}", base, field);
    let mut found = Vec::new();

    found.extend(exclusive(
        base,
        &[
            ("functionRef", action.function_ref.is_some()),
            ("eventRef", action.event_ref.is_some()),
            ("subFlowRef", action.sub_flow_ref.is_some()),
        ],
        true,
    ));

    // Referenced definitions
    if let Some(function_ref) = &action.function_ref {
        let path = at("functionRef.refName");
        if let Some(v) = required(&path, &function_ref.ref_name) {
            found.push(v);
        } else {
            found.extend(exists(&ctx.index, Bucket::Functions, &path, &function_ref.ref_name));
        }
    }
    if let Some(event_ref) = &action.event_ref {
        for (field, name) in [
            ("eventRef.triggerEventRef", &event_ref.trigger_event_ref),
            ("eventRef.resultEventRef", &event_ref.result_event_ref),
        ] {
            let path = at(field);
            if let Some(v) = required(&path, name) {
                found.push(v);
            } else {
                found.extend(exists(&ctx.index, Bucket::Events, &path, name));
            }
        }
        found.extend(ctx.duration_opt(
            &at("eventRef.resultEventTimeout"),
            event_ref.result_event_timeout.as_deref(),
        ));
    }
    if let Some(sub_flow_ref) = &action.sub_flow_ref {
        found.extend(required(&at("subFlowRef.workflowId"), &sub_flow_ref.workflow_id));
    }

    if let Some(retry_ref) = &action.retry_ref {
        found.extend(exists(&ctx.index, Bucket::Retries, &at("retryRef"), retry_ref));
    }
    found.extend(exclusive(
        &at("retryableErrors"),
        &[
            ("retryableErrors", !action.retryable_errors.is_empty()),
            ("nonRetryableErrors", !action.non_retryable_errors.is_empty()),
        ],
        false,
    ));
    found.extend(exists_all(&ctx.index, Bucket::Errors, &at("retryableErrors"), &action.retryable_errors));
    found.extend(exists_all(
        &ctx.index,
        Bucket::Errors,
        &at("nonRetryableErrors"),
        &action.non_retryable_errors,
    ));

    // Timing and filters
    if let Some(sleep) = &action.sleep {
        found.extend(ctx.duration_opt(&at("sleep.before"), sleep.before.as_deref()));
        found.extend(ctx.duration_opt(&at("sleep.after"), sleep.after.as_deref()));
    }

    found.extend(ctx.expression_opt(&at("condition"), action.condition.as_deref()));
    for (field, expression) in action.action_data_filter.expressions() {
        found.extend(ctx.expression(&at(&format!("actionDataFilter.{}", field)), expression));
    }

    found
}

#[cfg(test)]
mod tests {
    use crate::decode::from_str;
    use crate::model::{Action, State, Workflow};
    use crate::validator::{validate, RuleKind, Violation};

    fn of_kind(violations: &[Violation], rule: RuleKind) -> Vec<String> {
        violations
            .iter()
            .filter(|v| v.rule == rule)
            .map(|v| v.path.clone())
            .collect()
    }

    #[test]
    fn test_action_without_reference_is_required() {
        let workflow = Workflow::from_states(
            "w",
            vec![State::operation("Op", vec![Action::default()]).with_end()],
        );
        let violations = validate(&workflow);
        assert_eq!(of_kind(&violations, RuleKind::Required), vec!["states[0].actions[0]"]);
    }

    #[test]
    fn test_dangling_action_references() {
        let workflow = Workflow::from_states(
            "w",
            vec![State::operation(
                "Op",
                vec![Action::function("missing").with_retry("nope")],
            )
            .with_end()],
        );
        let violations = validate(&workflow);
        assert_eq!(
            of_kind(&violations, RuleKind::Exists),
            vec!["states[0].actions[0].functionRef.refName", "states[0].actions[0].retryRef"]
        );
    }

    #[test]
    fn test_compensation_target_rules() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "Charge",
                "states": [
                    {"name": "Charge", "type": "inject", "data": {}, "compensatedBy": "Refund",
                     "transition": "Ship"},
                    {"name": "Ship", "type": "inject", "data": {}, "compensatedBy": "Ghost",
                     "transition": "Notify"},
                    {"name": "Notify", "type": "inject", "data": {}, "compensatedBy": "Wait",
                     "end": true},
                    {"name": "Refund", "type": "inject", "data": {}, "end": true},
                    {"name": "Wait", "type": "event", "usedForCompensation": true,
                     "onEvents": [{"eventRefs": ["Done"]}], "end": true}
                ],
                "events": [{"name": "Done", "type": "done"}]
            }"#,
        )
        .unwrap();
        let violations = validate(&workflow);
        assert_eq!(
            of_kind(&violations, RuleKind::Compensation),
            vec!["states[0].compensatedBy", "states[2].compensatedBy"]
        );
        assert_eq!(of_kind(&violations, RuleKind::Exists), vec!["states[1].compensatedBy"]);
    }

    #[test]
    fn test_on_error_refs() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "A",
                "errors": [{"name": "Timeout"}],
                "states": [
                    {"name": "A", "type": "operation",
                     "actions": [{"subFlowRef": "child"}],
                     "onErrors": [
                        {"errorRef": "Timeout", "end": true},
                        {"errorRefs": ["Timeout", "Gone"], "end": true},
                        {"end": true}
                     ],
                     "end": true}
                ]
            }"#,
        )
        .unwrap();
        let violations = validate(&workflow);
        assert_eq!(of_kind(&violations, RuleKind::Exists), vec!["states[0].onErrors[1].errorRefs[1]"]);
        assert_eq!(
            of_kind(&violations, RuleKind::Required),
            vec!["states[0].onErrors[2].errorRef"]
        );
    }

    #[test]
    fn test_exclusive_groups_have_distinct_paths() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "A",
                "functions": [{"name": "f", "operation": "api.json#f"}],
                "errors": [{"name": "E1"}, {"name": "E2"}],
                "states": [
                    {"name": "A", "type": "operation",
                     "actions": [{"functionRef": "f", "subFlowRef": "child",
                                  "retryableErrors": ["E1"], "nonRetryableErrors": ["E2"]}],
                     "onErrors": [{}],
                     "end": true}
                ]
            }"#,
        )
        .unwrap();
        let violations = validate(&workflow);
        assert_eq!(
            of_kind(&violations, RuleKind::Exclusive),
            vec!["states[0].actions[0]", "states[0].actions[0].retryableErrors"]
        );
        assert_eq!(
            of_kind(&violations, RuleKind::Required),
            vec!["states[0].onErrors[0].errorRef", "states[0].onErrors[0]"]
        );
    }

    #[test]
    fn test_kind_specific_rules() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "Each",
                "states": [
                    {"name": "Each", "type": "foreach", "inputCollection": "${ .items }",
                     "batchSize": 0, "actions": [{"subFlowRef": "child"}], "transition": "Wait"},
                    {"name": "Wait", "type": "delay", "timeDelay": "ten seconds",
                     "transition": "Route"},
                    {"name": "Route", "type": "switch", "defaultCondition": {"end": true}},
                    {"name": "Empty", "type": "operation", "end": true}
                ]
            }"#,
        )
        .unwrap();
        let violations = validate(&workflow);
        assert_eq!(of_kind(&violations, RuleKind::Gt0), vec!["states[0].batchSize"]);
        assert_eq!(of_kind(&violations, RuleKind::Duration), vec!["states[1].timeDelay"]);
        assert_eq!(
            of_kind(&violations, RuleKind::Required),
            vec!["states[2]", "states[3].actions"]
        );
    }

    #[test]
    fn test_sequential_foreach_ignores_batch_size() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "Each",
                "states": [
                    {"name": "Each", "type": "foreach", "inputCollection": "${ .items }",
                     "mode": "sequential", "batchSize": "0",
                     "actions": [{"subFlowRef": "child"}], "end": true}
                ]
            }"#,
        )
        .unwrap();
        assert!(validate(&workflow).is_empty());
    }

    #[test]
    fn test_callback_and_event_state_refs() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "Ask",
                "events": [{"name": "Approved", "type": "approval"}],
                "states": [
                    {"name": "Ask", "type": "callback",
                     "action": {"subFlowRef": "approval"},
                     "eventRef": "Rejected", "transition": "Listen"},
                    {"name": "Listen", "type": "event",
                     "onEvents": [{"eventRefs": ["Approved", "Cancelled"],
                                   "actions": [{"eventRef": {
                                       "triggerEventRef": "Approved",
                                       "resultEventRef": "Approved",
                                       "resultEventTimeout": "PT1M"}}]}],
                     "end": true}
                ]
            }"#,
        )
        .unwrap();
        let violations = validate(&workflow);
        assert_eq!(
            of_kind(&violations, RuleKind::Exists),
            vec!["states[0].eventRef", "states[1].onEvents[0].eventRefs[1]"]
        );
    }
}
