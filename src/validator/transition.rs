//! Transition/end edges leaving one state.

use super::rules::{exclusive, exists, required};
use super::violation::{RuleKind, Violation};
use super::Context;
use crate::index::{Bucket, Site};
use crate::model::{End, ProduceEvent, Transition, UNLIMITED};
use crate::report::phrase;

/// Checks every transition site owned by the state at `owner`.
pub(super) fn check(ctx: &Context<'_, '_>, owner: usize) -> Vec<Violation> {
    let mut found = Vec::new();
    for site in ctx.index.sites_of(owner) {
        found.extend(exclusive(
            &site.path,
            &[("transition", site.transition.is_some()), ("end", site.end.is_some())],
            true,
        ));
        if let Some(transition) = site.transition {
            found.extend(check_transition(ctx, site, transition));
        }
        if let Some(end) = site.end {
            found.extend(check_end(ctx, &format!("{}.end", site.path), end));
        }
    }
    found
}

fn check_transition(ctx: &Context<'_, '_>, site: &Site<'_>, transition: &Transition) -> Vec<Violation> {
    let mut found = Vec::new();
    found.extend(produce_events(ctx, &format!("{}.transition", site.path), &transition.produce_events));

    let path = site.next_state_path();
    let target_name = transition.next_state.as_str();
    let Some(target) = ctx.index.state_index(target_name) else {
        found.extend(exists(&ctx.index, Bucket::States, &path, target_name));
        return found;
    };

    if target == site.owner {
        let message = phrase(RuleKind::Recursive, "nextState", target_name, "");
        found.push(Violation::new(path, RuleKind::Recursive, target_name, message));
        return found;
    }

    let states = &ctx.index.workflow().states;
    let from = states[site.owner].used_for_compensation;
    let to = states[target].used_for_compensation;
    let reason = match (from, to) {
        (true, false) => Some("leaves the compensation flow; compensation states may only transition to compensation states"),
        (false, true) => Some("is a compensation state and can only be reached through compensatedBy"),
        _ => None,
    };
    if let Some(reason) = reason {
        let message = phrase(RuleKind::Compensation, "nextState", target_name, reason);
        found.push(Violation::new(path, RuleKind::Compensation, target_name, message));
    }
    found
}

fn check_end(ctx: &Context<'_, '_>, base: &str, end: &End) -> Vec<Violation> {
    let mut found = produce_events(ctx, base, &end.produce_events);
    if let Some(continue_as) = &end.continue_as {
        let path = format!("{}.continueAs", base);
        found.extend(required(&format!("{}.workflowId", path), &continue_as.workflow_id));
        if let Some(timeout) = &continue_as.workflow_exec_timeout {
            if timeout.duration != UNLIMITED {
                found.extend(ctx.duration(
                    &format!("{}.workflowExecTimeout.duration", path),
                    &timeout.duration,
                ));
            }
        }
    }
    found
}

fn produce_events(ctx: &Context<'_, '_>, base: &str, events: &[ProduceEvent]) -> Vec<Violation> {
    events
        .iter()
        .enumerate()
        .filter_map(|(i, event)| {
            exists(
                &ctx.index,
                Bucket::Events,
                &format!("{}.produceEvents[{}].eventRef", base, i),
                &event.event_ref,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::decode::from_str;
    use crate::model::{OnError, State, Workflow};
    use crate::validator::{validate, RuleKind, Violation};

    fn paths(violations: &[Violation], rule: RuleKind) -> Vec<&str> {
        violations
            .iter()
            .filter(|v| v.rule == rule)
            .map(|v| v.path.as_str())
            .collect()
    }

    #[test]
    fn test_transition_and_end_are_exclusive() {
        let mut both = State::sleep("A", "PT1S").with_end();
        both.transition = Some(crate::model::Transition::to("B"));
        let workflow = Workflow::from_states(
            "w",
            vec![both, State::sleep("B", "PT1S"), State::sleep("C", "PT1S").with_end()],
        );
        let violations = validate(&workflow);
        assert_eq!(paths(&violations, RuleKind::Exclusive), vec!["states[0]"]);
        assert_eq!(paths(&violations, RuleKind::Required), vec!["states[1]"]);
    }

    #[test]
    fn test_empty_next_state_does_not_exist() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "A",
                "states": [
                    {"name": "A", "type": "sleep", "duration": "PT1S", "transition": ""},
                    {"name": "B", "type": "sleep", "duration": "PT1S", "end": true}
                ]
            }"#,
        )
        .unwrap();
        let violations = validate(&workflow);
        assert_eq!(paths(&violations, RuleKind::Exists), vec!["states[0].transition.nextState"]);
        assert!(paths(&violations, RuleKind::Required).is_empty(), "{:?}", violations);
        assert!(violations.iter().any(|v| v.rule == RuleKind::Exists && v.value.is_empty()));
    }

    #[test]
    fn test_self_transition_is_recursive() {
        let workflow = Workflow::from_states(
            "w",
            vec![State::sleep("Loop", "PT1S").with_transition("Loop")],
        );
        let violations = validate(&workflow);
        assert_eq!(violations.len(), 1, "{:?}", violations);
        assert_eq!(violations[0].rule, RuleKind::Recursive);
        assert_eq!(violations[0].path, "states[0].transition.nextState");
    }

    #[test]
    fn test_compensation_edges() {
        let workflow = Workflow::from_states(
            "w",
            vec![
                State::sleep("Main", "PT1S").with_transition("Undo"),
                State::sleep("Undo", "PT1S").for_compensation().with_transition("Cleanup"),
                State::sleep("Cleanup", "PT1S").with_end(),
            ],
        );
        let violations = validate(&workflow);
        assert_eq!(
            paths(&violations, RuleKind::Compensation),
            vec!["states[0].transition.nextState", "states[1].transition.nextState"]
        );
    }

    #[test]
    fn test_compensation_chain_is_allowed() {
        let workflow = Workflow::from_states(
            "w",
            vec![
                State::sleep("Main", "PT1S").compensated_by("Undo").with_end(),
                State::sleep("Undo", "PT1S").for_compensation().with_transition("Audit"),
                State::sleep("Audit", "PT1S").for_compensation().with_end(),
            ],
        );
        assert_eq!(validate(&workflow), Vec::<Violation>::new());
    }

    #[test]
    fn test_switch_and_handler_sites() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "Route",
                "errors": [{"name": "Boom"}],
                "states": [
                    {"name": "Route", "type": "switch",
                     "dataConditions": [
                        {"condition": "${ .a }", "transition": "Nowhere"},
                        {"condition": "${ .b }"}
                     ],
                     "defaultCondition": {"transition": "Done"}},
                    {"name": "Done", "type": "operation",
                     "actions": [{"subFlowRef": "child"}],
                     "onErrors": [{"errorRef": "Boom", "transition": "Missing"}],
                     "end": {"produceEvents": [{"eventRef": "Finished"}]}}
                ]
            }"#,
        )
        .unwrap();
        let violations = validate(&workflow);
        assert_eq!(
            paths(&violations, RuleKind::Exists),
            vec![
                "states[0].dataConditions[0].transition.nextState",
                "states[1].end.produceEvents[0].eventRef",
                "states[1].onErrors[0].transition.nextState"
            ]
        );
        assert_eq!(paths(&violations, RuleKind::Required), vec!["states[0].dataConditions[1]"]);
    }

    #[test]
    fn test_handler_back_to_own_state_is_recursive() {
        let workflow = Workflow::from_states(
            "w",
            vec![State::sleep("A", "PT1S")
                .with_on_error(OnError::transition("Oops", "A"))
                .with_end()],
        )
        .with_error(crate::model::ErrorDef::new("Oops"));
        let violations = validate(&workflow);
        assert_eq!(paths(&violations, RuleKind::Recursive), vec!["states[0].onErrors[0].transition.nextState"]);
    }

    #[test]
    fn test_continue_as() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "A",
                "states": [
                    {"name": "A", "type": "sleep", "duration": "PT1S",
                     "end": {"continueAs": {"workflowId": "",
                                            "workflowExecTimeout": "forever"}}}
                ]
            }"#,
        )
        .unwrap();
        let violations = validate(&workflow);
        assert_eq!(paths(&violations, RuleKind::Required), vec!["states[0].end.continueAs.workflowId"]);
        assert_eq!(
            paths(&violations, RuleKind::Duration),
            vec!["states[0].end.continueAs.workflowExecTimeout.duration"]
        );
    }
}
