//! Workflow-level checks: identity, start, uniqueness of every named
//! collection and the definitions declared at the root.

use super::rules::{exclusive, exists, required, required_without, unique};
use super::violation::Violation;
use super::Context;
use crate::index::Bucket;
use crate::model::{
    Auth, Event, FloatOrString, Function, Retry, Start, Timeouts, Workflow, UNLIMITED,
};

pub(super) fn check(ctx: &Context<'_, '_>) -> Vec<Violation> {
    let workflow = ctx.index.workflow();
    let mut found = Vec::new();

    // Identity
    found.extend(required_without("id", workflow.id.is_some(), "key", workflow.key.is_some()));
    found.extend(required("specVersion", &workflow.spec_version));
    if workflow.states.is_empty() {
        found.extend(required("states", ""));
    }

    // Named collections
    found.extend(check_uniqueness(workflow));

    if let Some(start) = &workflow.start {
        found.extend(check_start(ctx, start));
    }
    if let Some(timeouts) = &workflow.timeouts {
        found.extend(check_timeouts(ctx, "timeouts", timeouts));
    }

    // Definitions
    for (i, function) in workflow.functions.iter().enumerate() {
        found.extend(check_function(ctx, &format!("functions[{}]", i), function));
    }
    for (i, event) in workflow.events.iter().enumerate() {
        found.extend(check_event(&format!("events[{}]", i), event));
    }
    for (i, retry) in workflow.retries.iter().enumerate() {
        found.extend(check_retry(ctx, &format!("retries[{}]", i), retry));
    }
    for (i, error) in workflow.errors.iter().enumerate() {
        found.extend(required(&format!("errors[{}].name", i), &error.name));
    }
    for (i, auth) in workflow.auth.iter().enumerate() {
        found.extend(check_auth(ctx, &format!("auth[{}]", i), auth));
    }

    found
}

fn check_uniqueness(workflow: &Workflow) -> Vec<Violation> {
    [
        unique("states", "state", workflow.states.iter().map(|s| s.name.as_str())),
        unique("functions", "function", workflow.functions.iter().map(|f| f.name.as_str())),
        unique("events", "event", workflow.events.iter().map(|e| e.name.as_str())),
        unique("retries", "retry", workflow.retries.iter().map(|r| r.name.as_str())),
        unique("errors", "error", workflow.errors.iter().map(|e| e.name.as_str())),
        unique("auth", "auth", workflow.auth.iter().map(|a| a.name.as_str())),
        unique("secrets", "secret", workflow.secrets.iter().map(String::as_str)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn check_start(ctx: &Context<'_, '_>, start: &Start) -> Vec<Violation> {
    let mut found = Vec::new();
    let path = "start.stateName";

    // Start state
    if let Some(v) = required(path, &start.state_name) {
        found.push(v);
    } else {
        found.extend(exists(&ctx.index, Bucket::States, path, &start.state_name));
    }

    if let Some(schedule) = &start.schedule {
        let base = "start.schedule";
        found.extend(exclusive(
            base,
            &[
                ("interval", schedule.interval.is_some()),
                ("cron", schedule.cron.is_some()),
            ],
            true,
        ));
        found.extend(ctx.duration_opt("start.schedule.interval", schedule.interval.as_deref()));
        if let Some(cron) = &schedule.cron {
            found.extend(required("start.schedule.cron.expression", &cron.expression));
        }
    }

    found
}

/// Checks the workflow-level timeouts block.
fn check_timeouts(ctx: &Context<'_, '_>, base: &str, timeouts: &Timeouts) -> Vec<Violation> {
    let mut found = Vec::new();

    if let Some(exec) = &timeouts.workflow_exec_timeout {
        let path = format!("{}.workflowExecTimeout.duration", base);
        if exec.duration != UNLIMITED {
            found.extend(required(&path, &exec.duration));
            found.extend(ctx.duration(&path, &exec.duration));
        }
        if let Some(run_before) = &exec.run_before {
            found.extend(exists(
                &ctx.index,
                Bucket::States,
                &format!("{}.workflowExecTimeout.runBefore", base),
                run_before,
            ));
        }
    }
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

fn check_function(ctx: &Context<'_, '_>, base: &str, function: &Function) -> Vec<Violation> {
    let mut found = Vec::new();
    found.extend(required(&format!("{}.name", base), &function.name));
    found.extend(required(&format!("{}.operation", base), &function.operation));
    if let Some(auth_ref) = &function.auth_ref {
        found.extend(exists(&ctx.index, Bucket::Auth, &format!("{}.authRef", base), auth_ref));
    }
    found
}

fn check_event(base: &str, event: &Event) -> Vec<Violation> {
    let mut found = Vec::new();
    found.extend(required(&format!("{}.name", base), &event.name));
    found.extend(required(&format!("{}.type", base), &event.event_type));
    for (i, correlation) in event.correlation.iter().enumerate() {
        found.extend(required(
            &format!("{}.correlation[{}].contextAttributeName", base, i),
            &correlation.context_attribute_name,
        ));
    }
    found
}

fn check_retry(ctx: &Context<'_, '_>, base: &str, retry: &Retry) -> Vec<Violation> {
    let mut found = Vec::new();
    found.extend(required(&format!("{}.name", base), &retry.name));

    let max_attempts = format!("{}.maxAttempts", base);
    match &retry.max_attempts {
        None => found.extend(required(&max_attempts, "")),
        Some(value) => found.extend(required(&max_attempts, &value.as_text())),
    }

    for (field, value) in [
        ("delay", &retry.delay),
        ("maxDelay", &retry.max_delay),
        ("increment", &retry.increment),
    ] {
        found.extend(ctx.duration_opt(&format!("{}.{}", base, field), value.as_deref()));
    }
    if let Some(FloatOrString::String(jitter)) = &retry.jitter {
        found.extend(ctx.duration(&format!("{}.jitter", base), jitter));
    }
    found
}

fn check_auth(ctx: &Context<'_, '_>, base: &str, auth: &Auth) -> Vec<Violation> {
    let mut found = Vec::new();
    found.extend(required(&format!("{}.name", base), &auth.name));

    let properties = &auth.properties;
    let path = format!("{}.properties", base);
    found.extend(exclusive(
        &path,
        &[
            ("secret", properties.secret().is_some()),
            ("inline credentials", properties.has_inline_credentials()),
        ],
        true,
    ));

    // Secret reference or inline credentials
    if let Some(secret) = properties.secret() {
        found.extend(exists(&ctx.index, Bucket::Secrets, &format!("{}.secret", path), secret));
    } else if properties.has_inline_credentials() {
        for field in properties.missing_inline_fields() {
            found.extend(required(&format!("{}.{}", path, field), ""));
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use crate::decode::from_str;
    use crate::model::{Auth, AuthProperties, AuthScheme, State, Workflow};
    use crate::validator::{validate, RuleKind};

    fn paths_of(workflow: &Workflow, rule: RuleKind) -> Vec<String> {
        validate(workflow)
            .into_iter()
            .filter(|v| v.rule == rule)
            .map(|v| v.path)
            .collect()
    }

    fn minimal() -> Workflow {
        Workflow::from_states("w", vec![State::sleep("A", "PT1S").with_end()])
    }

    #[test]
    fn test_key_satisfies_identity() {
        let mut workflow = minimal();
        workflow.id = None;
        workflow.key = Some("k".into());
        assert!(paths_of(&workflow, RuleKind::Required).is_empty());
    }

    #[test]
    fn test_missing_start_state() {
        let mut workflow = minimal();
        workflow.start = Some(crate::model::Start::at("Nowhere"));
        assert_eq!(paths_of(&workflow, RuleKind::Exists), vec!["start.stateName"]);
    }

    #[test]
    fn test_start_check_is_existence_only() {
        let workflow = Workflow::from_states(
            "w",
            vec![State::sleep("Undo", "PT1S").for_compensation().with_end()],
        );
        assert!(validate(&workflow).is_empty());
    }

    #[test]
    fn test_empty_states_and_spec_version() {
        let workflow = Workflow::new("w", "");
        assert_eq!(
            paths_of(&workflow, RuleKind::Required),
            vec!["specVersion", "states"]
        );
    }

    #[test]
    fn test_duplicate_secrets_and_functions() {
        let mut workflow = minimal()
            .with_function(crate::model::Function::new("f", "a#b"))
            .with_function(crate::model::Function::new("f", "a#c"));
        workflow.secrets = vec!["s".into(), "s".into()];
        assert_eq!(paths_of(&workflow, RuleKind::Unique), vec!["functions", "secrets"]);
    }

    #[test]
    fn test_function_auth_ref() {
        let mut function = crate::model::Function::new("f", "a#b");
        function.auth_ref = Some("missing".into());
        let workflow = minimal().with_function(function);
        assert_eq!(paths_of(&workflow, RuleKind::Exists), vec!["functions[0].authRef"]);
    }

    #[test]
    fn test_retry_rules() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "A",
                "retries": [
                    {"name": "r1", "delay": "PT1S", "jitter": "PT2S", "maxAttempts": 3},
                    {"name": "r2", "delay": "one second", "jitter": 0.2}
                ],
                "states": [{"name": "A", "type": "sleep", "duration": "PT1S", "end": true}]
            }"#,
        )
        .unwrap();
        assert_eq!(paths_of(&workflow, RuleKind::Required), vec!["retries[1].maxAttempts"]);
        assert_eq!(paths_of(&workflow, RuleKind::Duration), vec!["retries[1].delay"]);
    }

    #[test]
    fn test_workflow_exec_timeout_unlimited() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8", "start": "A",
                "timeouts": {
                    "workflowExecTimeout": {},
                    "stateExecTimeout": "later",
                    "eventTimeout": "PT1M"
                },
                "states": [{"name": "A", "type": "sleep", "duration": "PT1S", "end": true}]
            }"#,
        )
        .unwrap();
        assert_eq!(
            paths_of(&workflow, RuleKind::Duration),
            vec!["timeouts.stateExecTimeout.total"]
        );
    }

    #[test]
    fn test_schedule_interval_xor_cron() {
        let workflow = from_str(
            r#"{
                "id": "w", "specVersion": "0.8",
                "start": {"stateName": "A", "schedule": {
                    "interval": "PT1H", "cron": "0 * * * *"
                }},
                "states": [{"name": "A", "type": "sleep", "duration": "PT1S", "end": true}]
            }"#,
        )
        .unwrap();
        assert_eq!(paths_of(&workflow, RuleKind::Exclusive), vec!["start.schedule"]);
    }

    #[test]
    fn test_auth_secret_and_inline_credentials() {
        let mut workflow = minimal()
            .with_auth(Auth::new("a", AuthProperties::from_secret(AuthScheme::Bearer, "token")))
            .with_auth(Auth::new("b", AuthProperties::empty(AuthScheme::Basic)));
        workflow.secrets = vec!["other".into()];
        assert_eq!(paths_of(&workflow, RuleKind::Exists), vec!["auth[0].properties.secret"]);
        assert_eq!(paths_of(&workflow, RuleKind::Required), vec!["auth[1].properties"]);

        let partial = minimal().with_auth(Auth::new(
            "c",
            AuthProperties::Basic(crate::model::BasicAuthProperties {
                username: Some("u".into()),
                ..Default::default()
            }),
        ));
        assert_eq!(
            paths_of(&partial, RuleKind::Required),
            vec!["auth[0].properties.password"]
        );
    }
}
