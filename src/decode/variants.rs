//! Tagged Union Decoding
//!
//! States and auth definitions are unions selected by a marker field
//! (`type` and `scheme`). The marker is read first and the rest of the
//! object is decoded into the matching variant; an unknown marker aborts
//! the decode with the list of accepted values.
//!
//! Actions and the containers that hold them are decoded here too, so that
//! shape errors deep inside a state carry their full path.

use log::trace;
use serde_json::Value;

use super::shape::{bool_or_object, decode_value, Fields};
use crate::error::DecodeError;
use crate::model::{
    Action, Auth, AuthProperties, AuthScheme, Branch, CallbackState, DelayState, End, EventState,
    ForEachState, InjectState, OnEvents, OperationState, ParallelState, SleepState, State,
    StateKind, SwitchState, STATE_TYPES,
};

/// Decodes one entry of `states`.
pub fn decode_state(value: Value, path: String) -> Result<State, DecodeError> {
    let mut fields = Fields::new(value, path)?;

    let type_name: String = match fields.opt("type")? {
        Some(name) => name,
        None => {
            return Err(DecodeError::UnsupportedShape {
                path: fields.path_of("type"),
                accepted: format!("one of {}", STATE_TYPES.join(", ")),
            })
        }
    };
    if !STATE_TYPES.contains(&type_name.as_str()) {
        return Err(DecodeError::UnknownVariant {
            path: fields.path_of("type"),
            value: type_name,
            accepted: STATE_TYPES.join(", "),
        });
    }
    trace!("Decoding {} state at {}", type_name, fields.path());

    let name: String = fields.or_default("name")?;
    let on_errors = fields.list("onErrors")?;
    let transition = fields.shorthand("transition")?;
    let end = fields.object_with("end", bool_or_object::<End>)?.flatten();
    let state_data_filter = fields.opt("stateDataFilter")?;
    let compensated_by = fields.opt("compensatedBy")?;
    let used_for_compensation = fields.or_default("usedForCompensation")?;
    let metadata = fields.opt("metadata")?;
    let timeouts = fields.opt("timeouts")?;

    let kind = match type_name.as_str() {
        "delay" => StateKind::Delay(DelayState {
            time_delay: fields.or_default("timeDelay")?,
        }),
        "event" => StateKind::Event(EventState {
            exclusive: fields.or("exclusive", true)?,
            on_events: fields.list_with("onEvents", decode_on_events)?,
        }),
        "operation" => StateKind::Operation(OperationState {
            action_mode: fields.or_default("actionMode")?,
            actions: fields.list_with("actions", decode_action)?,
        }),
        "parallel" => StateKind::Parallel(ParallelState {
            branches: fields.list_with("branches", decode_branch)?,
            completion_type: fields.or_default("completionType")?,
            num_completed: fields.opt("numCompleted")?,
        }),
        "switch" => StateKind::Switch(SwitchState {
            data_conditions: fields.list("dataConditions")?,
            event_conditions: fields.list("eventConditions")?,
            default_condition: fields.shorthand("defaultCondition")?.unwrap_or_default(),
        }),
        "foreach" => StateKind::ForEach(ForEachState {
            input_collection: fields.or_default("inputCollection")?,
            output_collection: fields.opt("outputCollection")?,
            iteration_param: fields.opt("iterationParam")?,
            batch_size: fields.opt("batchSize")?,
            actions: fields.list_with("actions", decode_action)?,
            mode: fields.or_default("mode")?,
        }),
        "inject" => StateKind::Inject(InjectState {
            data: fields.or_default("data")?,
        }),
        "callback" => StateKind::Callback(CallbackState {
            action: fields
                .object_with("action", decode_action)?
                .unwrap_or_default(),
            event_ref: fields.or_default("eventRef")?,
            event_data_filter: fields.opt("eventDataFilter")?,
        }),
        _ => StateKind::Sleep(SleepState {
            duration: fields.or_default("duration")?,
        }),
    };

    Ok(State {
        name,
        on_errors,
        transition,
        end,
        state_data_filter,
        compensated_by,
        used_for_compensation,
        metadata,
        timeouts,
        kind,
    })
}

/// Decodes one action, keeping the path of its reference fields.
pub fn decode_action(value: Value, path: String) -> Result<Action, DecodeError> {
    let mut fields = Fields::new(value, path)?;

    Ok(Action {
        id: fields.opt("id")?,
        name: fields.opt("name")?,
        function_ref: fields.shorthand("functionRef")?,
        event_ref: fields.opt("eventRef")?,
        sub_flow_ref: fields.shorthand("subFlowRef")?,
        sleep: fields.opt("sleep")?,
        retry_ref: fields.opt("retryRef")?,
        non_retryable_errors: fields.or_default("nonRetryableErrors")?,
        retryable_errors: fields.or_default("retryableErrors")?,
        action_data_filter: fields.or_default("actionDataFilter")?,
        condition: fields.opt("condition")?,
    })
}

fn decode_branch(value: Value, path: String) -> Result<Branch, DecodeError> {
    let mut fields = Fields::new(value, path)?;

    Ok(Branch {
        name: fields.or_default("name")?,
        actions: fields.list_with("actions", decode_action)?,
        timeouts: fields.opt("timeouts")?,
    })
}

fn decode_on_events(value: Value, path: String) -> Result<OnEvents, DecodeError> {
    let mut fields = Fields::new(value, path)?;

    Ok(OnEvents {
        event_refs: fields.or_default("eventRefs")?,
        action_mode: fields.or_default("actionMode")?,
        actions: fields.list_with("actions", decode_action)?,
        event_data_filter: fields.opt("eventDataFilter")?,
    })
}

/// Decodes one entry of `auth`.
///
/// `scheme` defaults to `basic`. `properties` is either an object shaped
/// for the scheme or a string naming the secret that holds it.
pub fn decode_auth(value: Value, path: String) -> Result<Auth, DecodeError> {
    let mut fields = Fields::new(value, path)?;

    let name: String = fields.or_default("name")?;
    let scheme_name: String = fields.or("scheme", AuthScheme::Basic.as_str().to_string())?;
    let scheme = AuthScheme::parse(&scheme_name).ok_or_else(|| DecodeError::UnknownVariant {
        path: fields.path_of("scheme"),
        value: scheme_name.clone(),
        accepted: AuthScheme::ACCEPTED.to_string(),
    })?;

    let properties_path = fields.path_of("properties");
    let properties = match fields.take_raw("properties") {
        None => AuthProperties::empty(scheme),
        Some(Value::String(secret)) => AuthProperties::from_secret(scheme, secret),
        Some(raw @ Value::Object(_)) => match scheme {
            AuthScheme::Basic => AuthProperties::Basic(decode_value(raw, properties_path)?),
            AuthScheme::Bearer => AuthProperties::Bearer(decode_value(raw, properties_path)?),
            AuthScheme::OAuth2 => AuthProperties::OAuth2(decode_value(raw, properties_path)?),
        },
        Some(_) => {
            return Err(DecodeError::UnsupportedShape {
                path: properties_path,
                accepted: "string or object".to_string(),
            })
        }
    };

    Ok(Auth::new(name, properties))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionMode, CompletionType, Invoke};
    use serde_json::json;

    fn state(value: Value) -> Result<State, DecodeError> {
        decode_state(value, "states[0]".to_string())
    }

    #[test]
    fn test_operation_state() {
        let decoded = state(json!({
            "name": "Check",
            "type": "operation",
            "actions": [
                {"functionRef": "checkInventory"},
                {"functionRef": {"refName": "notify", "invoke": "async"}}
            ],
            "transition": "Charge"
        }))
        .unwrap();

        assert_eq!(decoded.name, "Check");
        assert_eq!(decoded.transition.unwrap().next_state, "Charge");
        match decoded.kind {
            StateKind::Operation(op) => {
                assert_eq!(op.action_mode, ActionMode::Sequential);
                assert_eq!(op.actions.len(), 2);
                let first = op.actions[0].function_ref.as_ref().unwrap();
                assert_eq!(first.ref_name, "checkInventory");
                assert_eq!(first.invoke, Invoke::Sync);
                assert!(first.arguments.is_none());
                assert_eq!(
                    op.actions[1].function_ref.as_ref().unwrap().invoke,
                    Invoke::Async
                );
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_state_type() {
        let err = state(json!({"name": "X", "type": "wait"})).unwrap_err();
        match &err {
            DecodeError::UnknownVariant { path, value, accepted } => {
                assert_eq!(path, "states[0].type");
                assert_eq!(value, "wait");
                assert!(accepted.contains("operation"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_state_type() {
        let err = state(json!({"name": "X"})).unwrap_err();
        assert_eq!(err.path(), Some("states[0].type"));
    }

    #[test]
    fn test_function_ref_shape_error_path() {
        let err = state(json!({
            "name": "Check",
            "type": "operation",
            "actions": [{"functionRef": 42}]
        }))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "states[0].actions[0].functionRef must be string or object"
        );
    }

    #[test]
    fn test_end_shapes() {
        let ended = state(json!({"name": "A", "type": "inject", "end": true})).unwrap();
        assert!(ended.end.is_some());

        let not_ended = state(json!({"name": "A", "type": "inject", "end": false})).unwrap();
        assert!(not_ended.end.is_none());

        let terminated = state(json!({
            "name": "A", "type": "inject", "end": {"terminate": true}
        }))
        .unwrap();
        assert!(terminated.end.unwrap().terminate);
    }

    #[test]
    fn test_parallel_branch_paths() {
        let err = state(json!({
            "name": "Fan",
            "type": "parallel",
            "branches": [
                {"name": "a", "actions": []},
                {"name": "b", "actions": [{"subFlowRef": []}]}
            ]
        }))
        .unwrap_err();
        assert_eq!(err.path(), Some("states[0].branches[1].actions[0].subFlowRef"));
    }

    #[test]
    fn test_parallel_defaults() {
        let decoded = state(json!({
            "name": "Fan", "type": "parallel", "branches": [{"name": "a", "actions": []}]
        }))
        .unwrap();
        match decoded.kind {
            StateKind::Parallel(p) => {
                assert_eq!(p.completion_type, CompletionType::AllOf);
                assert_eq!(p.branches[0].name, "a");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_switch_default_condition_shorthand() {
        let decoded = state(json!({
            "name": "Route",
            "type": "switch",
            "dataConditions": [{"condition": "${ .ok }", "transition": "Ship"}],
            "defaultCondition": "Reject"
        }))
        .unwrap();
        match decoded.kind {
            StateKind::Switch(s) => {
                assert_eq!(
                    s.data_conditions[0].transition.as_ref().unwrap().next_state,
                    "Ship"
                );
                assert_eq!(
                    s.default_condition.transition.unwrap().next_state,
                    "Reject"
                );
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_event_state_exclusive_default() {
        let decoded = state(json!({
            "name": "Wait",
            "type": "event",
            "onEvents": [{"eventRefs": ["OrderPlaced"], "actions": [{"functionRef": "f"}]}]
        }))
        .unwrap();
        match decoded.kind {
            StateKind::Event(e) => {
                assert!(e.exclusive);
                assert_eq!(e.on_events[0].event_refs, vec!["OrderPlaced"]);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_callback_state() {
        let decoded = state(json!({
            "name": "Approve",
            "type": "callback",
            "action": {"functionRef": "requestApproval"},
            "eventRef": "Approved"
        }))
        .unwrap();
        match decoded.kind {
            StateKind::Callback(c) => {
                assert_eq!(c.event_ref, "Approved");
                assert!(c.action.function_ref.is_some());
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_auth_scheme_default_and_secret_shorthand() {
        let auth = decode_auth(json!({"name": "a", "properties": "mySecret"}), "auth[0]".into())
            .unwrap();
        assert_eq!(auth.scheme(), AuthScheme::Basic);
        assert_eq!(auth.properties.secret(), Some("mySecret"));
    }

    #[test]
    fn test_auth_oauth2_properties() {
        let auth = decode_auth(
            json!({
                "name": "idp",
                "scheme": "oauth2",
                "properties": {
                    "authority": "https://idp.example.com",
                    "grantType": "clientCredentials",
                    "clientId": "swflow"
                }
            }),
            "auth[0]".into(),
        )
        .unwrap();
        match auth.properties {
            AuthProperties::OAuth2(p) => {
                assert_eq!(p.client_id.as_deref(), Some("swflow"));
                assert!(p.grant_type.is_some());
            }
            other => panic!("unexpected properties: {:?}", other),
        }
    }

    #[test]
    fn test_auth_unknown_scheme() {
        let err = decode_auth(json!({"name": "a", "scheme": "digest"}), "auth[1]".into())
            .unwrap_err();
        assert_eq!(err.path(), Some("auth[1].scheme"));
        assert!(err.to_string().contains("basic, bearer, oauth2"));
    }

    #[test]
    fn test_auth_properties_wrong_shape() {
        let err = decode_auth(json!({"name": "a", "properties": 7}), "auth[0]".into())
            .unwrap_err();
        assert_eq!(err.to_string(), "auth[0].properties must be string or object");
    }
}
