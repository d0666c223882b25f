//! Rule Combinators
//!
//! Small pure checks shared by every validation scope. Each returns the
//! violations it finds without side effects, so scopes compose them freely.

use std::collections::HashSet;

use super::violation::{RuleKind, Violation};
use super::{DurationParser, ExpressionChecker};
use crate::index::{Bucket, ReferenceIndex};
use crate::model::{ExpressionLang, IntOrString};
use crate::report::{phrase, phrase_none_of};

/// Last named segment of a path: `states[0].transition.nextState` gives
/// `nextState`, `functions[2]` gives `functions`.
pub fn field_of(path: &str) -> &str {
    let last = path.rsplit('.').next().unwrap_or(path);
    last.split('[').next().unwrap_or(last)
}

/// Exactly one member of a group may be set.
///
/// Zero set members is a `required` violation when `required` holds and is
/// accepted otherwise; two or more is an `exclusive` violation. The
/// violation is reported at `path`, the object owning the group.
pub fn exclusive(path: &str, members: &[(&str, bool)], required: bool) -> Option<Violation> {
    let names: Vec<&str> = members.iter().map(|(name, _)| *name).collect();
    let set: Vec<&str> = members
        .iter()
        .filter(|(_, is_set)| *is_set)
        .map(|(name, _)| *name)
        .collect();

    match set.len() {
        1 => None,
        0 if required => Some(Violation::new(path, RuleKind::Required, "", phrase_none_of(&names))),
        0 => None,
        _ => {
            let found = set.join(", ");
            let message = phrase(RuleKind::Exclusive, field_of(path), &found, &names.join(", "));
            Some(Violation::new(path, RuleKind::Exclusive, found, message))
        }
    }
}

/// A mandatory text field must be non-blank.
pub fn required(path: &str, value: &str) -> Option<Violation> {
    if value.trim().is_empty() {
        Some(Violation::new(
            path,
            RuleKind::Required,
            value,
            phrase(RuleKind::Required, field_of(path), value, ""),
        ))
    } else {
        None
    }
}

/// A field required only when another field is absent.
pub fn required_without(path: &str, present: bool, other: &str, other_present: bool) -> Option<Violation> {
    if present || other_present {
        None
    } else {
        Some(Violation::new(
            path,
            RuleKind::Required,
            "",
            phrase(RuleKind::Required, field_of(path), "", other),
        ))
    }
}

/// A name must resolve in `bucket`.
pub fn exists(index: &ReferenceIndex<'_>, bucket: Bucket, path: &str, name: &str) -> Option<Violation> {
    if index.contains(bucket, name) {
        None
    } else {
        Some(Violation::new(
            path,
            RuleKind::Exists,
            name,
            phrase(RuleKind::Exists, field_of(path), name, bucket.noun()),
        ))
    }
}

/// Every name of a list must resolve; one violation per missing name at
/// `path[i]`.
pub fn exists_all<S: AsRef<str>>(
    index: &ReferenceIndex<'_>,
    bucket: Bucket,
    path: &str,
    names: &[S],
) -> Vec<Violation> {
    names
        .iter()
        .enumerate()
        .filter_map(|(i, name)| exists(index, bucket, &format!("{}[{}]", path, i), name.as_ref()))
        .collect()
}

/// Names within one collection must not repeat.
///
/// Reports a single violation for the collection, listing every repeated
/// name once in first-repeat order.
pub fn unique<'n>(path: &str, noun: &str, names: impl IntoIterator<Item = &'n str>) -> Option<Violation> {
    let mut seen = HashSet::new();
    let mut repeated: Vec<&str> = Vec::new();
    for name in names {
        if !seen.insert(name) && !repeated.contains(&name) {
            repeated.push(name);
        }
    }

    if repeated.is_empty() {
        return None;
    }
    let value = repeated.join(", ");
    let message = phrase(RuleKind::Unique, field_of(path), &value, noun);
    Some(Violation::new(path, RuleKind::Unique, value, message))
}

/// An int-or-string field must parse to a strictly positive integer.
pub fn gt0(path: &str, value: &IntOrString) -> Option<Violation> {
    match value.as_int() {
        Some(n) if n > 0 => None,
        _ => {
            let text = value.as_text();
            Some(Violation::new(
                path,
                RuleKind::Gt0,
                text.clone(),
                phrase(RuleKind::Gt0, field_of(path), &text, ""),
            ))
        }
    }
}

/// A non-empty field must parse as an ISO 8601 duration.
pub fn duration(parser: &dyn DurationParser, path: &str, value: &str) -> Option<Violation> {
    if value.is_empty() {
        return None;
    }
    parser.parse_duration(value).err().map(|reason| {
        Violation::new(
            path,
            RuleKind::Duration,
            value,
            phrase(RuleKind::Duration, field_of(path), value, &reason),
        )
    })
}

/// Optional duration field.
pub fn duration_opt(parser: &dyn DurationParser, path: &str, value: Option<&str>) -> Option<Violation> {
    value.and_then(|v| duration(parser, path, v))
}

/// A non-empty expression must be accepted by the checker.
pub fn expression(
    checker: &dyn ExpressionChecker,
    lang: ExpressionLang,
    path: &str,
    value: &str,
) -> Option<Violation> {
    if value.trim().is_empty() {
        return None;
    }
    checker.check(value, lang).err().map(|reason| {
        Violation::new(
            path,
            RuleKind::Expression,
            value,
            phrase(RuleKind::Expression, field_of(path), value, &reason),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{State, Workflow};
    use crate::validator::Iso8601Durations;

    #[test]
    fn test_field_of() {
        assert_eq!(field_of("states[0].transition.nextState"), "nextState");
        assert_eq!(field_of("functions[2]"), "functions");
        assert_eq!(field_of("id"), "id");
    }

    #[test]
    fn test_exclusive_law() {
        let path = "states[0].actions[0]";
        assert!(exclusive(path, &[("functionRef", true), ("eventRef", false)], true).is_none());

        let both = exclusive(path, &[("functionRef", true), ("eventRef", true)], true).unwrap();
        assert_eq!(both.rule, RuleKind::Exclusive);
        assert_eq!(both.path, path);
        assert_eq!(both.value, "functionRef, eventRef");

        let none = exclusive(path, &[("functionRef", false), ("eventRef", false)], true).unwrap();
        assert_eq!(none.rule, RuleKind::Required);
        assert!(exclusive(path, &[("a", false), ("b", false)], false).is_none());
    }

    #[test]
    fn test_required_without() {
        let v = required_without("id", false, "key", false).unwrap();
        assert_eq!(v.message, "id required when key is not defined");
        assert!(required_without("id", false, "key", true).is_none());
    }

    #[test]
    fn test_exists_all_paths() {
        let workflow = Workflow::from_states("w", vec![State::sleep("A", "PT1S")]);
        let index = ReferenceIndex::build(&workflow);
        let names = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let violations = exists_all(&index, Bucket::States, "refs", &names);
        let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["refs[1]", "refs[2]"]);
        assert_eq!(violations[0].value, "B");
    }

    #[test]
    fn test_unique_one_violation_per_collection() {
        let v = unique("states", "state", ["s1", "s1", "s2", "s1", "s2"]).unwrap();
        assert_eq!(v.value, "s1, s2");
        assert!(v.message.contains("duplicate"));
        assert!(unique("states", "state", ["a", "b"]).is_none());
    }

    #[test]
    fn test_gt0() {
        assert!(gt0("n", &IntOrString::Int(2)).is_none());
        assert!(gt0("n", &"5%".into()).is_none());
        assert_eq!(gt0("n", &"0".into()).unwrap().rule, RuleKind::Gt0);
        assert!(gt0("n", &IntOrString::Int(-1)).is_some());
        assert!(gt0("n", &"many".into()).is_some());
    }

    #[test]
    fn test_duration() {
        let parser = Iso8601Durations;
        assert!(duration(&parser, "d", "PT1M").is_none());
        assert!(duration(&parser, "d", "").is_none());
        let v = duration(&parser, "states[0].duration", "1 minute").unwrap();
        assert_eq!(v.rule, RuleKind::Duration);
        assert_eq!(v.value, "1 minute");
    }

    #[test]
    fn test_duration_must_match_whole_input() {
        let parser = Iso8601Durations;
        for accepted in ["PT1S", "P1DT2H", "P3Y6M4DT12H30M5S", "PT15M"] {
            assert!(duration(&parser, "d", accepted).is_none(), "{}", accepted);
        }
        for rejected in ["PT1Sgarbage", "PT1S PT2S", "PT", "P", "P1DT", "PT1S1H", " PT1S", "1S"] {
            let v = duration(&parser, "d", rejected);
            assert_eq!(v.map(|v| v.rule), Some(RuleKind::Duration), "{}", rejected);
        }
    }
}
