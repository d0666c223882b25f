//! Consistency Validation
//!
//! Checks a decoded [`Workflow`] for problems the type system cannot rule
//! out: dangling names, duplicates, mutually exclusive fields, malformed
//! durations and an unsound compensation graph.
//!
//! Validation never stops at the first problem. Every independent
//! violation in the document is collected and returned together; callers
//! decide what to do with them.
//!
//! # Structure
//!
//! - [`violation`]: `Violation`, `RuleKind` and error categories
//! - [`rules`]: Reusable pure rule combinators
//! - `workflow`: Root-level scope (uniqueness, start, definitions)
//! - `state`: Per-state scope (actions, handlers, compensation, payloads)
//! - `transition`: Transition/end edges (existence, recursion, isolation)
//!
//! # Example
//!
//! ```
//! use swflow::model::{State, Workflow};
//! use swflow::validator::{validate, RuleKind};
//!
//! let workflow = Workflow::from_states(
//!     "order",
//!     vec![State::sleep("Wait", "PT5S").with_transition("Missing")],
//! );
//! let violations = validate(&workflow);
//! assert_eq!(violations.len(), 1);
//! assert_eq!(violations[0].rule, RuleKind::Exists);
//! assert_eq!(violations[0].path, "states[0].transition.nextState");
//! ```

pub mod rules;
mod state;
mod transition;
pub mod violation;
mod workflow;

use log::{debug, info};

pub use violation::{Category, RuleKind, Violation};

use crate::index::ReferenceIndex;
use crate::model::{ExpressionLang, Workflow};
use crate::report::Report;

/// Checks that a string is an ISO 8601 duration.
pub trait DurationParser: Send + Sync {
    fn parse_duration(&self, text: &str) -> Result<(), String>;
}

/// ISO 8601 durations in designator form (`P1DT2H`, `PT30S`).
///
/// The whole input must match; `iso8601` then parses the values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Iso8601Durations;

impl DurationParser for Iso8601Durations {
    fn parse_duration(&self, text: &str) -> Result<(), String> {
        designators(text)?;
        iso8601::duration(text).map(|_| ())
    }
}

/// Full-match check of `PnYnMnWnDTnHnMnS` with at least one component.
fn designators(text: &str) -> Result<(), String> {
    let rest = text
        .strip_prefix('P')
        .ok_or_else(|| "must start with P".to_string())?;
    let (date, time) = match rest.split_once('T') {
        Some((_, "")) => return Err("T must be followed by a time component".to_string()),
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut count = components(date, &['Y', 'M', 'W', 'D'])?;
    if let Some(time) = time {
        count += components(time, &['H', 'M', 'S'])?;
    }
    if count == 0 {
        return Err("has no components".to_string());
    }
    Ok(())
}

/// Counts `<number><designator>` pairs; designators must follow `order`.
fn components(mut text: &str, order: &[char]) -> Result<usize, String> {
    let mut next = 0;
    let mut count = 0;
    let mut fractional = false;

    while !text.is_empty() {
        if fractional {
            return Err("only the last component may have a fraction".to_string());
        }
        let end = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
            .ok_or_else(|| format!("{:?} has no designator", text))?;
        let (number, tail) = text.split_at(end);
        let Some(designator) = tail.chars().next() else {
            return Err(format!("{:?} has no designator", text));
        };

        let valid = match number.split_once(|c| c == '.' || c == ',') {
            Some((whole, fraction)) => {
                !whole.is_empty()
                    && !fraction.is_empty()
                    && fraction.chars().all(|c| c.is_ascii_digit())
            }
            None => !number.is_empty(),
        };
        if !valid {
            return Err(format!("invalid number before {:?}", designator));
        }

        let position = order[next..]
            .iter()
            .position(|&d| d == designator)
            .ok_or_else(|| format!("unexpected {:?}", designator))?;
        next += position + 1;
        fractional = number.contains(|c| c == '.' || c == ',');
        count += 1;
        text = &tail[designator.len_utf8()..];
    }
    Ok(count)
}

/// Checks the syntax of a workflow expression.
///
/// No checker is installed by default; expressions are only validated
/// when one is supplied.
pub trait ExpressionChecker: Send + Sync {
    fn check(&self, expression: &str, lang: ExpressionLang) -> Result<(), String>;
}

impl<F> ExpressionChecker for F
where
    F: Fn(&str, ExpressionLang) -> Result<(), String> + Send + Sync,
{
    fn check(&self, expression: &str, lang: ExpressionLang) -> Result<(), String> {
        self(expression, lang)
    }
}

/// Configurable validator.
pub struct Validator {
    durations: Box<dyn DurationParser>,
    expressions: Option<Box<dyn ExpressionChecker>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("expressions", &self.expressions.is_some())
            .finish_non_exhaustive()
    }
}

impl Validator {
    /// ISO 8601 durations, no expression checking.
    pub fn new() -> Self {
        Self {
            durations: Box::new(Iso8601Durations),
            expressions: None,
        }
    }

    pub fn with_duration_parser(mut self, parser: impl DurationParser + 'static) -> Self {
        self.durations = Box::new(parser);
        self
    }

    pub fn with_expression_checker(mut self, checker: impl ExpressionChecker + 'static) -> Self {
        self.expressions = Some(Box::new(checker));
        self
    }

    /// Returns every violation found in `workflow`.
    ///
    /// The result depends only on the workflow: repeated calls return the
    /// same violations in the same order.
    pub fn validate(&self, workflow: &Workflow) -> Vec<Violation> {
        info!(
            "Validating workflow '{}' with {} states",
            workflow.label(),
            workflow.states.len()
        );

        let ctx = Context {
            index: ReferenceIndex::build(workflow),
            durations: self.durations.as_ref(),
            expressions: self.expressions.as_deref(),
            lang: workflow.expression_lang,
        };

        let mut violations = workflow::check(&ctx);
        for (i, state) in workflow.states.iter().enumerate() {
            let before = violations.len();
            violations.extend(state::check(&ctx, i, state));
            violations.extend(transition::check(&ctx, i));
            debug!(
                "State '{}' produced {} violations",
                state.name,
                violations.len() - before
            );
        }

        if violations.is_empty() {
            info!("Workflow '{}' is valid", workflow.label());
        } else {
            info!(
                "Workflow '{}' has {} violations",
                workflow.label(),
                violations.len()
            );
        }
        violations
    }

    /// Validates and wraps the result in an ordered [`Report`].
    pub fn report(&self, workflow: &Workflow) -> Report {
        Report::new(self.validate(workflow))
    }
}

/// Validates with the default collaborators.
pub fn validate(workflow: &Workflow) -> Vec<Violation> {
    Validator::new().validate(workflow)
}

/// Shared inputs of every validation scope.
pub(crate) struct Context<'v, 'a> {
    pub index: ReferenceIndex<'a>,
    pub durations: &'v dyn DurationParser,
    pub expressions: Option<&'v dyn ExpressionChecker>,
    pub lang: ExpressionLang,
}

impl<'v, 'a> Context<'v, 'a> {
    pub fn duration(&self, path: &str, value: &str) -> Option<Violation> {
        rules::duration(self.durations, path, value)
    }

    pub fn duration_opt(&self, path: &str, value: Option<&str>) -> Option<Violation> {
        rules::duration_opt(self.durations, path, value)
    }

    /// Checks an expression when a checker is installed.
    pub fn expression(&self, path: &str, value: &str) -> Option<Violation> {
        self.expressions
            .and_then(|checker| rules::expression(checker, self.lang, path, value))
    }

    pub fn expression_opt(&self, path: &str, value: Option<&str>) -> Option<Violation> {
        value.and_then(|v| self.expression(path, v))
    }
}
