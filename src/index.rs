//! Reference Index
//!
//! Name-keyed lookup tables over a decoded [`Workflow`], built in one pass.
//!
//! When a name is declared twice, lookups resolve to the first declaration.
//! The duplicate itself stays in the workflow, where the validator's
//! uniqueness rule reports it.
//!
//! The index also records every transition/end pair in the graph as a
//! [`Site`] that knows the index of its owning state. Validator rules that
//! need "the state this transition leaves from" read it from the site
//! rather than re-walking the document.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::model::{
    Auth, End, ErrorDef, Event, Function, Retry, State, StateKind, Transition, Workflow,
};

/// Named collections a reference can point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    States,
    Functions,
    Events,
    Retries,
    Errors,
    Auth,
    Secrets,
}

impl Bucket {
    /// Singular noun used in messages.
    pub fn noun(&self) -> &'static str {
        match self {
            Self::States => "state",
            Self::Functions => "function",
            Self::Events => "event",
            Self::Retries => "retry",
            Self::Errors => "error",
            Self::Auth => "auth",
            Self::Secrets => "secret",
        }
    }

    /// Top-level field holding the collection.
    pub fn field(&self) -> &'static str {
        match self {
            Self::States => "states",
            Self::Functions => "functions",
            Self::Events => "events",
            Self::Retries => "retries",
            Self::Errors => "errors",
            Self::Auth => "auth",
            Self::Secrets => "secrets",
        }
    }
}

/// Where a transition/end pair sits inside its owning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    /// The state's own `transition`/`end`
    State,
    DataCondition(usize),
    EventCondition(usize),
    DefaultCondition,
    OnError(usize),
}

/// One transition/end pair and the state that owns it.
#[derive(Debug, Clone)]
pub struct Site<'a> {
    /// Index of the owning state in `workflow.states`
    pub owner: usize,
    pub kind: SiteKind,
    /// Path of the object carrying the pair
    pub path: String,
    pub transition: Option<&'a Transition>,
    pub end: Option<&'a End>,
}

impl<'a> Site<'a> {
    /// Path of the transition's target name.
    pub fn next_state_path(&self) -> String {
        format!("{}.transition.nextState", self.path)
    }
}

/// Lookup tables over one workflow.
#[derive(Debug)]
pub struct ReferenceIndex<'a> {
    workflow: &'a Workflow,
    states: HashMap<&'a str, usize>,
    functions: HashMap<&'a str, usize>,
    events: HashMap<&'a str, usize>,
    retries: HashMap<&'a str, usize>,
    errors: HashMap<&'a str, usize>,
    auth: HashMap<&'a str, usize>,
    secrets: HashSet<&'a str>,
    sites: Vec<Site<'a>>,
}

/// Maps names to their first position, logging shadowed duplicates.
fn first_by_name<'a, T>(
    bucket: Bucket,
    items: &'a [T],
    name: impl Fn(&'a T) -> &'a str,
) -> HashMap<&'a str, usize> {
    let mut map = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let key = name(item);
        if map.contains_key(key) {
            warn!(
                "Duplicate {} name '{}' at {}[{}]; lookups use the first",
                bucket.noun(),
                key,
                bucket.field(),
                i
            );
        } else {
            map.insert(key, i);
        }
    }
    map
}

impl<'a> ReferenceIndex<'a> {
    /// Builds the index. Never fails: problems are left for the validator.
    pub fn build(workflow: &'a Workflow) -> Self {
        let index = Self {
            workflow,
            states: first_by_name(Bucket::States, &workflow.states, |s| s.name.as_str()),
            functions: first_by_name(Bucket::Functions, &workflow.functions, |f| f.name.as_str()),
            events: first_by_name(Bucket::Events, &workflow.events, |e| e.name.as_str()),
            retries: first_by_name(Bucket::Retries, &workflow.retries, |r| r.name.as_str()),
            errors: first_by_name(Bucket::Errors, &workflow.errors, |e| e.name.as_str()),
            auth: first_by_name(Bucket::Auth, &workflow.auth, |a| a.name.as_str()),
            secrets: workflow.secrets.iter().map(String::as_str).collect(),
            sites: collect_sites(&workflow.states),
        };

        debug!(
            "Indexed {} states, {} functions, {} events, {} transition sites",
            index.states.len(),
            index.functions.len(),
            index.events.len(),
            index.sites.len()
        );
        index
    }

    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    /// Returns true if `name` is declared in `bucket`.
    pub fn contains(&self, bucket: Bucket, name: &str) -> bool {
        match bucket {
            Bucket::States => self.states.contains_key(name),
            Bucket::Functions => self.functions.contains_key(name),
            Bucket::Events => self.events.contains_key(name),
            Bucket::Retries => self.retries.contains_key(name),
            Bucket::Errors => self.errors.contains_key(name),
            Bucket::Auth => self.auth.contains_key(name),
            Bucket::Secrets => self.secrets.contains(name),
        }
    }

    /// Position of the first state named `name`.
    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.get(name).copied()
    }

    pub fn state(&self, name: &str) -> Option<&'a State> {
        self.state_index(name).map(|i| &self.workflow.states[i])
    }

    pub fn function(&self, name: &str) -> Option<&'a Function> {
        self.functions.get(name).map(|&i| &self.workflow.functions[i])
    }

    pub fn event(&self, name: &str) -> Option<&'a Event> {
        self.events.get(name).map(|&i| &self.workflow.events[i])
    }

    pub fn retry(&self, name: &str) -> Option<&'a Retry> {
        self.retries.get(name).map(|&i| &self.workflow.retries[i])
    }

    pub fn error(&self, name: &str) -> Option<&'a ErrorDef> {
        self.errors.get(name).map(|&i| &self.workflow.errors[i])
    }

    pub fn auth(&self, name: &str) -> Option<&'a Auth> {
        self.auth.get(name).map(|&i| &self.workflow.auth[i])
    }

    /// Every transition/end site, in state order.
    pub fn sites(&self) -> &[Site<'a>] {
        &self.sites
    }

    /// Sites owned by the state at `owner`.
    pub fn sites_of(&self, owner: usize) -> impl Iterator<Item = &Site<'a>> {
        self.sites.iter().filter(move |site| site.owner == owner)
    }

    /// The state owning a site.
    pub fn owner(&self, site: &Site<'a>) -> &'a State {
        &self.workflow.states[site.owner]
    }
}

fn collect_sites(states: &[State]) -> Vec<Site<'_>> {
    let mut sites = Vec::new();

    for (owner, state) in states.iter().enumerate() {
        let base = format!("states[{}]", owner);
        let mut push = |kind: SiteKind, path: String, transition, end| {
            sites.push(Site {
                owner,
                kind,
                path,
                transition,
                end,
            })
        };

        if let StateKind::Switch(switch) = &state.kind {
            for (i, condition) in switch.data_conditions.iter().enumerate() {
                push(
                    SiteKind::DataCondition(i),
                    format!("{}.dataConditions[{}]", base, i),
                    condition.transition.as_ref(),
                    condition.end.as_ref(),
                );
            }
            for (i, condition) in switch.event_conditions.iter().enumerate() {
                push(
                    SiteKind::EventCondition(i),
                    format!("{}.eventConditions[{}]", base, i),
                    condition.transition.as_ref(),
                    condition.end.as_ref(),
                );
            }
            push(
                SiteKind::DefaultCondition,
                format!("{}.defaultCondition", base),
                switch.default_condition.transition.as_ref(),
                switch.default_condition.end.as_ref(),
            );
        } else {
            push(
                SiteKind::State,
                base.clone(),
                state.transition.as_ref(),
                state.end.as_ref(),
            );
        }

        for (i, on_error) in state.on_errors.iter().enumerate() {
            push(
                SiteKind::OnError(i),
                format!("{}.onErrors[{}]", base, i),
                on_error.transition.as_ref(),
                on_error.end.as_ref(),
            );
        }
    }

    sites
}
