//! # Running-set differ.
//!
//! Computes which lifecycle action each topic needs, given what is running now
//! and what the new route wants.
//!
//! ```text
//! running  desired       action
//! ───────  ────────────  ───────────────────────────
//! yes      nil / absent  Stop
//! no       config        Start(config)
//! yes      == running    RouteChanged(config)
//! yes      != running    Restart(config)
//! no       nil / absent  (omitted)
//! ```
//!
//! ## Rules
//! - Pure and total: no I/O, no failure modes.
//! - Exactly one action per topic in `running ∪ {desired non-nil}`.
//! - Config equality is structural (`serde_json::Value` equality), never identity.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::data::{ConfigValue, Topic};

/// Desired config per topic for the current route (`None` = must not run).
pub type DesiredConfigs = BTreeMap<Topic, Option<ConfigValue>>;

/// Actions computed by [`diff`], keyed by topic.
pub type ActionSet = BTreeMap<Topic, Action>;

/// Lifecycle action for one topic.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Not running, should run.
    Start(ConfigValue),
    /// Running, should not.
    Stop,
    /// Running with a different config: stop, then start with this one.
    Restart(ConfigValue),
    /// Running with the same config: notify only.
    RouteChanged(ConfigValue),
}

/// Payload-free classification of an [`Action`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
    RouteChanged,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Start(_) => ActionKind::Start,
            Action::Stop => ActionKind::Stop,
            Action::Restart(_) => ActionKind::Restart,
            Action::RouteChanged(_) => ActionKind::RouteChanged,
        }
    }

    /// Config carried by the action, if any.
    pub fn config(&self) -> Option<&ConfigValue> {
        match self {
            Action::Start(c) | Action::Restart(c) | Action::RouteChanged(c) => Some(c),
            Action::Stop => None,
        }
    }

    /// True if the action tears down a running handler.
    #[inline]
    pub fn tears_down(&self) -> bool {
        matches!(self, Action::Stop | Action::Restart(_))
    }
}

/// Counts of each action kind in an [`ActionSet`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub start: usize,
    pub stop: usize,
    pub restart: usize,
    pub route_changed: usize,
}

impl ActionSummary {
    pub fn of(actions: &ActionSet) -> Self {
        actions.values().fold(Self::default(), |mut s, a| {
            match a.kind() {
                ActionKind::Start => s.start += 1,
                ActionKind::Stop => s.stop += 1,
                ActionKind::Restart => s.restart += 1,
                ActionKind::RouteChanged => s.route_changed += 1,
            }
            s
        })
    }
}

impl fmt::Display for ActionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "start={} stop={} restart={} route_changed={}",
            self.start, self.stop, self.restart, self.route_changed
        )
    }
}

/// Computes the action set turning `running` into `desired`.
///
/// `running` yields `(topic, config)` for every started controller.
///
/// # Example
/// ```
/// use routevisor::{diff, Action, DesiredConfigs, Topic};
/// use serde_json::json;
///
/// let running = vec![(Topic::from("users"), json!(true))];
/// let mut desired = DesiredConfigs::new();
/// desired.insert("users".into(), Some(json!(true)));
/// desired.insert("news".into(), Some(json!({"page": 1})));
///
/// let actions = diff(running.iter().map(|(t, c)| (t, c)), &desired);
/// assert_eq!(actions["users"], Action::RouteChanged(json!(true)));
/// assert_eq!(actions["news"], Action::Start(json!({"page": 1})));
/// ```
pub fn diff<'a, R>(running: R, desired: &DesiredConfigs) -> ActionSet
where
    R: IntoIterator<Item = (&'a Topic, &'a ConfigValue)>,
{
    let mut actions = ActionSet::new();
    let mut seen = BTreeSet::new();

    for (topic, current) in running {
        seen.insert(topic.clone());
        let action = match desired.get(topic) {
            Some(Some(wanted)) if wanted == current => Action::RouteChanged(wanted.clone()),
            Some(Some(wanted)) => Action::Restart(wanted.clone()),
            Some(None) | None => Action::Stop,
        };
        actions.insert(topic.clone(), action);
    }

    for (topic, wanted) in desired {
        if let Some(config) = wanted {
            if !seen.contains(topic) {
                actions.insert(topic.clone(), Action::Start(config.clone()));
            }
        }
    }

    actions
}
