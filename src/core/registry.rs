//! # Running registry: what is alive right now.
//!
//! Maps each started topic to its [`RunningEntry`] (controller, config,
//! inbound sender, handler join handle).
//!
//! ## Rules
//! - A topic is present iff its controller is started and not yet stopped.
//! - Only the lifecycle orchestrator inserts or removes entries, and only from
//!   the manager loop, so there is no lock around it.
//! - An entry may outlive its handler task (handler fault); the entry stays
//!   until the topic is stopped.

use std::collections::HashMap;

use tokio::task::JoinHandle;

use crate::controllers::{ControllerRef, InboundSender};
use crate::data::{ConfigValue, Topic};

/// Resources owned by one running controller.
pub struct RunningEntry {
    /// Controller instance.
    pub(crate) controller: ControllerRef,
    /// Config it was started with (replaced in place on route change).
    pub(crate) config: ConfigValue,
    /// Engine-side end of its inbound channel.
    pub(crate) inbound: InboundSender,
    /// Handle of its `handle` task.
    pub(crate) join: JoinHandle<()>,
}

impl RunningEntry {
    pub fn config(&self) -> &ConfigValue {
        &self.config
    }

    /// True while the handler task has not returned.
    pub fn handler_alive(&self) -> bool {
        !self.join.is_finished()
    }
}

/// Topic-keyed table of running controllers.
#[derive(Default)]
pub struct RunningRegistry {
    entries: HashMap<Topic, RunningEntry>,
}

impl RunningRegistry {
    pub fn get(&self, topic: &str) -> Option<&RunningEntry> {
        self.entries.get(topic)
    }

    pub(crate) fn get_mut(&mut self, topic: &str) -> Option<&mut RunningEntry> {
        self.entries.get_mut(topic)
    }

    /// Inserts an entry, returning the one it replaced (callers stop first, so normally `None`).
    pub(crate) fn insert(&mut self, topic: Topic, entry: RunningEntry) -> Option<RunningEntry> {
        self.entries.insert(topic, entry)
    }

    pub(crate) fn remove_entry(&mut self, topic: &str) -> Option<(Topic, RunningEntry)> {
        self.entries.remove_entry(topic)
    }

    /// `(topic, config)` pairs, the differ's view of the registry.
    pub fn configs(&self) -> impl Iterator<Item = (&Topic, &ConfigValue)> {
        self.entries.iter().map(|(t, e)| (t, &e.config))
    }

    /// Sorted list of running topics.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.entries.keys().cloned().collect();
        topics.sort_unstable();
        topics
    }
}
