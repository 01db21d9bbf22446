//! # Application state owned by the manager loop.
//!
//! [`AppState`] bundles shared data ([`AppDb`]), the [`RunningRegistry`] and
//! per-topic run counters. It has exactly one owner; everyone else sees
//! snapshots of the db.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::registry::RunningRegistry;
use crate::data::{AppDb, Topic};

/// Everything the manager mutates.
#[derive(Default)]
pub struct AppState {
    pub(crate) db: AppDb,
    pub(crate) registry: RunningRegistry,
    runs: HashMap<Topic, u64>,
}

impl AppState {
    pub fn new(db: AppDb) -> Self {
        Self {
            db,
            ..Self::default()
        }
    }

    /// How many times `topic` has been started.
    pub fn runs(&self, topic: &str) -> u64 {
        self.runs.get(topic).copied().unwrap_or(0)
    }

    /// Increments and returns the run counter of `topic`.
    pub(crate) fn bump_runs(&mut self, topic: &Topic) -> u64 {
        let n = self.runs.entry(topic.clone()).or_insert(0);
        *n += 1;
        *n
    }

    /// Immutable copy of the db for readers on other tasks.
    pub fn snapshot(&self) -> Arc<AppDb> {
        Arc::new(self.db.clone())
    }
}
