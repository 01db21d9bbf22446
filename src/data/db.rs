//! # Shared application state.
//!
//! [`AppDb`] is the single value views render from. It is owned by the manager
//! loop: controllers receive it by value in `start`/`stop` and hand back the new
//! version, handlers read immutable snapshots and submit updates through
//! [`Outbound`](crate::Outbound).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shared application state (a JSON object).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppDb(Map<String, Value>);

impl AppDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a db from a JSON object; any other value yields an empty db.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Follows `path` through nested objects.
    ///
    /// ```
    /// use routevisor::AppDb;
    /// use serde_json::json;
    ///
    /// let db = AppDb::from_value(json!({"news": {"page": 2}}));
    /// assert_eq!(db.get_in(&["news", "page"]), Some(&json!(2)));
    /// assert_eq!(db.get_in(&["news", "missing"]), None);
    /// ```
    pub fn get_in(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |value, key| value.get(*key))
    }

    /// Inserts `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Applies `f` to the value under `key` (`Null` when missing).
    pub fn update(&mut self, key: &str, f: impl FnOnce(Value) -> Value) {
        let current = self.0.remove(key).unwrap_or(Value::Null);
        self.0.insert(key.to_string(), f(current));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for AppDb {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
