use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters of the active route.
///
/// The URL grammar lives in the router; by the time a navigation reaches the
/// engine it is just a map of named values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteParams(Map<String, Value>);

impl RouteParams {
    /// Empty params (the "no route" state).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds params from a JSON object; any other value yields empty params.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Returns the param named `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the param named `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RouteParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
