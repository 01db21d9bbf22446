use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Topic;

/// Command queued on a controller's inbound channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command name, e.g. `"load-more"`.
    pub name: String,
    /// Free-form arguments.
    pub args: Value,
}

impl Command {
    /// Name of the synthetic command forwarded when the route changes but the
    /// controller's config does not.
    pub const ROUTE_CHANGED: &'static str = "route-changed";

    /// Creates a command.
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Synthetic `route-changed` command carrying the (unchanged) config.
    pub fn route_changed(config: Value) -> Self {
        Self::new(Self::ROUTE_CHANGED, config)
    }

    #[inline]
    pub fn is_route_changed(&self) -> bool {
        self.name == Self::ROUTE_CHANGED
    }
}

/// Command addressed to a topic, as emitted by a view or by another controller.
#[derive(Clone, Debug, PartialEq)]
pub struct UiCommand {
    /// Target controller.
    pub topic: Topic,
    /// Payload forwarded to the controller.
    pub command: Command,
}

impl UiCommand {
    pub fn new(topic: impl Into<Topic>, name: impl Into<String>, args: Value) -> Self {
        Self {
            topic: topic.into(),
            command: Command::new(name, args),
        }
    }
}
