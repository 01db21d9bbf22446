//! Error types used by the routevisor runtime and controllers.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] errors surfaced to the host by the manager itself.
//! - [`ControllerError`] errors raised by controller capabilities (`params`, `start`, `stop`, `handle`).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Controller errors never propagate out of a reconciliation pass: they are
//! reported as events and the pass carries on for the other topics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the routevisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown took longer than its grace period; some handler tasks were aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    StopGraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Topics whose handler did not exit in time.
        stuck: Vec<String>,
    },

    /// The manager loop is no longer running (already stopped or crashed).
    #[error("manager is not running")]
    ManagerGone,

    /// A topic was registered twice.
    #[error("controller already registered for topic {topic:?}")]
    DuplicateTopic {
        /// The offending topic.
        topic: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use routevisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::ManagerGone.as_label(), "runtime_manager_gone");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::StopGraceExceeded { .. } => "runtime_stop_grace_exceeded",
            RuntimeError::ManagerGone => "runtime_manager_gone",
            RuntimeError::DuplicateTopic { .. } => "runtime_duplicate_topic",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::StopGraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck topics={stuck:?}")
            }
            RuntimeError::ManagerGone => "manager is not running".to_string(),
            RuntimeError::DuplicateTopic { topic } => format!("duplicate topic: {topic}"),
        }
    }
}

/// # Errors produced by controller capabilities.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// `params` could not derive a config from the route.
    #[error("invalid route params: {error}")]
    InvalidParams {
        /// The underlying error message.
        error: String,
    },

    /// `start`, `stop` or `handle` failed.
    #[error("controller failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The handler observed its inbound channel closing and gave up mid-work.
    #[error("inbound channel closed")]
    Closed,
}

impl ControllerError {
    /// Shorthand for [`ControllerError::Failed`].
    pub fn failed(error: impl Into<String>) -> Self {
        ControllerError::Failed {
            error: error.into(),
        }
    }

    /// Shorthand for [`ControllerError::InvalidParams`].
    pub fn invalid_params(error: impl Into<String>) -> Self {
        ControllerError::InvalidParams {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use routevisor::ControllerError;
    ///
    /// assert_eq!(ControllerError::failed("boom").as_label(), "controller_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControllerError::InvalidParams { .. } => "controller_invalid_params",
            ControllerError::Failed { .. } => "controller_failed",
            ControllerError::Closed => "controller_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ControllerError::InvalidParams { error } => format!("invalid params: {error}"),
            ControllerError::Failed { error } => format!("error: {error}"),
            ControllerError::Closed => "inbound channel closed".to_string(),
        }
    }

    /// Whether the error is a fault worth reporting.
    ///
    /// [`ControllerError::Closed`] is how a handler acknowledges cancellation, so it is not.
    pub fn is_fault(&self) -> bool {
        !matches!(self, ControllerError::Closed)
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
