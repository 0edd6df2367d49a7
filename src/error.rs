//! Error types used by the scopekit runtime, tasks, scopes and flows.
//!
//! This module defines the main error enums:
//!
//! - [`TaskError`] — errors raised by individual task executions.
//! - [`ScopeError`] — errors surfaced at a scope boundary.
//! - [`FlowError`] — errors raised while producing or collecting a flow.
//! - [`RuntimeError`] — errors raised by the kernel itself (shutdown).
//!
//! All of them provide helper methods (`as_label`, `as_message`) for logging.
//! Channel errors live next to the channel in [`crate::channel`].

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the scopekit kernel.
///
/// These represent failures in the orchestration layer itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some tasks were still alive.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use scopekit::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
        }
    }
}

/// # Errors produced by task execution.
///
/// `Canceled` is not a failure: it is the distinguished termination signal and
/// never escalates through a propagating scope. Everything else is a
/// producer failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work exceeded its timeout and was cancelled.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work panicked; the panic was caught at the task boundary.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Task was cancelled (directly or through its scope).
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use scopekit::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// True for the cancellation signal, false for real failures.
    ///
    /// # Example
    /// ```
    /// use scopekit::TaskError;
    ///
    /// assert!(TaskError::Canceled.is_cancellation());
    /// assert!(!TaskError::fail("boom").is_cancellation());
    /// ```
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// # Errors surfaced at a scope boundary.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The scope was cancelled; no new work is accepted.
    #[error("scope cancelled")]
    Cancelled,

    /// A child task of a propagating scope failed; siblings were cancelled.
    #[error("child task {task:?} failed: {error}")]
    ChildFailed {
        /// Name of the first failing child.
        task: String,
        /// Its failure.
        error: TaskError,
    },

    /// The scope body itself returned an error.
    #[error("scope body failed: {error}")]
    Failed {
        /// The body's failure.
        error: TaskError,
    },

    /// A bounded sub-scope ran out of time.
    #[error("scope timed out after {timeout:?}")]
    TimedOut {
        /// The bound that was exceeded.
        timeout: Duration,
    },
}

impl ScopeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScopeError::Cancelled => "scope_cancelled",
            ScopeError::ChildFailed { .. } => "scope_child_failed",
            ScopeError::Failed { .. } => "scope_failed",
            ScopeError::TimedOut { .. } => "scope_timed_out",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ScopeError::Cancelled => "scope cancelled".to_string(),
            ScopeError::ChildFailed { task, error } => format!("child {task}: {error}"),
            ScopeError::Failed { error } => format!("body: {error}"),
            ScopeError::TimedOut { timeout } => format!("timeout: {timeout:?}"),
        }
    }

    /// The underlying task failure, if this error carries one.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            ScopeError::ChildFailed { error, .. } | ScopeError::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl From<ScopeError> for TaskError {
    /// Lets a task bubble a nested scope's failure with `?`.
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::Cancelled => TaskError::Canceled,
            ScopeError::ChildFailed { error, .. } | ScopeError::Failed { error } => error,
            ScopeError::TimedOut { timeout } => TaskError::Timeout { timeout },
        }
    }
}

/// # Errors raised while producing or collecting a flow.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The producer (or an operator) failed.
    #[error("flow failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// Collection was cancelled.
    #[error("flow cancelled")]
    Cancelled,

    /// An emitter was used outside the producer that owns it.
    #[error("emission from a foreign execution context")]
    ForeignEmission,

    /// The collector is gone; nothing can be emitted anymore.
    #[error("collector detached")]
    Detached,

    /// A terminal operator that needs at least one value saw none.
    #[error("flow was empty")]
    Empty,
}

impl FlowError {
    /// Shorthand for [`FlowError::Failed`].
    pub fn failed(error: impl Into<String>) -> Self {
        FlowError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            FlowError::Failed { .. } => "flow_failed",
            FlowError::Cancelled => "flow_cancelled",
            FlowError::ForeignEmission => "flow_foreign_emission",
            FlowError::Detached => "flow_detached",
            FlowError::Empty => "flow_empty",
        }
    }

    /// True for the cancellation signal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FlowError::Cancelled)
    }
}

impl From<TaskError> for FlowError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Canceled => FlowError::Cancelled,
            other => FlowError::Failed {
                error: other.to_string(),
            },
        }
    }
}

impl From<FlowError> for TaskError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Cancelled => TaskError::Canceled,
            FlowError::Failed { error } => TaskError::Fail { error },
            other => TaskError::Fail {
                error: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_error_unwraps_into_task_error() {
        let err = ScopeError::ChildFailed {
            task: "worker".into(),
            error: TaskError::fail("boom"),
        };
        assert_eq!(TaskError::from(err), TaskError::fail("boom"));
        assert_eq!(TaskError::from(ScopeError::Cancelled), TaskError::Canceled);
    }

    #[test]
    fn cancellation_survives_flow_conversions() {
        let flow: FlowError = TaskError::Canceled.into();
        assert!(flow.is_cancellation());
        assert!(TaskError::from(flow).is_cancellation());
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(ScopeError::Cancelled.as_label(), "scope_cancelled");
        assert_eq!(FlowError::ForeignEmission.as_label(), "flow_foreign_emission");
        assert_eq!(
            TaskError::Panicked { info: "x".into() }.as_label(),
            "task_panicked"
        );
    }
}
