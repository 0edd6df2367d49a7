//! # Task identity, lifecycle state and terminal outcome.
//!
//! ```text
//! Created ──► Active ──┬──► Completed
//!    │                 ├──► Failed
//!    └─────────────────┴──► Cancelled
//! ```
//!
//! Transitions are monotonic: once a task is terminal it never moves again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TaskError;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered with its scope, not yet polled.
    Created,
    /// Running (or suspended at an await point).
    Active,
    /// Finished with a value.
    Completed,
    /// Finished with a non-cancellation failure.
    Failed,
    /// Observed cancellation.
    Cancelled,
}

impl TaskState {
    /// True for `Completed`, `Failed` and `Cancelled`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Active => "active",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

/// Terminal result of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The work returned a value.
    Completed(T),
    /// The work failed (or panicked).
    Failed(TaskError),
    /// The task was cancelled before it could finish.
    Cancelled,
}

impl<T> Outcome<T> {
    /// The terminal [`TaskState`] matching this outcome.
    pub fn state(&self) -> TaskState {
        match self {
            Outcome::Completed(_) => TaskState::Completed,
            Outcome::Failed(_) => TaskState::Failed,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }

    /// The failure, if any. Cancellation is not a failure.
    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Borrowing view as a `Result`; cancellation maps to [`TaskError::Canceled`].
    pub fn as_result(&self) -> Result<&T, TaskError> {
        match self {
            Outcome::Completed(v) => Ok(v),
            Outcome::Failed(e) => Err(e.clone()),
            Outcome::Cancelled => Err(TaskError::Canceled),
        }
    }

    pub(crate) fn from_result(res: Result<T, TaskError>) -> Self {
        match res {
            Ok(v) => Outcome::Completed(v),
            Err(TaskError::Canceled) => Outcome::Cancelled,
            Err(e) => Outcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = TaskId::next();
        let b = TaskId::next();
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn swallowed_cancellation_is_still_cancelled() {
        let out: Outcome<u8> = Outcome::from_result(Err(TaskError::Canceled));
        assert_eq!(out.state(), TaskState::Cancelled);
        assert!(out.error().is_none());
        assert_eq!(out.as_result(), Err(TaskError::Canceled));
    }

    #[test]
    fn only_three_states_are_terminal() {
        assert!(!TaskState::Created.is_terminal());
        assert!(!TaskState::Active.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }
}
