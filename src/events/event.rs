//! # Lifecycle events.
//!
//! Every observable transition in the kernel becomes an [`Event`]: a kind,
//! a global sequence number, a timestamp and whichever of task / scope /
//! reason / timeout the kind carries.
//!
//! | Kind                                   | task | scope | reason              |
//! |----------------------------------------|------|-------|---------------------|
//! | `TaskStarting` / `TaskCompleted`       | yes  | yes   |                     |
//! | `TaskCancelled`                        | yes  | yes   |                     |
//! | `TaskFailed`                           | yes  | yes   | failure message     |
//! | `TimeoutHit`                           |      | yes   | (`timeout_ms` set)  |
//! | `ScopeOpened`                          |      | yes   | mode label          |
//! | `ScopeCancelled`                       |      | yes   | cause, if known     |
//! | `ScopeClosed`                          |      | yes   |                     |
//! | `ChannelClosed`                        |      |       | values still queued |
//! | `SubscriberPanicked` / `...Overflow`   | name |       | panic text / cause  |
//! | `ShutdownRequested` / `AllStoppedWithin` |    |       |                     |
//! | `GraceExceeded`                        |      |       | stuck task names    |
//!
//! `seq` is taken from one process-wide counter, so sorting by it restores
//! publication order across receivers.
//!
//! ```rust
//! use scopekit::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("fetch")
//!     .with_scope("root")
//!     .with_reason("boom");
//!
//! assert!(ev.kind.is_task_terminal());
//! assert_eq!(ev.kind.as_label(), "task_failed");
//! assert_eq!(ev.task.as_deref(), Some("fetch"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TaskStarting,
    TaskCompleted,
    TaskFailed,
    TaskCancelled,
    /// A bounded sub-scope ran out of time.
    TimeoutHit,

    ScopeOpened,
    /// Explicitly, through the parent, or by a failing child of a propagating scope.
    ScopeCancelled,
    /// A structured run finished waiting for its children.
    ScopeClosed,

    /// A channel stopped accepting values.
    ChannelClosed,

    SubscriberPanicked,
    /// A subscriber queue rejected an event (full or closed).
    SubscriberOverflow,

    ShutdownRequested,
    AllStoppedWithin,
    GraceExceeded,
}

impl EventKind {
    /// Completed, failed or cancelled.
    pub fn is_task_terminal(self) -> bool {
        matches!(
            self,
            EventKind::TaskCompleted | EventKind::TaskFailed | EventKind::TaskCancelled
        )
    }

    /// Stable snake_case name for logs and metrics labels.
    pub fn as_label(self) -> &'static str {
        match self {
            EventKind::TaskStarting => "task_starting",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskFailed => "task_failed",
            EventKind::TaskCancelled => "task_cancelled",
            EventKind::TimeoutHit => "timeout_hit",
            EventKind::ScopeOpened => "scope_opened",
            EventKind::ScopeCancelled => "scope_cancelled",
            EventKind::ScopeClosed => "scope_closed",
            EventKind::ChannelClosed => "channel_closed",
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::AllStoppedWithin => "all_stopped_within",
            EventKind::GraceExceeded => "grace_exceeded",
        }
    }
}

/// One published transition. Fields other than `seq`, `at` and `kind` are
/// filled per kind (see the module table).
#[derive(Clone, Debug)]
pub struct Event {
    pub seq: u64,
    pub at: SystemTime,
    pub kind: EventKind,
    pub task: Option<Arc<str>>,
    /// Runtime-unique id of the task; names may repeat.
    pub task_id: Option<u64>,
    pub scope: Option<Arc<str>>,
    pub reason: Option<Arc<str>>,
    /// Bound of a timed scope, saturated at `u32::MAX` ms.
    pub timeout_ms: Option<u32>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            scope: None,
            reason: None,
            timeout_ms: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_task_id(mut self, id: u64) -> Self {
        self.task_id = Some(id);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<Arc<str>>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
        self
    }

    pub(crate) fn subscriber_overflow(subscriber: &'static str, cause: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(cause)
    }

    pub(crate) fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    pub fn is_task_terminal(&self) -> bool {
        self.kind.is_task_terminal()
    }
}
