//! # LogWriter — event renderer over `tracing`
//!
//! A minimal subscriber that renders incoming [`Event`]s through the `tracing`
//! macros (target `scopekit::events`). Install any `tracing` subscriber to see them.
//!
//! ## Example output
//! ```text
//! INFO scopekit::events: [starting] task="fetch" scope="root"
//! WARN scopekit::events: [failed] task="fetch" scope="root" err="boom"
//! INFO scopekit::events: [scope-cancelled] scope="root" reason="child fetch failed"
//! INFO scopekit::events: [timeout] scope="bounded" timeout_ms=200
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const UNKNOWN: &str = "<none>";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or(UNKNOWN);
        let scope = e.scope.as_deref().unwrap_or(UNKNOWN);
        let reason = e.reason.as_deref().unwrap_or(UNKNOWN);

        match e.kind {
            EventKind::TaskStarting => {
                info!(target: "scopekit::events", seq = e.seq, "[starting] task={task:?} scope={scope:?}");
            }
            EventKind::TaskCompleted => {
                info!(target: "scopekit::events", seq = e.seq, "[completed] task={task:?} scope={scope:?}");
            }
            EventKind::TaskCancelled => {
                info!(target: "scopekit::events", seq = e.seq, "[cancelled] task={task:?} scope={scope:?}");
            }
            EventKind::TaskFailed => {
                warn!(target: "scopekit::events", seq = e.seq, "[failed] task={task:?} scope={scope:?} err={reason:?}");
            }
            EventKind::TimeoutHit => {
                warn!(target: "scopekit::events", seq = e.seq, "[timeout] scope={scope:?} timeout_ms={:?}", e.timeout_ms);
            }
            EventKind::ScopeOpened => {
                info!(target: "scopekit::events", seq = e.seq, "[scope-opened] scope={scope:?} mode={reason}");
            }
            EventKind::ScopeCancelled => {
                info!(target: "scopekit::events", seq = e.seq, "[scope-cancelled] scope={scope:?} reason={reason:?}");
            }
            EventKind::ScopeClosed => {
                info!(target: "scopekit::events", seq = e.seq, "[scope-closed] scope={scope:?}");
            }
            EventKind::ChannelClosed => {
                info!(target: "scopekit::events", seq = e.seq, "[channel-closed] buffered={reason}");
            }
            EventKind::ShutdownRequested => {
                info!(target: "scopekit::events", "[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "scopekit::events", "[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                warn!(target: "scopekit::events", "[grace-exceeded] stuck={reason}");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "scopekit::events", "[subscriber-overflow] subscriber={task:?} reason={reason:?}");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "scopekit::events", "[subscriber-panicked] subscriber={task} info={reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
