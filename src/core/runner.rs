//! # Run a single task to its terminal state.
//!
//! Drives one task's work under its cancellation token, catches panics, and
//! publishes lifecycle events to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Cancelled before first poll:
//!   token.is_cancelled() → publish TaskCancelled (never Active)
//!
//! Success:
//!   publish TaskStarting → work → Ok(v) → publish TaskCompleted
//!
//! Cancellation:
//!   token.cancelled() wins (or work returns Err(Canceled)) → publish TaskCancelled
//!
//! Failure:
//!   work → Err(Fail/Timeout) or panic → publish TaskFailed
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event
//! - `Canceled` is never a failure → `TaskCancelled`, not `TaskFailed`
//! - Cancellation is observed at the work's next suspension point; the work
//!   future is dropped there, so swallowing cancellation is impossible

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::{
    error::TaskError,
    events::{Bus, Event, EventKind},
    subscribers::panic_message,
    tasks::{Outcome, TaskCell},
};

/// Runs `work` for `cell`, returning its outcome (not yet stored in the cell).
pub(crate) async fn run_once<T, Fut>(cell: &TaskCell<T>, bus: &Bus, work: Fut) -> Outcome<T>
where
    Fut: Future<Output = Result<T, TaskError>>,
{
    let token = cell.token();
    if token.is_cancelled() {
        publish(bus, cell, EventKind::TaskCancelled, None);
        return Outcome::Cancelled;
    }

    cell.activate();
    publish(bus, cell, EventKind::TaskStarting, None);

    let guarded = AssertUnwindSafe(work).catch_unwind();
    let res = tokio::select! {
        biased;
        _ = token.cancelled() => Err(TaskError::Canceled),
        r = guarded => match r {
            Ok(r) => r,
            Err(panic) => Err(TaskError::Panicked { info: panic_message(&*panic) }),
        },
    };

    let outcome = Outcome::from_result(res);
    match &outcome {
        Outcome::Completed(_) => publish(bus, cell, EventKind::TaskCompleted, None),
        Outcome::Cancelled => publish(bus, cell, EventKind::TaskCancelled, None),
        Outcome::Failed(e) => {
            tracing::debug!(task = %cell.name(), label = e.as_label(), "task failed: {e}");
            publish(bus, cell, EventKind::TaskFailed, Some(e.to_string()))
        }
    }
    outcome
}

fn publish<T>(bus: &Bus, cell: &TaskCell<T>, kind: EventKind, reason: Option<String>) {
    let mut ev = Event::new(kind)
        .with_task(cell.name().clone())
        .with_task_id(cell.id().as_u64())
        .with_scope(cell.scope().clone());
    if let Some(reason) = reason {
        ev = ev.with_reason(reason);
    }
    bus.publish(ev);
}
