//! # Fan-out of kernel events to subscribers.
//!
//! ```text
//! emit(event)                       one lane per subscriber
//!   ├─ accepts? ─► try_send ─► [bounded queue] ─► worker ─► on_event
//!   │                 │                               └─ panic ─► SubscriberPanicked
//!   │                 └─ full / closed ─► SubscriberOverflow
//!   └─ next lane ...
//! ```
//!
//! `emit` never waits. Each lane is FIFO; there is no ordering between
//! lanes. Panics are caught with `AssertUnwindSafe`, so a subscriber that
//! panics while holding its own lock may leave that state poisoned.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Lane {
    subscriber: Arc<dyn Subscribe>,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber queues and workers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber on the current runtime.
    ///
    /// Faults (overflow, panics) are reported on `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers): (Vec<Lane>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|subscriber| {
                let (queue, rx) = mpsc::channel(subscriber.queue_capacity().max(1));
                let worker = tokio::spawn(drain(Arc::clone(&subscriber), rx, bus.clone()));
                (Lane { subscriber, queue }, worker)
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Queues `event` on every lane that accepts its kind.
    ///
    /// A lane that cannot take it reports `SubscriberOverflow`, except for
    /// overflow events themselves, which are dropped silently.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let report = event.kind != EventKind::SubscriberOverflow;
        for lane in self.lanes.iter().filter(|l| l.subscriber.accepts(event.kind)) {
            let cause = match lane.queue.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if report {
                self.bus
                    .publish(Event::subscriber_overflow(lane.subscriber.name(), cause));
            }
        }
    }

    /// Closes every lane and waits until the queued events were handled.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

async fn drain(subscriber: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(subscriber.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            bus.publish(Event::subscriber_panicked(
                subscriber.name(),
                panic_message(&*payload),
            ));
        }
    }
}

/// Text of a panic payload (`&str` or `String`), or a placeholder.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    any.downcast_ref::<&'static str>()
        .map(|s| (*s).to_owned())
        .or_else(|| any.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
