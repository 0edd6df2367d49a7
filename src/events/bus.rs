//! # Event bus.
//!
//! ```text
//! Scope / runner / Channel::close / Kernel ──publish──► Bus ──► kernel listener
//!                                                        └───► any extra Bus::subscribe()
//! ```
//!
//! Publishing is fire-and-forget: with no receiver the event is discarded,
//! and a receiver that falls more than `capacity` events behind gets
//! `RecvError::Lagged(n)` and resumes after the `n` lost events.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publisher handle over a `tokio::sync::broadcast` ring.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Ring of `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, ev: Event) {
        // no receivers is not an error
        let _ = self.tx.send(ev);
    }

    /// Receiver of everything published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Bus {
    /// Same capacity as [`Config::default`](crate::Config)'s `bus_capacity`.
    fn default() -> Self {
        Bus::new(1024)
    }
}
