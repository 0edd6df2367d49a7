//! # Pluggable event consumers.
//!
//! A [`Subscribe`] implementor sees every [`Event`] it [`accepts`](Subscribe::accepts)
//! from the kernel bus. The [`SubscriberSet`](crate::SubscriberSet) gives each one
//! its own bounded queue and worker, so a slow or panicking subscriber never
//! stalls task execution or the other subscribers.
//!
//! ```text
//! Bus ─► kernel listener ─► SubscriberSet
//!                              ├─ accepts(kind)? ─► queue (queue_capacity) ─► on_event
//!                              └─ queue full     ─► SubscriberOverflow (this subscriber only)
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use async_trait::async_trait;
//! use scopekit::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, _ev: &Event) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!
//!     fn accepts(&self, kind: EventKind) -> bool {
//!         kind == EventKind::TaskFailed
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "failure-counter"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Consumer of runtime events.
///
/// `on_event` runs on the subscriber's own worker, in publication order.
/// It should not block the executor; a panic is caught and reported as
/// [`EventKind::SubscriberPanicked`].
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Filter applied before queueing. Rejected events cost nothing.
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }

    /// Label used in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue depth for this subscriber (at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
