//! # Event subscribers for the scopekit kernel.
//!
//! This module provides the [`Subscribe`] trait and the fan-out machinery for
//! handling runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Scope/Task ── publish(Event) ──► Bus ──► Kernel listener
//!                                              │
//!                                              ├──► SubscriberSet ──► Subscribe::on_event(&Event)
//!                                              │                        ├─ LogWriter
//!                                              │                        └─ Custom ...
//!                                              └──► AliveTracker (internal state tracking)
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
