//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by scopes, tasks, channels
//! and the kernel.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scope`, the task runner, `Channel::close`, `Kernel::shutdown`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the kernel listener (fans out to `SubscriberSet` and
//!   updates `AliveTracker`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
