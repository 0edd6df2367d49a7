//! # Tasks: identity, lifecycle and handles.
//!
//! This module provides the task-related types:
//! - [`TaskState`], [`Outcome`], [`TaskId`] lifecycle data model
//! - [`TaskHandle`] with the [`Job`] / [`Deferred`] aliases for the two spawn disciplines
//! - [`TaskContext`] the cancellation capability handed to work closures
//! - [`await_all`] join for several deferred results
//!
//! Tasks are created through a [`Scope`](crate::Scope); the runner in
//! `core::runner` drives them to a terminal state.

mod cell;
mod context;
mod handle;
mod state;

pub(crate) use cell::TaskCell;
pub use context::TaskContext;
pub use handle::{await_all, Deferred, Job, TaskHandle};
pub use state::{Outcome, TaskId, TaskState};
