//! # scopekit
//!
//! **Scopekit** is a structured-concurrency kernel for tokio.
//!
//! It provides scoped tasks with two result disciplines, propagating and
//! isolating failure scopes, channels with explicit overflow policies,
//! broadcast with replay, and cold/hot flows. Every lifecycle transition is
//! published as an [`Event`] so it can be logged or inspected.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         ┌──────────────────────────────┐
//!                         │ Kernel (optional owner)      │
//!                         │ - Config                     │
//!                         │ - Bus ─► listener ─► SubscriberSet / AliveTracker
//!                         │ - root Scope (ISOLATING)     │
//!                         └──────────────┬───────────────┘
//!                                        ▼
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │ Scope (PROPAGATING | ISOLATING)                             │
//!     │  - CancellationToken (child of the parent scope's token)    │
//!     │  - TaskTracker (waits for own and nested tasks)             │
//!     │  - first recorded child failure                             │
//!     └──────┬──────────────────┬──────────────────┬────────────────┘
//!            ▼                  ▼                  ▼
//!     spawn ─► Job       spawn_with_result    child scope / run_*
//!                        ─► Deferred<T>
//!            │                  │
//!            └──► runner: TaskStarting ─► work(TaskContext) ─► TaskCompleted
//!                                                         ├─► TaskFailed
//!                                                         └─► TaskCancelled
//! ```
//!
//! ### Data movement
//! ```text
//! Channel<T>           point-to-point, Rendezvous | Buffered(n) | Unbounded,
//!                      Suspend | DropOldest | DropLatest
//! BroadcastChannel<T>  one Channel per Subscription, Replay::{None, Last, LastN}
//! Flow<T>              cold: the producer re-runs per collect(), emit waits for the consumer
//! StateFlow<T>         hot current value, only changes are delivered
//! SharedFlow<T>        hot multicast with replay
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types                                      |
//! |-------------------|---------------------------------------------------------------|------------------------------------------------|
//! | **Tasks**         | Fire-and-forget and value-producing tasks, completion observers | [`Job`], [`Deferred`], [`TaskContext`]       |
//! | **Scopes**        | Structured runs, external cancellation, timeouts, pools       | [`Scope`], [`run_propagating`], [`with_context`] |
//! | **Channels**      | Capacity and overflow policies, producers                     | [`Channel`], [`produce`]                       |
//! | **Broadcast**     | Fan-out with replay                                           | [`BroadcastChannel`], [`Replay`]               |
//! | **Flows**         | Cold flows, operators, callback bridge, hot state             | [`Flow`], [`StateFlow`], [`SharedFlow`]        |
//! | **Sync**          | Non-reentrant mutex, single-flight results                    | [`sync::Mutex`], [`SingleFlight`]              |
//! | **Kernel**        | Root scope, event fan-out, graceful shutdown                  | [`Kernel`], [`Config`]                         |
//! | **Subscribers**   | Hook into runtime events                                      | [`Subscribe`]                                  |
//! | **HTTP**          | JSON REST client collaborator                                 | [`http::ApiClient`]                            |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use scopekit::{run_propagating, Flow, ScopeError, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), ScopeError> {
//!     let total = run_propagating(|scope| async move {
//!         let slow = scope.spawn_with_result("slow", |ctx| async move {
//!             ctx.delay(Duration::from_millis(20)).await?;
//!             Ok(20)
//!         })?;
//!         let fast = scope.spawn_with_result("fast", |_| async { Ok(1) })?;
//!         Ok::<_, TaskError>(slow.await_value().await? + fast.await_value().await?)
//!     })
//!     .await?;
//!     assert_eq!(total, 21);
//!
//!     let evens = Flow::from_iter(1..=6).filter(|v| v % 2 == 0).map(|v| v * 10);
//!     assert_eq!(evens.to_vec().await, Ok(vec![20, 40, 60]));
//!     Ok(())
//! }
//! ```
mod broadcast;
mod channel;
mod core;
mod error;
pub mod events;
mod flow;
pub mod http;
mod scope;
pub mod subscribers;
pub mod sync;
mod tasks;

// ---- Public re-exports ----

pub use broadcast::{BroadcastChannel, Replay, Subscription};
pub use channel::{
    produce, Capacity, Channel, Overflow, RecvError, SendError, TryRecvError, TrySendError,
};
pub use core::{Config, Kernel, KernelBuilder};
pub use error::{FlowError, RuntimeError, ScopeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use flow::{CallbackSink, Emitter, Flow, SharedFlow, StateFlow, StateSubscription};
pub use scope::{run_isolating, run_propagating, with_context, Scope, ScopeBuilder, ScopeMode};
pub use subscribers::{Subscribe, SubscriberSet};
pub use sync::{RaceCounter, SingleFlight};
pub use tasks::{await_all, Deferred, Job, Outcome, TaskContext, TaskHandle, TaskId, TaskState};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
