//! # Scopes: structured concurrency boundaries.
//!
//! - [`Scope`] owns tasks, propagates cancellation downward and (in
//!   [`ScopeMode::Propagating`]) escalates the first child failure.
//! - [`run_propagating`] / [`run_isolating`] run a body and wait for
//!   everything it spawned.
//! - [`Scope::with_timeout`] bounds a sub-scope in time.
//! - [`with_context`] hops a single computation onto another runtime.
//!
//! ## Architecture
//! ```text
//! Kernel root (Isolating)
//!   ├── Scope "api" (Propagating) ──► task a, task b ──► nested scope ──► task c
//!   └── Scope "jobs" (Isolating)  ──► task d
//!
//! cancel(root) ──► every token below is cancelled (child tokens)
//! wait(root)   ──► waits for a, b, c, d (ancestor tracker tokens)
//! ```

mod builder;
mod context;
mod handle;
mod structured;

pub use builder::ScopeBuilder;
pub use context::with_context;
pub use handle::{Scope, ScopeMode};
pub use structured::{run_isolating, run_propagating};
