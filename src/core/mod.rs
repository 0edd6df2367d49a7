//! Runtime core: configuration, task execution and the kernel.
//!
//! Public API from this module is [`Config`], [`Kernel`] and [`KernelBuilder`].
//!
//! Internal modules:
//! - [`runner`]: drives one task to its terminal state and publishes its events;
//! - [`kernel`]: root scope, bus listener and graceful shutdown;
//! - [`alive`]: tracks running tasks for shutdown diagnostics.

mod alive;
mod builder;
mod config;
mod kernel;
pub(crate) mod runner;

pub use builder::KernelBuilder;
pub use config::Config;
pub use kernel::Kernel;
