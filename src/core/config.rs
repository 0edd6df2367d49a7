//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for a [`Kernel`](crate::Kernel).
//!
//! ## Sentinel values
//! - `timeout = 0s` → kernel scopes run unbounded
//! - `worker_threads = 0` → tokio picks the pool size (one per core)
//! - `bus_capacity = 0` → clamped to 1

use std::io;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

const WORKER_THREAD_NAME: &str = "scopekit-worker";

/// Global configuration for the kernel.
///
/// ## Field semantics
/// - `grace`: maximum wait for owned tasks on [`Kernel::shutdown`](crate::Kernel::shutdown)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `channel_capacity`: buffer of channels created through the kernel
/// - `shared_replay`: replay depth of kernel-made shared flows
/// - `timeout`: bound applied to [`Kernel::run_propagating`](crate::Kernel::run_propagating)
///   and [`Kernel::run_isolating`](crate::Kernel::run_isolating) (`0s` = none)
/// - `worker_threads`: size of pools built by [`Config::build_pool`] (`0` = tokio default)
///
/// All fields are public. Prefer the accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// How long shutdown waits for cancelled tasks before giving up.
    ///
    /// If exceeded, shutdown returns `RuntimeError::GraceExceeded` naming the
    /// tasks still alive.
    pub grace: Duration,

    /// Capacity of the event bus. Lagging subscribers skip older events.
    pub bus_capacity: usize,

    /// Default buffered capacity for [`Kernel::channel`](crate::Kernel::channel).
    pub channel_capacity: usize,

    /// Default replay for [`Kernel::shared_flow`](crate::Kernel::shared_flow).
    pub shared_replay: usize,

    /// Default bound on kernel-level structured runs.
    pub timeout: Duration,

    /// Worker threads of dedicated pools.
    pub worker_threads: usize,
}

impl Config {
    /// Returns the default run timeout as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Builds a dedicated multi-thread runtime.
    ///
    /// Scopes bound to its handle (see [`ScopeBuilder::runtime`](crate::ScopeBuilder::runtime))
    /// run their tasks there. Drop the runtime outside of async code.
    pub fn build_pool(&self) -> io::Result<Runtime> {
        let mut builder = Builder::new_multi_thread();
        if self.worker_threads > 0 {
            builder.worker_threads(self.worker_threads);
        }
        builder.thread_name(WORKER_THREAD_NAME).enable_all().build()
    }
}

impl Default for Config {
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `channel_capacity = 64`
    /// - `shared_replay = 1`
    /// - `timeout = 0s` (unbounded)
    /// - `worker_threads = 0` (tokio default)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            channel_capacity: 64,
            shared_replay: 1,
            timeout: Duration::from_secs(0),
            worker_threads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_none_and_clamp() {
        let mut cfg = Config::default();
        assert_eq!(cfg.default_timeout(), None);
        cfg.timeout = Duration::from_millis(250);
        assert_eq!(cfg.default_timeout(), Some(Duration::from_millis(250)));
        cfg.bus_capacity = 0;
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn pool_threads_carry_the_worker_name() {
        let cfg = Config {
            worker_threads: 2,
            ..Config::default()
        };
        let pool = cfg.build_pool().unwrap();
        let name = pool
            .block_on(async {
                tokio::spawn(async { std::thread::current().name().map(str::to_owned) }).await
            })
            .unwrap();
        assert_eq!(name.as_deref(), Some(WORKER_THREAD_NAME));
    }
}
