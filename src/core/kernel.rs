//! # Kernel: owns the root scope, event delivery and graceful shutdown.
//!
//! The [`Kernel`] is the process-wide home for work that outlives any single
//! structured block (the equivalent of a global scope, but with an owner that
//! can shut it down).
//!
//! ## Architecture
//! ```text
//! KernelBuilder::build()
//!   ├─ Bus (cfg.bus_capacity)
//!   ├─ SubscriberSet (one worker per subscriber)
//!   ├─ AliveTracker
//!   ├─ listener task: Bus ─► AliveTracker::update + SubscriberSet::emit
//!   └─ root scope "root" (ISOLATING, publishes to the bus)
//!
//! Kernel::scope / run_* / channel / shared_flow
//!   └─ everything hangs off the root scope and shares the bus
//!
//! Shutdown path:
//!   shutdown()
//!     └─► Bus.publish(ShutdownRequested)
//!     └─► root.cancel()       → propagates to every descendant token
//!     └─► wait up to cfg.grace for every task under root:
//!            ├─ all finished  → Bus.publish(AllStoppedWithin)
//!            └─ grace elapsed → Bus.publish(GraceExceeded)
//!                               + RuntimeError::GraceExceeded { stuck }
//!     └─► listener drains the bus, subscriber workers flush and exit
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use scopekit::{Config, Kernel, ScopeMode, subscribers::Subscribe};
//! #[cfg(feature = "logging")]
//! use scopekit::subscribers::LogWriter;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.grace = Duration::from_secs(5);
//!
//!     let mut subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!     #[cfg(feature = "logging")]
//!     subs.push(Arc::new(LogWriter::new()));
//!
//!     let kernel = Kernel::builder(cfg).with_subscribers(subs).build();
//!
//!     let background = kernel.scope("background", ScopeMode::Isolating);
//!     background.spawn("ticker", |ctx| async move {
//!         loop {
//!             ctx.delay(Duration::from_millis(250)).await?;
//!         }
//!     })?;
//!
//!     let sum = kernel
//!         .run_propagating(|scope| async move {
//!             let a = scope.spawn_with_result("a", |_| async { Ok(1) })?;
//!             let b = scope.spawn_with_result("b", |_| async { Ok(2) })?;
//!             Ok(a.await_value().await? + b.await_value().await?)
//!         })
//!         .await?;
//!     assert_eq!(sum, 3);
//!
//!     kernel.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::{Capacity, Channel, Overflow};
use crate::core::{alive::AliveTracker, builder::KernelBuilder, Config};
use crate::error::{RuntimeError, ScopeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::flow::SharedFlow;
use crate::scope::{Scope, ScopeMode};
use crate::subscribers::SubscriberSet;

const ROOT_SCOPE: &str = "root";

/// Background task forwarding bus events to the tracker and subscribers.
struct Listener {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of the root scope and the event plumbing.
pub struct Kernel {
    cfg: Config,
    bus: Bus,
    alive: Arc<AliveTracker>,
    root: Scope,
    listener: Mutex<Option<Listener>>,
    stopped: AtomicBool,
}

impl Kernel {
    /// Starts configuring a kernel.
    pub fn builder(cfg: Config) -> KernelBuilder {
        KernelBuilder::new(cfg)
    }

    /// Wires the parts together. Must be called from within a Tokio runtime.
    pub(super) fn new_internal(cfg: Config, bus: Bus, subs: SubscriberSet) -> Self {
        let alive = Arc::new(AliveTracker::new());
        // subscribe before the root scope publishes ScopeOpened
        let listener = spawn_listener(&bus, subs, Arc::clone(&alive));
        let root = Scope::builder()
            .name(ROOT_SCOPE)
            .mode(ScopeMode::Isolating)
            .bus(bus.clone())
            .build();
        Self {
            cfg,
            bus,
            alive,
            root,
            listener: Mutex::new(Some(listener)),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The event bus every kernel-owned scope publishes to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The root isolating scope. Failures of its tasks stay with the tasks.
    pub fn root(&self) -> &Scope {
        &self.root
    }

    /// An externally held scope under the root.
    ///
    /// Unlike a structured run, the caller decides when to cancel it
    /// ([`Scope::cancel`]) and when to wait for it ([`Scope::join_children`]).
    /// Kernel shutdown cancels it too.
    pub fn scope(&self, name: &str, mode: ScopeMode) -> Scope {
        self.root.child(format!("{ROOT_SCOPE}/{name}"), mode)
    }

    /// Structured propagating run under the root, bounded by
    /// [`Config::timeout`] when set.
    pub async fn run_propagating<R, F, Fut>(&self, body: F) -> Result<R, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        match self.cfg.default_timeout() {
            Some(timeout) => self.root.with_timeout(timeout, body).await,
            None => self.root.run_propagating(body).await,
        }
    }

    /// Structured isolating run under the root, bounded by
    /// [`Config::timeout`] when set.
    pub async fn run_isolating<R, F, Fut>(&self, body: F) -> Result<R, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        match self.cfg.default_timeout() {
            Some(timeout) => {
                self.root
                    .with_timeout(timeout, |bounded| async move {
                        bounded.run_isolating(body).await.map_err(TaskError::from)
                    })
                    .await
            }
            None => self.root.run_isolating(body).await,
        }
    }

    /// Buffered channel with [`Config::channel_capacity`]; its closure is
    /// published on the kernel bus.
    pub fn channel<T>(&self, overflow: Overflow) -> Channel<T> {
        Channel::with_bus(
            Capacity::Buffered(self.cfg.channel_capacity),
            overflow,
            self.bus.clone(),
        )
    }

    /// Shared flow with [`Config::shared_replay`] and [`Config::channel_capacity`].
    pub fn shared_flow<T: Clone + Send + 'static>(&self) -> SharedFlow<T> {
        SharedFlow::new(self.cfg.shared_replay, self.cfg.channel_capacity)
    }

    /// True if a task named `name` is running somewhere under this kernel.
    pub async fn is_alive(&self, name: &str) -> bool {
        self.alive.is_alive(name).await
    }

    /// Sorted names of running tasks.
    pub async fn alive_tasks(&self) -> Vec<String> {
        self.alive.snapshot().await
    }

    /// Cancels everything under the root and waits up to [`Config::grace`].
    ///
    /// Returns [`RuntimeError::GraceExceeded`] listing the tasks still alive
    /// if the grace period elapsed. Subsequent calls are no-ops.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.root.cancel_with("shutdown");

        let grace = self.cfg.grace;
        let res = match tokio::time::timeout(grace, self.root.close_and_wait()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.alive.snapshot().await;
                warn!(?grace, ?stuck, "tasks still running after grace period");
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_timeout(grace));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };

        self.stop_listener().await;
        res
    }

    async fn stop_listener(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Listener { token, handle }) = listener {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "kernel listener ended abnormally");
            }
        }
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        let listener = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.token.cancel();
        }
    }
}

/// Forwards bus events until cancelled, then drains what is left and shuts
/// the subscriber workers down.
fn spawn_listener(bus: &Bus, subs: SubscriberSet, alive: Arc<AliveTracker>) -> Listener {
    let mut rx = bus.subscribe();
    let token = CancellationToken::new();
    let stop = token.clone();

    let handle = tokio::spawn(async move {
        loop {
            let ev = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                ev = rx.recv() => ev,
            };
            match ev {
                Ok(ev) => {
                    alive.update(&ev).await;
                    subs.emit(&ev);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "kernel listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }

        loop {
            match rx.try_recv() {
                Ok(ev) => {
                    alive.update(&ev).await;
                    subs.emit(&ev);
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        debug!(subscribers = subs.len(), "kernel listener stopped");
        subs.shutdown().await;
    });

    Listener { token, handle }
}
