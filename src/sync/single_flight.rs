//! # Lazily shared in-flight result.
//!
//! ```text
//! caller A ──► lock ─► slot empty  ─► spawn Deferred, install ─► unlock ─► await
//! caller B ──► lock ─► slot filled ─► clone Deferred           ─► unlock ─► await
//!                               Deferred completes ─► slot cleared (if still ours)
//! ```
//!
//! The lock only guards read-or-install of the slot; awaiting happens outside
//! it, so a long computation never blocks unrelated callers on the lock. After
//! completion the next call starts a fresh computation.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::error::TaskError;
use crate::scope::Scope;
use crate::tasks::{Deferred, TaskContext};

/// Deduplicates concurrent computations of the same value.
pub struct SingleFlight<T> {
    name: Arc<str>,
    slot: Arc<Mutex<Option<Deferred<T>>>>,
}

impl<T> fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("name", &self.name)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl<T> SingleFlight<T> {
    /// `name` is given to every spawned computation.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// True while a computation is installed and unfinished.
    pub fn in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|d| !d.state().is_terminal())
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    /// Joins the in-flight computation, or starts `work` in `scope` if none is
    /// running. Every joined caller receives the same value or failure.
    pub async fn run<F, Fut>(&self, scope: &Scope, work: F) -> Result<T, TaskError>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let (deferred, started) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(d) if !d.state().is_terminal() => (d.clone(), false),
                _ => {
                    let d = scope.spawn_with_result(self.name.clone(), work)?;
                    *slot = Some(d.clone());
                    (d, true)
                }
            }
        };

        if started {
            trace!(name = %self.name, id = %deferred.id(), "single-flight computation started");
            // registered outside the lock: an already finished task runs the
            // observer synchronously
            let slot = Arc::downgrade(&self.slot);
            let id = deferred.id();
            deferred.on_completion(move |_| {
                let Some(slot) = slot.upgrade() else {
                    return;
                };
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().is_some_and(|d| d.id() == id) {
                    *slot = None;
                }
            });
        }
        deferred.await_value().await
    }
}
