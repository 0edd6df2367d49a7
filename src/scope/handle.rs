//! # Scope: structured ownership of tasks.
//!
//! A [`Scope`] owns every task spawned through it and decides what a child
//! failure means:
//!
//! ```text
//!               Propagating                         Isolating
//!   child fails ──► record first failure    child fails ──► stays with the child
//!               ──► cancel scope token                  (siblings unaffected)
//!               ──► siblings observe cancel
//! ```
//!
//! ## Rules
//! - Cancellation is irreversible: once the token is cancelled, `spawn` fails
//!   with [`ScopeError::Cancelled`].
//! - Every task token is a child of the scope token, so cancelling the scope
//!   reaches every child (and, through nested scopes, every descendant).
//! - Each task registers with this scope's tracker and all ancestor trackers;
//!   waiting on a scope therefore also waits for tasks of nested scopes.
//! - Only non-cancellation failures of [`spawn`](Scope::spawn)ed jobs escalate.
//!   A [`Deferred`] failure is delivered to its awaiter instead.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::{
    core::runner,
    error::{ScopeError, TaskError},
    events::{Bus, Event, EventKind},
    scope::ScopeBuilder,
    tasks::{Deferred, Job, Outcome, TaskCell, TaskContext, TaskHandle},
};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// How a scope reacts to a failing child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// First child failure cancels all siblings and the scope.
    Propagating,
    /// Child failures stay with the child.
    Isolating,
}

impl ScopeMode {
    pub fn as_label(self) -> &'static str {
        match self {
            ScopeMode::Propagating => "propagating",
            ScopeMode::Isolating => "isolating",
        }
    }
}

/// Cloneable handle to a structured task scope.
#[derive(Clone)]
pub struct Scope {
    pub(super) inner: Arc<ScopeInner>,
}

pub(super) struct ScopeInner {
    pub(super) id: u64,
    pub(super) name: Arc<str>,
    pub(super) mode: ScopeMode,
    pub(super) token: CancellationToken,
    pub(super) tracker: TaskTracker,
    pub(super) failure: Mutex<Option<(Arc<str>, TaskError)>>,
    pub(super) bus: Bus,
    pub(super) runtime: Option<Handle>,
    pub(super) parent: Option<Scope>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("mode", &self.inner.mode)
            .field("cancelled", &self.inner.token.is_cancelled())
            .field("tasks", &self.inner.tracker.len())
            .finish()
    }
}

impl Scope {
    /// Creates a root scope with its own (unobserved) event bus.
    ///
    /// Tasks run on the ambient tokio runtime.
    pub fn new(mode: ScopeMode) -> Self {
        ScopeBuilder::new().mode(mode).build()
    }

    /// Starts configuring a root scope.
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::new()
    }

    pub(super) fn from_parts(
        name: Arc<str>,
        mode: ScopeMode,
        token: CancellationToken,
        bus: Bus,
        runtime: Option<Handle>,
        parent: Option<Scope>,
    ) -> Self {
        let scope = Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                name,
                mode,
                token,
                tracker: TaskTracker::new(),
                failure: Mutex::new(None),
                bus,
                runtime,
                parent,
            }),
        };
        scope.publish(Event::new(EventKind::ScopeOpened).with_reason(mode.as_label()));
        scope
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn mode(&self) -> ScopeMode {
        self.inner.mode
    }

    /// The event bus this scope publishes to.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// The scope's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Number of tasks (including tasks of nested scopes) not yet finished.
    pub fn active_tasks(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Cancels the scope and all of its children. Irreversible.
    pub fn cancel(&self) {
        self.cancel_with("cancelled");
    }

    pub(crate) fn cancel_with(&self, reason: &str) {
        if self.inner.token.is_cancelled() {
            return;
        }
        self.inner.token.cancel();
        debug!(scope = %self.inner.name, reason, "scope cancelled");
        self.publish(Event::new(EventKind::ScopeCancelled).with_reason(reason));
    }

    /// The first recorded child failure, if any.
    pub fn failure(&self) -> Option<ScopeError> {
        let slot = self
            .inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|(task, error)| ScopeError::ChildFailed {
            task: task.to_string(),
            error: error.clone(),
        })
    }

    /// Spawns fire-and-forget work.
    ///
    /// A non-cancellation failure cancels a propagating scope (and thereby
    /// every sibling). Fails immediately if the scope is cancelled.
    pub fn spawn<F, Fut>(&self, name: impl Into<Arc<str>>, work: F) -> Result<Job, ScopeError>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.launch(name.into(), true, work)
    }

    /// Spawns value-producing work.
    ///
    /// The failure of this task is re-raised only to callers of
    /// [`Deferred::await_value`]; it never fails the scope by itself.
    pub fn spawn_with_result<T, F, Fut>(
        &self,
        name: impl Into<Arc<str>>,
        work: F,
    ) -> Result<Deferred<T>, ScopeError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.launch(name.into(), false, work)
    }

    fn launch<T, F, Fut>(
        &self,
        name: Arc<str>,
        escalate: bool,
        work: F,
    ) -> Result<TaskHandle<T>, ScopeError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        if self.is_cancelled() {
            return Err(ScopeError::Cancelled);
        }

        let cell = Arc::new(TaskCell::new(
            name.clone(),
            self.inner.name.clone(),
            self.inner.token.child_token(),
        ));
        let ctx = TaskContext::new(cell.id(), name, cell.token().clone(), self.clone());
        let ancestors: Vec<_> = self.ancestors().map(|s| s.inner.tracker.token()).collect();

        let scope = self.clone();
        let task = Arc::clone(&cell);
        let fut = async move {
            let _ancestors = ancestors;
            let outcome = runner::run_once(&task, &scope.inner.bus, work(ctx)).await;
            if escalate {
                if let Outcome::Failed(err) = &outcome {
                    scope.child_failed(task.name(), err);
                }
            }
            task.complete(outcome);
        };

        match &self.inner.runtime {
            Some(handle) => drop(self.inner.tracker.spawn_on(fut, handle)),
            None => drop(self.inner.tracker.spawn(fut)),
        }
        Ok(TaskHandle::new(cell))
    }

    fn child_failed(&self, task: &Arc<str>, err: &TaskError) {
        if self.inner.mode != ScopeMode::Propagating || err.is_cancellation() {
            return;
        }
        {
            let mut slot = self
                .inner
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some((task.clone(), err.clone()));
            }
        }
        self.cancel_with(&format!("child {task} failed"));
    }

    pub(super) fn take_failure(&self) -> Option<ScopeError> {
        self.inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|(task, error)| ScopeError::ChildFailed {
                task: task.to_string(),
                error,
            })
    }

    /// Creates an externally held child scope (cancelled with this one).
    pub fn child(&self, name: impl Into<Arc<str>>, mode: ScopeMode) -> Scope {
        self.nested(name, mode, self.inner.token.child_token())
    }

    pub(crate) fn nested(
        &self,
        name: impl Into<Arc<str>>,
        mode: ScopeMode,
        token: CancellationToken,
    ) -> Scope {
        Scope::from_parts(
            name.into(),
            mode,
            token,
            self.inner.bus.clone(),
            self.inner.runtime.clone(),
            Some(self.clone()),
        )
    }

    /// Waits for every task currently owned by an externally held scope.
    ///
    /// New tasks may be spawned again afterwards. Do not call concurrently
    /// with a structured run of the same scope.
    pub async fn join_children(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }

    /// Closes the tracker for good and waits for every owned task.
    pub(crate) async fn close_and_wait(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    fn ancestors(&self) -> impl Iterator<Item = &Scope> {
        std::iter::successors(self.inner.parent.as_ref(), |s| s.inner.parent.as_ref())
    }

    pub(super) fn publish(&self, ev: Event) {
        self.inner.bus.publish(ev.with_scope(self.inner.name.clone()));
    }
}
