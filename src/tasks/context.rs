//! # Per-task execution context.
//!
//! Every work closure receives a [`TaskContext`]. It is the explicit
//! cancellation capability of the task: loops that never await must poll
//! [`TaskContext::checkpoint`] to stay cancellable.
//!
//! ## Example
//! ```rust,no_run
//! use scopekit::{Scope, ScopeMode};
//!
//! # async fn demo() -> Result<(), scopekit::ScopeError> {
//! let scope = Scope::new(ScopeMode::Isolating);
//! let job = scope.spawn("spin", |ctx| async move {
//!     loop {
//!         ctx.checkpoint()?;
//!         tokio::task::yield_now().await;
//!     }
//! })?;
//! job.cancel_and_join().await;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ScopeError, TaskError};
use crate::scope::{Scope, ScopeMode};
use crate::tasks::state::TaskId;

/// Execution context handed to task work.
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    name: Arc<str>,
    token: CancellationToken,
    scope: Scope,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, name: Arc<str>, token: CancellationToken, scope: Scope) -> Self {
        Self {
            id,
            name,
            token,
            scope,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// This task's cancellation token (a child of its scope's token).
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The scope owning this task.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `Err(Canceled)` once cancellation was requested.
    #[inline]
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.token.is_cancelled() {
            Err(TaskError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Resolves when this task is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Cancellable sleep.
    pub async fn delay(&self, d: Duration) -> Result<(), TaskError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TaskError::Canceled),
            _ = tokio::time::sleep(d) => Ok(()),
        }
    }

    /// Runs `body` in a nested propagating scope whose children die with this task.
    pub async fn run_propagating<R, F, Fut>(&self, body: F) -> Result<R, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        self.nested(ScopeMode::Propagating).enter(body).await
    }

    /// Runs `body` in a nested isolating scope whose children die with this task.
    pub async fn run_isolating<R, F, Fut>(&self, body: F) -> Result<R, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        self.nested(ScopeMode::Isolating).enter(body).await
    }

    fn nested(&self, mode: ScopeMode) -> Scope {
        let name = format!("{}/{}", self.scope.name(), self.name);
        self.scope.nested(name, mode, self.token.child_token())
    }
}
