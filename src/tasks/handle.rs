//! # Handles to running tasks.
//!
//! [`TaskHandle<T>`] is a cheap, cloneable view of one task. Two aliases name
//! the spawn disciplines:
//!
//! - [`Job`] (`TaskHandle<()>`) from [`Scope::spawn`](crate::Scope::spawn):
//!   fire-and-forget, a failure fails a propagating scope.
//! - [`Deferred<T>`] from [`Scope::spawn_with_result`](crate::Scope::spawn_with_result):
//!   the value (or failure) is delivered to whoever awaits it.
//!
//! ```text
//! handle.cancel() ──► token.cancel() ──► work dropped at next await ──► Cancelled
//! handle.join()   ──► waits for terminal state (never fails)
//! handle.await_value() ──► Ok(value) | Err(failure) | Err(Canceled)
//! ```

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::error::TaskError;
use crate::tasks::cell::TaskCell;
use crate::tasks::state::{Outcome, TaskId, TaskState};

/// Handle to a task producing `T`.
pub struct TaskHandle<T> {
    cell: Arc<TaskCell<T>>,
}

/// Handle for fire-and-forget work.
pub type Job = TaskHandle<()>;

/// Handle for value-producing work.
pub type Deferred<T> = TaskHandle<T>;

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.cell.id())
            .field("name", &self.cell.name())
            .field("scope", &self.cell.scope())
            .field("state", &self.cell.state())
            .finish()
    }
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(cell: Arc<TaskCell<T>>) -> Self {
        Self { cell }
    }

    /// Task identifier.
    pub fn id(&self) -> TaskId {
        self.cell.id()
    }

    /// Task name.
    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.cell.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == TaskState::Active
    }

    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Requests cancellation. Cooperative: the work stops at its next
    /// suspension point. No-op on a terminal task.
    pub fn cancel(&self) {
        if !self.state().is_terminal() {
            self.cell.token().cancel();
        }
    }

    /// Waits until the task is terminal. Never re-raises the task's failure.
    pub async fn join(&self) -> TaskState {
        self.cell.join().await
    }

    /// [`cancel`](Self::cancel) followed by [`join`](Self::join).
    pub async fn cancel_and_join(&self) -> TaskState {
        self.cancel();
        self.join().await
    }

    /// Registers a completion observer.
    ///
    /// Fires exactly once with the outcome. If the task is already terminal
    /// the observer runs immediately on the calling thread; otherwise it runs
    /// on the task's worker right after the outcome is fixed.
    pub fn on_completion<F>(&self, observer: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.cell.on_completion(Box::new(observer));
    }

    /// The failure, once terminal. `None` for success, cancellation or a running task.
    pub fn failure(&self) -> Option<TaskError> {
        self.cell.outcome().and_then(|o| o.error().cloned())
    }
}

impl<T: Clone> TaskHandle<T> {
    /// The outcome, if the task is terminal.
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.cell.outcome().map(|o| (*o).clone())
    }

    /// Waits for the task and returns its value, or re-raises its failure
    /// (cancellation as [`TaskError::Canceled`]) to this caller.
    pub async fn await_value(&self) -> Result<T, TaskError> {
        self.cell.join().await;
        match self.cell.outcome() {
            Some(outcome) => outcome.as_result().cloned(),
            None => Err(TaskError::Canceled),
        }
    }
}

/// Awaits several deferred results concurrently.
///
/// Returns the values in argument order, or the first failure as soon as it
/// is observed (remaining tasks keep running; cancel them through their scope).
pub async fn await_all<T, I>(deferreds: I) -> Result<Vec<T>, TaskError>
where
    T: Clone,
    I: IntoIterator<Item = Deferred<T>>,
{
    let handles: Vec<Deferred<T>> = deferreds.into_iter().collect();
    try_join_all(handles.iter().map(|d| d.await_value())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Scope, ScopeMode};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_reports_canceled_to_awaiters() {
        let scope = Scope::new(ScopeMode::Isolating);
        let slow = scope
            .spawn_with_result("slow", |ctx| async move {
                ctx.delay(Duration::from_secs(60)).await?;
                Ok(1u32)
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(slow.is_active());

        slow.cancel();
        assert_eq!(slow.await_value().await, Err(TaskError::Canceled));
        assert!(slow.is_cancelled());
        assert_eq!(slow.failure(), None);
        assert_eq!(slow.outcome(), Some(Outcome::Cancelled));
    }

    #[tokio::test]
    async fn failure_is_exposed_once_terminal() {
        let scope = Scope::new(ScopeMode::Isolating);
        let bad = scope
            .spawn_with_result("bad", |_| async { Err::<u32, _>(TaskError::fail("boom")) })
            .unwrap();
        assert_eq!(bad.join().await, TaskState::Failed);
        assert_eq!(bad.failure(), Some(TaskError::fail("boom")));
        assert_eq!(bad.await_value().await, Err(TaskError::fail("boom")));

        let good = scope.spawn_with_result("good", |_| async { Ok(7u32) }).unwrap();
        assert_eq!(good.await_value().await, Ok(7));
        assert_eq!(good.failure(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_registered_while_running_fires_once_on_completion() {
        let scope = Scope::new(ScopeMode::Isolating);
        let task = scope
            .spawn_with_result("work", |ctx| async move {
                ctx.delay(Duration::from_millis(50)).await?;
                Ok("done")
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(task.is_active());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        task.on_completion(move |o| s.lock().unwrap().push(o.clone()));
        assert!(seen.lock().unwrap().is_empty());

        assert_eq!(task.join().await, TaskState::Completed);
        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Completed("done")]);

        // already terminal: runs right away
        let s = seen.clone();
        task.on_completion(move |o| s.lock().unwrap().push(o.clone()));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
