//! Shared per-task record: identity, cancellation, state and the one-shot outcome slot.
//!
//! The cell is owned jointly by the spawned future and every handle. The
//! outcome is written exactly once by [`TaskCell::complete`]; observers are
//! taken out under the lock and invoked after it is released, so an observer
//! may freely inspect (or register on) the same task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::tasks::state::{Outcome, TaskId, TaskState};

pub(crate) type Observer<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;

struct Slot<T> {
    outcome: Option<Arc<Outcome<T>>>,
    observers: Vec<Observer<T>>,
}

pub(crate) struct TaskCell<T> {
    id: TaskId,
    name: Arc<str>,
    scope: Arc<str>,
    token: CancellationToken,
    state: watch::Sender<TaskState>,
    slot: Mutex<Slot<T>>,
}

impl<T> TaskCell<T> {
    pub(crate) fn new(name: Arc<str>, scope: Arc<str>, token: CancellationToken) -> Self {
        let (state, _) = watch::channel(TaskState::Created);
        Self {
            id: TaskId::next(),
            name,
            scope,
            token,
            state,
            slot: Mutex::new(Slot {
                outcome: None,
                observers: Vec::new(),
            }),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub(crate) fn scope(&self) -> &Arc<str> {
        &self.scope
    }

    #[inline]
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// `Created → Active`; no-op once the task moved on.
    pub(crate) fn activate(&self) -> bool {
        self.state.send_if_modified(|s| {
            if *s == TaskState::Created {
                *s = TaskState::Active;
                true
            } else {
                false
            }
        })
    }

    /// Fixes the outcome. Returns `false` if it was already fixed.
    pub(crate) fn complete(&self, outcome: Outcome<T>) -> bool {
        let terminal = outcome.state();
        let outcome = Arc::new(outcome);
        let observers = {
            let mut slot = self.lock();
            if slot.outcome.is_some() {
                return false;
            }
            slot.outcome = Some(Arc::clone(&outcome));
            std::mem::take(&mut slot.observers)
        };
        self.state.send_replace(terminal);
        for observer in observers {
            observer(&outcome);
        }
        true
    }

    pub(crate) fn outcome(&self) -> Option<Arc<Outcome<T>>> {
        self.lock().outcome.clone()
    }

    /// Registers an observer; fires it immediately on this thread when the
    /// outcome is already fixed.
    pub(crate) fn on_completion(&self, observer: Observer<T>) {
        let ready = {
            let mut slot = self.lock();
            match &slot.outcome {
                Some(outcome) => Arc::clone(outcome),
                None => {
                    slot.observers.push(observer);
                    return;
                }
            }
        };
        observer(&ready);
    }

    /// Waits until the task is terminal and returns that state.
    pub(crate) async fn join(&self) -> TaskState {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let state = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cell() -> TaskCell<u32> {
        TaskCell::new("t".into(), "s".into(), CancellationToken::new())
    }

    #[test]
    fn outcome_is_fixed_once() {
        let c = cell();
        assert!(c.activate());
        assert!(!c.activate());
        assert!(c.complete(Outcome::Completed(1)));
        assert!(!c.complete(Outcome::Completed(2)));
        assert_eq!(*c.outcome().unwrap(), Outcome::Completed(1));
        assert_eq!(c.state(), TaskState::Completed);
    }

    #[test]
    fn observers_fire_once_before_and_after_completion() {
        let c = cell();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        c.on_completion(Box::new(move |o| {
            assert_eq!(o.state(), TaskState::Failed);
            h.fetch_add(1, Ordering::SeqCst);
        }));
        c.complete(Outcome::Failed(crate::TaskError::fail("x")));
        c.complete(Outcome::Cancelled);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let h = hits.clone();
        c.on_completion(Box::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn join_wakes_on_terminal_state() {
        let c = Arc::new(cell());
        let c2 = c.clone();
        let waiter = tokio::spawn(async move { c2.join().await });
        tokio::task::yield_now().await;
        c.complete(Outcome::Cancelled);
        assert_eq!(waiter.await.unwrap(), TaskState::Cancelled);
    }
}
