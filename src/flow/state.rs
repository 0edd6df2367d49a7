//! Hot holder of a single current value.
//!
//! Backed by [`tokio::sync::watch`]: writers never suspend, readers observe the
//! latest value. Equal writes are not broadcast, and a slow subscriber skips
//! intermediate values (it always ends on the latest one).

use std::sync::Arc;

use tokio::sync::watch;

use crate::flow::Flow;

/// Observable current value.
pub struct StateFlow<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for StateFlow<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> StateFlow<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Stores `value`; subscribers are notified only if it differs from the
    /// current one. Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|cur| {
            if *cur == value {
                false
            } else {
                *cur = value;
                true
            }
        })
    }

    /// Replaces the value with `f(current)` atomically with respect to other writers.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        self.tx.send_if_modified(|cur| {
            let next = f(cur);
            if *cur == next {
                false
            } else {
                *cur = next;
                true
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Yields the current value first, then every observed change.
    pub fn subscribe(&self) -> StateSubscription<T> {
        StateSubscription {
            rx: self.tx.subscribe(),
            first: true,
        }
    }

    /// Endless flow of this state: current value, then changes.
    pub fn as_flow(&self) -> Flow<T> {
        let state = self.clone();
        Flow::new(move |em| {
            let mut sub = state.subscribe();
            async move {
                while let Some(v) = sub.next().await {
                    em.emit(v).await?;
                }
                Ok(())
            }
        })
    }
}

/// Reader side of a [`StateFlow`].
pub struct StateSubscription<T> {
    rx: watch::Receiver<T>,
    first: bool,
}

impl<T: Clone> StateSubscription<T> {
    /// Next value to observe. `None` once every [`StateFlow`] handle is gone.
    pub async fn next(&mut self) -> Option<T> {
        if std::mem::take(&mut self.first) {
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn equal_writes_are_not_changes() {
        let state = StateFlow::new(0);
        assert!(!state.set(0));
        assert!(state.set(1));
        assert!(!state.update(|v| *v));
        assert!(state.update(|v| v + 1));
        assert_eq!(state.value(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_sees_current_then_distinct_changes() {
        let state = StateFlow::new(0);
        let collector = {
            let flow = state.as_flow();
            tokio::spawn(async move { flow.take(3).to_vec().await })
        };
        for v in [0, 0, 1, 1, 2, 2] {
            state.set(v);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let seen = collector.await.unwrap().unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn subscription_ends_when_state_is_dropped() {
        let state = StateFlow::new("a");
        let mut sub = state.subscribe();
        drop(state);
        assert_eq!(sub.next().await, Some("a"));
        assert_eq!(sub.next().await, None);
    }
}
