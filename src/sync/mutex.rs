//! Non-reentrant async mutex.
//!
//! A thin layer over [`tokio::sync::Mutex`]: waiters are served FIFO and the
//! guard may be held across `.await`. Locking again from the task that
//! already holds the guard never completes.

use std::fmt;

use tokio::sync::MutexGuard;

/// Async mutual exclusion around a value.
pub struct Mutex<T> {
    inner: tokio::sync::Mutex<T>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(value),
        }
    }

    /// Suspends until the lock is acquired.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    /// Acquires the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock().ok()
    }

    /// Runs `f` with exclusive access, releasing the lock afterwards.
    ///
    /// For critical sections that must themselves await, hold the guard from
    /// [`lock`](Self::lock) instead.
    pub async fn with_lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }

    /// True while some task holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn try_lock_fails_while_held() {
        let m = Mutex::new(1);
        let guard = m.lock().await;
        assert!(m.is_locked());
        assert!(m.try_lock().is_none());
        drop(guard);
        assert!(m.try_lock().is_some());
    }

    #[tokio::test]
    async fn with_lock_returns_closure_result() {
        let m = Mutex::new(41);
        let v = m.with_lock(|n| {
            *n += 1;
            *n
        })
        .await;
        assert_eq!(v, 42);
        assert!(!m.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn reentrant_lock_never_completes() {
        let m = Mutex::new(());
        let _outer = m.lock().await;
        let inner = tokio::time::timeout(Duration::from_secs(1), m.lock()).await;
        assert!(inner.is_err(), "second acquisition by the owner must block");
    }

    #[tokio::test]
    async fn guard_held_across_await_serialises_updates() {
        let m = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..4 {
            let m = m.clone();
            handles.push(tokio::spawn(async move {
                let mut v = m.lock().await;
                v.push(i);
                tokio::task::yield_now().await;
                v.push(i);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let v = Arc::try_unwrap(m).unwrap().into_inner();
        assert!(v.chunks(2).all(|pair| pair[0] == pair[1]));
    }
}
