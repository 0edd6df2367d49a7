//! Shared-counter harness for demonstrating lost updates.
//!
//! Both increments perform the same read / suspend / write sequence; only the
//! guarded one holds a [`Mutex`] across it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::sync::Mutex;

/// Counter meant to be shared (behind an `Arc`) by many tasks.
#[derive(Debug, Default)]
pub struct RaceCounter {
    value: AtomicU64,
    guard: Mutex<()>,
}

impl RaceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Read, yield, write back. Concurrent callers overwrite each other.
    pub async fn unguarded_increment(&self) {
        let seen = self.value.load(Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.value.store(seen + 1, Ordering::SeqCst);
    }

    /// Same sequence under the lock; never loses an update.
    pub async fn guarded_increment(&self) {
        let _held = self.guard.lock().await;
        let seen = self.value.load(Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.value.store(seen + 1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TASKS: u64 = 8;
    const ROUNDS: u64 = 50;

    async fn hammer(counter: &Arc<RaceCounter>, guarded: bool) -> u64 {
        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let c = counter.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..ROUNDS {
                    if guarded {
                        c.guarded_increment().await;
                    } else {
                        c.unguarded_increment().await;
                    }
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        counter.get()
    }

    #[tokio::test]
    async fn unguarded_increments_lose_updates() {
        let total = hammer(&Arc::new(RaceCounter::new()), false).await;
        assert!(total < TASKS * ROUNDS, "got {total}");
    }

    #[tokio::test]
    async fn guarded_increments_are_exact() {
        let total = hammer(&Arc::new(RaceCounter::new()), true).await;
        assert_eq!(total, TASKS * ROUNDS);
    }
}
