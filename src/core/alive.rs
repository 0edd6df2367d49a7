//! # Task liveness tracker with sequence-based ordering.
//!
//! Maintains which tasks are currently running, fed by the kernel listener.
//!
//! ```text
//! Task runner ──► Bus ──► kernel listener ──► AliveTracker::update()
//!                                                   │
//!                                                   ▼
//!                                   HashMap<task id, {name, seq}>
//! ```
//!
//! ## Rules
//! - `TaskStarting` inserts, terminal task events remove
//! - Events with `seq <= last_seq` for a tracked task are rejected (stale)
//! - Reads are eventually consistent with the bus

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};

#[derive(Debug)]
struct Entry {
    name: Arc<str>,
    last_seq: u64,
}

/// Tracks running tasks by id.
#[derive(Debug, Default)]
pub(crate) struct AliveTracker {
    state: RwLock<HashMap<u64, Entry>>,
}

impl AliveTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Applies a task lifecycle event. Returns `true` if the alive set changed.
    pub(crate) async fn update(&self, ev: &Event) -> bool {
        let (Some(id), Some(name)) = (ev.task_id, ev.task.as_ref()) else {
            return false;
        };

        let mut state = self.state.write().await;
        if let Some(entry) = state.get_mut(&id) {
            if ev.seq <= entry.last_seq {
                return false;
            }
            entry.last_seq = ev.seq;
        }
        match ev.kind {
            EventKind::TaskStarting => {
                state
                    .insert(
                        id,
                        Entry {
                            name: Arc::clone(name),
                            last_seq: ev.seq,
                        },
                    )
                    .is_none()
            }
            _ if ev.is_task_terminal() => state.remove(&id).is_some(),
            _ => false,
        }
    }

    /// Sorted names of running tasks (a name repeats per running instance).
    pub(crate) async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state.values().map(|e| e.name.to_string()).collect();
        alive.sort_unstable();
        alive
    }

    /// True if at least one task named `name` is running.
    pub(crate) async fn is_alive(&self, name: &str) -> bool {
        self.state
            .read()
            .await
            .values()
            .any(|e| &*e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_event(kind: EventKind, id: u64, name: &str) -> Event {
        Event::new(kind).with_task(name).with_task_id(id)
    }

    #[tokio::test]
    async fn starting_and_terminal_events_toggle_liveness() {
        let alive = AliveTracker::new();
        assert!(alive.update(&task_event(EventKind::TaskStarting, 1, "fetch")).await);
        assert!(alive.update(&task_event(EventKind::TaskStarting, 2, "fetch")).await);
        assert_eq!(alive.snapshot().await, vec!["fetch", "fetch"]);

        assert!(alive.update(&task_event(EventKind::TaskFailed, 1, "fetch")).await);
        assert!(alive.is_alive("fetch").await);
        assert!(alive.update(&task_event(EventKind::TaskCancelled, 2, "fetch")).await);
        assert!(!alive.is_alive("fetch").await);
    }

    #[tokio::test]
    async fn stale_events_are_rejected() {
        let alive = AliveTracker::new();
        let early = task_event(EventKind::TaskCompleted, 7, "job");
        let start = task_event(EventKind::TaskStarting, 7, "job");
        assert!(alive.update(&start).await);
        assert!(!alive.update(&early).await);
        assert_eq!(alive.snapshot().await, vec!["job"]);
    }

    #[tokio::test]
    async fn events_without_task_id_are_ignored() {
        let alive = AliveTracker::new();
        let ev = Event::new(EventKind::TaskStarting).with_task("anonymous");
        assert!(!alive.update(&ev).await);
        assert!(alive.snapshot().await.is_empty());
    }
}
