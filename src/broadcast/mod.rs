//! # Broadcast channel: one producer side, many independent subscriptions.
//!
//! ```text
//! send(v) ──► history (per Replay) ──► Subscription 1 [own Channel, own overflow]
//!                                  ├─► Subscription 2
//!                                  └─► Subscription N
//! subscribe() ──► new Subscription pre-filled from history
//! ```
//!
//! ## Rules
//! - Values sent while nobody is subscribed are visible only through replay.
//! - `Replay::Last` keeps the latest value; equal consecutive values are NOT collapsed.
//! - Each subscription buffers independently; a slow subscriber only suffers
//!   its own overflow policy (a `Suspend` subscriber slows down `send`).
//! - Dropping a [`Subscription`] detaches it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::Stream;
use tracing::trace;

use crate::channel::{Capacity, Channel, Overflow, RecvError, SendError, TryRecvError, TrySendError};

/// Which past values a new subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Only values sent after subscribing.
    None,
    /// The most recent value.
    Last,
    /// Up to `k` most recent values.
    LastN(usize),
}

impl Replay {
    fn depth(self) -> usize {
        match self {
            Replay::None => 0,
            Replay::Last => 1,
            Replay::LastN(k) => k,
        }
    }
}

struct State<T> {
    subscribers: Vec<(u64, Channel<T>)>,
    history: VecDeque<T>,
    next_id: u64,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    replay: Replay,
    capacity: usize,
    overflow: Overflow,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fan-out channel with replay.
pub struct BroadcastChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BroadcastChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for BroadcastChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.lock();
        f.debug_struct("BroadcastChannel")
            .field("replay", &self.shared.replay)
            .field("capacity", &self.shared.capacity)
            .field("subscribers", &st.subscribers.len())
            .field("closed", &st.closed)
            .finish()
    }
}

impl<T: Clone + Send + 'static> BroadcastChannel<T> {
    /// `capacity` is the per-subscription buffer (at least 1, and at least the
    /// replay depth so history always fits).
    pub fn new(capacity: usize, replay: Replay, overflow: Overflow) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    subscribers: Vec::new(),
                    history: VecDeque::new(),
                    next_id: 0,
                    closed: false,
                }),
                replay,
                capacity: capacity.max(replay.depth()).max(1),
                overflow,
            }),
        }
    }

    /// Keeps only the latest value, for subscribers and late joiners alike.
    pub fn conflated() -> Self {
        Self::new(1, Replay::Last, Overflow::DropOldest)
    }

    pub fn replay(&self) -> Replay {
        self.shared.replay
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut st = self.shared.lock();
        st.subscribers.retain(|(_, ch)| !ch.is_closed());
        st.subscribers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Opens a new subscription, pre-filled with replayed history.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut st = self.shared.lock();
        let channel = Channel::new(Capacity::Buffered(self.shared.capacity), self.shared.overflow);
        for v in &st.history {
            // history never exceeds capacity
            let _ = channel.try_send(v.clone());
        }
        let id = st.next_id;
        st.next_id += 1;
        if st.closed {
            channel.close();
        } else {
            st.subscribers.push((id, channel.clone()));
        }
        Subscription {
            id,
            channel,
            parent: Arc::downgrade(&self.shared),
        }
    }

    /// Delivers `value` to every subscription, suspending on full
    /// `Suspend`-policy subscriptions.
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        let targets = match self.record(&value) {
            Some(targets) => targets,
            None => return Err(SendError::Closed(value)),
        };
        for ch in targets {
            // a subscription detached meanwhile just misses the value
            let _ = ch.send(value.clone()).await;
        }
        Ok(())
    }

    /// Non-suspending send.
    ///
    /// Each subscription applies its own overflow policy. Returns `Full` if at
    /// least one subscription rejected the value (the others still got it).
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let targets = match self.record(&value) {
            Some(targets) => targets,
            None => return Err(TrySendError::Closed(value)),
        };
        let mut rejected = 0usize;
        for ch in targets {
            if let Err(TrySendError::Full(_)) = ch.try_send(value.clone()) {
                rejected += 1;
            }
        }
        if rejected > 0 {
            trace!(rejected, "broadcast try_send rejected by subscribers");
            Err(TrySendError::Full(value))
        } else {
            Ok(())
        }
    }

    /// Closes the channel and every subscription; subscriptions drain, then end.
    pub fn close(&self) -> bool {
        let subs = {
            let mut st = self.shared.lock();
            if st.closed {
                return false;
            }
            st.closed = true;
            std::mem::take(&mut st.subscribers)
        };
        for (_, ch) in subs {
            ch.close();
        }
        true
    }

    /// Updates history and snapshots live subscriptions. `None` when closed.
    fn record(&self, value: &T) -> Option<Vec<Channel<T>>> {
        let mut st = self.shared.lock();
        if st.closed {
            return None;
        }
        let depth = self.shared.replay.depth();
        if depth > 0 {
            st.history.push_back(value.clone());
            while st.history.len() > depth {
                st.history.pop_front();
            }
        }
        st.subscribers.retain(|(_, ch)| !ch.is_closed());
        Some(st.subscribers.iter().map(|(_, ch)| ch.clone()).collect())
    }
}

/// One subscriber's view of a [`BroadcastChannel`].
pub struct Subscription<T> {
    id: u64,
    channel: Channel<T>,
    parent: Weak<Shared<T>>,
}

impl<T> Subscription<T> {
    pub async fn recv(&self) -> Result<T, RecvError> {
        self.channel.recv().await
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.channel.try_recv()
    }

    /// Buffered, not yet received values.
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Turns the subscription into a `Stream`. Detaches when the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold(self, |sub| async move {
            match sub.recv().await {
                Ok(v) => Some((v, sub)),
                Err(RecvError::Closed) => None,
            }
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.channel.close();
        if let Some(parent) = self.parent.upgrade() {
            parent.lock().subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn late_subscribers_only_see_new_values_without_replay() {
        let bc = BroadcastChannel::new(1, Replay::None, Overflow::Suspend);
        bc.try_send(1).unwrap();
        bc.try_send(2).unwrap();

        let a = bc.subscribe();
        let b = bc.subscribe();
        bc.try_send(3).unwrap();

        assert_eq!(a.recv().await, Ok(3));
        assert_eq!(b.recv().await, Ok(3));
        assert_eq!(a.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn last_replay_hands_latest_to_late_subscriber() {
        let bc = BroadcastChannel::conflated();
        bc.try_send(1).unwrap();
        bc.try_send(2).unwrap();
        let a = bc.subscribe();
        assert_eq!(a.try_recv(), Ok(2));
        bc.try_send(3).unwrap();
        assert_eq!(a.try_recv(), Ok(3));
    }

    #[tokio::test]
    async fn last_replay_does_not_collapse_equal_values() {
        let bc = BroadcastChannel::new(4, Replay::Last, Overflow::Suspend);
        let a = bc.subscribe();
        bc.send(5).await.unwrap();
        bc.send(5).await.unwrap();
        assert_eq!(a.len(), 2);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_only_its_own_values() {
        let bc = BroadcastChannel::new(1, Replay::None, Overflow::DropOldest);
        let fast = bc.subscribe();
        let slow = bc.subscribe();

        bc.send(1).await.unwrap();
        assert_eq!(fast.recv().await, Ok(1));
        bc.send(2).await.unwrap();
        assert_eq!(fast.recv().await, Ok(2));

        assert_eq!(slow.try_recv(), Ok(2));
        assert_eq!(slow.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn dropping_a_subscription_detaches_it() {
        let bc = BroadcastChannel::new(2, Replay::None, Overflow::Suspend);
        let a = bc.subscribe();
        let b = bc.subscribe();
        assert_eq!(bc.subscriber_count(), 2);
        drop(b);
        assert_eq!(bc.subscriber_count(), 1);
        bc.send(1).await.unwrap();
        assert_eq!(a.recv().await, Ok(1));
    }

    #[tokio::test]
    async fn close_drains_then_ends_every_subscription() {
        let bc = BroadcastChannel::new(2, Replay::LastN(2), Overflow::Suspend);
        let a = bc.subscribe();
        bc.send("x").await.unwrap();
        assert!(bc.close());
        assert!(bc.send("y").await.is_err());
        assert_eq!(a.recv().await, Ok("x"));
        assert_eq!(a.recv().await, Err(RecvError::Closed));

        let late = bc.subscribe();
        assert_eq!(late.recv().await, Ok("x"));
        assert_eq!(late.recv().await, Err(RecvError::Closed));
    }
}
