//! Hot multicast flow with a replay buffer.
//!
//! A [`SharedFlow`] emits regardless of collectors. Each collection of
//! [`SharedFlow::as_flow`] opens its own subscription on the underlying
//! [`BroadcastChannel`], so late collectors start from the last `replay` values.

use crate::broadcast::{BroadcastChannel, Replay, Subscription};
use crate::channel::{Overflow, TrySendError};
use crate::error::FlowError;
use crate::flow::Flow;

/// Hot flow shared by every collector.
pub struct SharedFlow<T> {
    channel: BroadcastChannel<T>,
}

impl<T> Clone for SharedFlow<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> SharedFlow<T> {
    /// `replay` past values are handed to new collectors; `capacity` bounds
    /// what each collector may have buffered before `emit` suspends.
    pub fn new(replay: usize, capacity: usize) -> Self {
        let mode = match replay {
            0 => Replay::None,
            k => Replay::LastN(k),
        };
        Self {
            channel: BroadcastChannel::new(capacity, mode, Overflow::Suspend),
        }
    }

    /// Delivers `value` to every current collector; suspends on a full one.
    pub async fn emit(&self, value: T) -> Result<(), FlowError> {
        self.channel
            .send(value)
            .await
            .map_err(|_| FlowError::Detached)
    }

    /// Non-suspending emit; `false` if some collector had no room or the
    /// flow was closed.
    pub fn try_emit(&self, value: T) -> bool {
        match self.channel.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.channel.subscriber_count()
    }

    /// Raw subscription, for callers that prefer `recv` over a flow.
    pub fn subscribe(&self) -> Subscription<T> {
        self.channel.subscribe()
    }

    /// Ends every collection once its buffered values are drained.
    pub fn close(&self) -> bool {
        self.channel.close()
    }

    /// Flow view: each collection subscribes when it starts and detaches
    /// when it stops.
    pub fn as_flow(&self) -> Flow<T> {
        let channel = self.channel.clone();
        Flow::new(move |em| {
            let sub = channel.subscribe();
            async move {
                while let Ok(v) = sub.recv().await {
                    em.emit(v).await?;
                }
                Ok(())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn until_subscribed<T: Clone + Send + 'static>(flow: &SharedFlow<T>, n: usize) {
        while flow.subscriber_count() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn every_collector_receives_each_emission() {
        let shared = SharedFlow::new(0, 8);
        let a = {
            let f = shared.as_flow();
            tokio::spawn(async move { f.take(2).to_vec().await })
        };
        let b = {
            let f = shared.as_flow();
            tokio::spawn(async move { f.take(2).to_vec().await })
        };
        until_subscribed(&shared, 2).await;

        shared.emit("x").await.unwrap();
        shared.emit("y").await.unwrap();
        assert_eq!(a.await.unwrap(), Ok(vec!["x", "y"]));
        assert_eq!(b.await.unwrap(), Ok(vec!["x", "y"]));
    }

    #[tokio::test]
    async fn late_collector_starts_from_replay() {
        let shared = SharedFlow::new(1, 4);
        assert!(shared.try_emit(1));
        assert!(shared.try_emit(2));
        let late = shared.subscribe();
        assert_eq!(late.recv().await, Ok(2));
    }

    #[tokio::test]
    async fn close_completes_collections() {
        let shared = SharedFlow::new(2, 4);
        shared.emit(1).await.unwrap();
        shared.emit(2).await.unwrap();
        shared.close();
        assert_eq!(shared.as_flow().to_vec().await, Ok(vec![1, 2]));
        assert!(!shared.try_emit(3));
    }
}
