use std::future::Future;
use std::sync::Arc;

use crate::channel::{Capacity, Channel, Overflow};
use crate::error::{ScopeError, TaskError};
use crate::scope::Scope;
use crate::tasks::TaskContext;

/// Spawns a producer task in `scope` that owns the sending side of a new
/// channel and returns the channel for receiving.
///
/// The channel is closed when the producer finishes, fails or is cancelled.
/// Values are produced once, no matter how many receivers drain them.
///
/// ```rust
/// use scopekit::{produce, run_propagating, Capacity};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let out = run_propagating(|scope| async move {
///     let numbers = produce(&scope, "numbers", Capacity::Rendezvous, |_, tx| async move {
///         for i in 1..=3 {
///             tx.send(i).await.ok();
///         }
///         Ok(())
///     })?;
///     let mut seen = Vec::new();
///     numbers.consume_each(|v| seen.push(v)).await;
///     Ok(seen)
/// })
/// .await;
/// assert_eq!(out, Ok(vec![1, 2, 3]));
/// # }
/// ```
pub fn produce<T, F, Fut>(
    scope: &Scope,
    name: impl Into<Arc<str>>,
    capacity: Capacity,
    body: F,
) -> Result<Channel<T>, ScopeError>
where
    T: Send + 'static,
    F: FnOnce(TaskContext, Channel<T>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let channel = Channel::with_bus(capacity, Overflow::Suspend, scope.bus().clone());
    let tx = channel.clone();
    scope.spawn(name, move |ctx| async move {
        let _close = CloseOnDrop(tx.clone());
        body(ctx, tx).await
    })?;
    Ok(channel)
}

struct CloseOnDrop<T>(Channel<T>);

impl<T> Drop for CloseOnDrop<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScopeMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn side_effects_happen_once() {
        let scope = Scope::new(ScopeMode::Isolating);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let ch = produce(&scope, "once", Capacity::Buffered(8), move |_, tx| async move {
            c.fetch_add(1, Ordering::SeqCst);
            for i in 0..3 {
                tx.send(i).await.ok();
            }
            Ok(())
        })
        .unwrap();

        let mut first = Vec::new();
        ch.consume_each(|v| first.push(v)).await;
        let mut second = Vec::new();
        ch.consume_each(|v| second.push(v)).await;

        assert_eq!(first, vec![0, 1, 2]);
        assert!(second.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_producer_closes_the_channel() {
        let scope = Scope::new(ScopeMode::Isolating);
        let ch: Channel<u32> = produce(&scope, "forever", Capacity::Rendezvous, |ctx, _tx| async move {
            ctx.delay(Duration::from_secs(3600)).await
        })
        .unwrap();
        scope.cancel();
        scope.join_children().await;
        assert!(ch.is_closed());
        assert!(ch.recv().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rendezvous_producer_without_consumer_never_completes_a_send() {
        let scope = Scope::new(ScopeMode::Isolating);
        let sent = Arc::new(AtomicUsize::new(0));
        let s = sent.clone();
        let ch: Channel<u32> = produce(&scope, "ten", Capacity::Rendezvous, move |_, tx| async move {
            for i in 0..10 {
                if tx.send(i).await.is_ok() {
                    s.fetch_add(1, Ordering::SeqCst);
                }
            }
            Ok(())
        })
        .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sent.load(Ordering::SeqCst), 0);
        assert_eq!(ch.len(), 0);
        assert_eq!(ch.suspended_senders(), 1);
        scope.cancel();
        scope.join_children().await;
        assert_eq!(sent.load(Ordering::SeqCst), 0);
        assert_eq!(ch.suspended_senders(), 0);
    }
}
