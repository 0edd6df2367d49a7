//! Producer-side sink of a cold flow, bound to one collection.
//!
//! Every collection gets a fresh context id, installed as a task-local while
//! the producer future is polled. [`Emitter::emit`] compares that task-local
//! with its own id: an emitter moved into another task (or used after its
//! collection ended) is rejected with [`FlowError::ForeignEmission`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::error::FlowError;

tokio::task_local! {
    static COLLECTION: u64;
}

static NEXT_COLLECTION: AtomicU64 = AtomicU64::new(1);

pub(crate) struct Emission<T> {
    pub(crate) value: T,
    pub(crate) ack: oneshot::Sender<()>,
}

/// Sink handed to a flow producer.
pub struct Emitter<T> {
    tx: mpsc::Sender<Emission<T>>,
    context: u64,
}

impl<T> Emitter<T> {
    pub(crate) fn pair() -> (Self, mpsc::Receiver<Emission<T>>) {
        let (tx, rx) = mpsc::channel(1);
        let context = NEXT_COLLECTION.fetch_add(1, Ordering::Relaxed);
        (Self { tx, context }, rx)
    }

    pub(crate) fn context(&self) -> u64 {
        self.context
    }

    /// Hands `value` to the collector and suspends until it was processed.
    pub async fn emit(&self, value: T) -> Result<(), FlowError> {
        let here = COLLECTION.try_with(|c| *c).ok();
        if here != Some(self.context) {
            warn!(
                expected = self.context,
                actual = ?here,
                "flow emission from a foreign execution context rejected"
            );
            return Err(FlowError::ForeignEmission);
        }
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Emission { value, ack })
            .await
            .map_err(|_| FlowError::Detached)?;
        done.await.map_err(|_| FlowError::Detached)
    }
}

/// Polls `fut` with `context` installed as the current collection.
pub(crate) fn in_context<F>(context: u64, fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    COLLECTION.scope(context, fut)
}
