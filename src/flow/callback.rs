//! # Bridging callback APIs into cold flows.
//!
//! ```text
//! collect() ──► register(sink) ──► cleanup closure
//!                    │
//!   any task/thread: sink.emit(v) ──► [buffer 64] ──► producer ──► consumer
//!                    │
//!   sink.close() / consumer stops ──► cleanup() exactly once
//! ```
//!
//! Unlike [`Emitter`](crate::Emitter), a [`CallbackSink`] may be used from any
//! execution context: values travel through a channel owned by the collection.

use std::sync::{Arc, Mutex, PoisonError};

use crate::channel::{Capacity, Channel, Overflow, TrySendError};
use crate::error::FlowError;
use crate::flow::Flow;

const CALLBACK_BUFFER: usize = 64;

/// Thread-safe sink handed to a callback registration.
pub struct CallbackSink<T> {
    channel: Channel<T>,
    failure: Arc<Mutex<Option<FlowError>>>,
}

impl<T> Clone for CallbackSink<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            failure: Arc::clone(&self.failure),
        }
    }
}

impl<T> CallbackSink<T> {
    /// Sends a value, suspending while the buffer is full.
    pub async fn emit(&self, value: T) -> Result<(), FlowError> {
        self.channel
            .send(value)
            .await
            .map_err(|_| FlowError::Detached)
    }

    /// Non-suspending variant for synchronous callbacks. `false` if the
    /// buffer is full or the collection ended.
    pub fn try_emit(&self, value: T) -> bool {
        match self.channel.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("callback flow buffer full; value dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Completes the flow once buffered values are delivered.
    pub fn close(&self) {
        self.channel.close();
    }

    /// Fails the flow with `err` once buffered values are delivered.
    pub fn close_with_error(&self, err: FlowError) {
        {
            let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
            slot.get_or_insert(err);
        }
        self.channel.close();
    }

    /// True once the flow was closed or the consumer went away.
    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

/// Runs the registration's cleanup exactly once and detaches the sink.
struct Registration<T, C: FnOnce()> {
    cleanup: Option<C>,
    channel: Channel<T>,
}

impl<T, C: FnOnce()> Drop for Registration<T, C> {
    fn drop(&mut self) {
        self.channel.close();
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl<T: Send + 'static> Flow<T> {
    /// Builds a flow from a callback-style source.
    ///
    /// `register` is called once per collection with a fresh sink and returns
    /// the cleanup that unregisters the callback. The cleanup runs exactly
    /// once: when the source closes the sink, fails, or the consumer stops
    /// early (cancellation, `take`, a failing consumer).
    ///
    /// ```rust
    /// use scopekit::Flow;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let ticks = Flow::from_callback(|sink| {
    ///     let worker = tokio::spawn(async move {
    ///         for i in 0.. {
    ///             if sink.emit(i).await.is_err() {
    ///                 break;
    ///             }
    ///         }
    ///     });
    ///     move || worker.abort()
    /// });
    /// assert_eq!(ticks.take(3).to_vec().await, Ok(vec![0, 1, 2]));
    /// # }
    /// ```
    pub fn from_callback<R, C>(register: R) -> Self
    where
        R: Fn(CallbackSink<T>) -> C + Send + Sync + 'static,
        C: FnOnce() + Send + 'static,
    {
        let register = Arc::new(register);
        Flow::new(move |em| {
            let register = Arc::clone(&register);
            async move {
                let channel = Channel::new(Capacity::Buffered(CALLBACK_BUFFER), Overflow::Suspend);
                let failure = Arc::new(Mutex::new(None));
                let sink = CallbackSink {
                    channel: channel.clone(),
                    failure: Arc::clone(&failure),
                };
                let _registration = Registration {
                    cleanup: Some((*register)(sink)),
                    channel: channel.clone(),
                };

                while let Ok(v) = channel.recv().await {
                    em.emit(v).await?;
                }
                let failed = failure.lock().unwrap_or_else(PoisonError::into_inner).take();
                match failed {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        })
    }
}
