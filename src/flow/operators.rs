//! Intermediate flow operators. Each returns a new cold [`Flow`] whose
//! producer collects the upstream flow; nothing runs until the result is
//! collected.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::channel::{Capacity, Channel, Overflow};
use crate::error::FlowError;
use crate::flow::Flow;

enum Tick<T> {
    Value(Option<T>),
    Quiet,
}

impl<T: Send + 'static> Flow<T> {
    /// Transforms every value.
    pub fn map<U, F>(&self, f: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::new(move |em| {
            let upstream = upstream.clone();
            let f = Arc::clone(&f);
            async move {
                let (em, f) = (&em, &*f);
                upstream
                    .collect(move |v| async move { em.emit(f(v)).await })
                    .await
            }
        })
    }

    /// Keeps values matching `pred`.
    pub fn filter<F>(&self, pred: F) -> Flow<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let pred = Arc::new(pred);
        Flow::new(move |em| {
            let upstream = upstream.clone();
            let pred = Arc::clone(&pred);
            async move {
                let (em, pred) = (&em, &*pred);
                upstream
                    .collect(move |v| async move {
                        if pred(&v) {
                            em.emit(v).await
                        } else {
                            Ok(())
                        }
                    })
                    .await
            }
        })
    }

    /// Runs `f` on every value before passing it on.
    pub fn on_each<F>(&self, f: F) -> Flow<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::new(move |em| {
            let upstream = upstream.clone();
            let f = Arc::clone(&f);
            async move {
                let (em, f) = (&em, &*f);
                upstream
                    .collect(move |v| async move {
                        f(&v);
                        em.emit(v).await
                    })
                    .await
            }
        })
    }

    /// Runs `f` when a collection starts, before the upstream producer.
    pub fn on_start<F>(&self, f: F) -> Flow<T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::new(move |em| {
            let upstream = upstream.clone();
            let f = Arc::clone(&f);
            async move {
                (*f)();
                let em = &em;
                upstream.collect(move |v| em.emit(v)).await
            }
        })
    }

    /// Runs `f` once the collection ends: `None` on success, the error on
    /// failure, and `Some(FlowError::Cancelled)` if the collection is dropped
    /// midway.
    pub fn on_completion<F>(&self, f: F) -> Flow<T>
    where
        F: Fn(Option<&FlowError>) + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::new(move |em| {
            let upstream = upstream.clone();
            let guard = CompletionGuard {
                f: Some(Arc::clone(&f)),
            };
            async move {
                let mut guard = guard;
                let res = {
                    let em = &em;
                    upstream.collect(move |v| em.emit(v)).await
                };
                if let Some(f) = guard.f.take() {
                    (*f)(res.as_ref().err());
                }
                res
            }
        })
    }

    /// Intercepts failures raised upstream of this operator.
    ///
    /// Cancellation and failures of downstream consumers pass through
    /// untouched. `handler` may return a replacement value to emit before the
    /// flow completes normally.
    pub fn catch<F>(&self, handler: F) -> Flow<T>
    where
        F: Fn(&FlowError) -> Option<T> + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let handler = Arc::new(handler);
        Flow::new(move |em| {
            let upstream = upstream.clone();
            let handler = Arc::clone(&handler);
            async move {
                let downstream_failed = AtomicBool::new(false);
                let res = {
                    let (em, failed) = (&em, &downstream_failed);
                    upstream
                        .collect(move |v| async move {
                            em.emit(v).await.map_err(|e| {
                                failed.store(true, Ordering::Relaxed);
                                e
                            })
                        })
                        .await
                };
                match res {
                    Err(e) if !e.is_cancellation() && !downstream_failed.load(Ordering::Relaxed) => {
                        tracing::debug!(error = %e, "flow failure caught");
                        match (*handler)(&e) {
                            Some(replacement) => em.emit(replacement).await,
                            None => Ok(()),
                        }
                    }
                    other => other,
                }
            }
        })
    }

    /// Stops after `n` values, cancelling the upstream producer.
    pub fn take(&self, n: usize) -> Flow<T> {
        let upstream = self.clone();
        Flow::new(move |em| {
            let upstream = upstream.clone();
            async move {
                if n == 0 {
                    return Ok(());
                }
                let em = &em;
                let mut seen = 0usize;
                upstream
                    .drive(move |v| {
                        seen += 1;
                        let last = seen >= n;
                        async move {
                            em.emit(v).await?;
                            Ok(if last {
                                ControlFlow::Break(())
                            } else {
                                ControlFlow::Continue(())
                            })
                        }
                    })
                    .await
            }
        })
    }

    /// Emits a value only after `window` passed without a newer one. The
    /// pending value is flushed when the upstream completes.
    pub fn debounce(&self, window: Duration) -> Flow<T> {
        let upstream = self.clone();
        Flow::new(move |em| {
            let upstream = upstream.clone();
            async move {
                let (tx, mut rx) = mpsc::unbounded_channel::<T>();
                let feed = async move {
                    let tx = &tx;
                    upstream
                        .collect(move |v| {
                            let _ = tx.send(v);
                            async { Ok(()) }
                        })
                        .await
                };
                let drain = async {
                    let mut pending: Option<T> = None;
                    let quiet = tokio::time::sleep(window);
                    tokio::pin!(quiet);
                    loop {
                        let tick = tokio::select! {
                            biased;
                            v = rx.recv() => Tick::Value(v),
                            _ = &mut quiet, if pending.is_some() => Tick::Quiet,
                        };
                        match tick {
                            Tick::Value(Some(v)) => {
                                pending = Some(v);
                                quiet.as_mut().reset(Instant::now() + window);
                            }
                            Tick::Value(None) => {
                                if let Some(v) = pending.take() {
                                    em.emit(v).await?;
                                }
                                return Ok::<(), FlowError>(());
                            }
                            Tick::Quiet => {
                                if let Some(v) = pending.take() {
                                    em.emit(v).await?;
                                }
                            }
                        }
                    }
                };
                tokio::try_join!(feed, drain).map(|_| ())
            }
        })
    }

    /// Decouples producer and consumer with a buffer of `capacity` values, so
    /// the producer runs ahead of a slow consumer.
    pub fn buffer(&self, capacity: usize) -> Flow<T> {
        let upstream = self.clone();
        Flow::new(move |em| {
            let upstream = upstream.clone();
            async move {
                let queue = Channel::new(Capacity::Buffered(capacity), Overflow::Suspend);
                let feed = async {
                    let q = &queue;
                    let res = upstream
                        .collect(move |v| async move {
                            q.send(v).await.map_err(|_| FlowError::Detached)
                        })
                        .await;
                    q.close();
                    res
                };
                let drain = async {
                    while let Ok(v) = queue.recv().await {
                        em.emit(v).await?;
                    }
                    Ok::<(), FlowError>(())
                };
                tokio::try_join!(feed, drain).map(|_| ())
            }
        })
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Flow<T> {
    /// Drops values equal to the previously emitted one.
    pub fn distinct_until_changed(&self) -> Flow<T> {
        let upstream = self.clone();
        Flow::new(move |em| {
            let upstream = upstream.clone();
            async move {
                let em = &em;
                let mut last: Option<T> = None;
                upstream
                    .collect(move |v| {
                        let fresh = last.as_ref() != Some(&v);
                        if fresh {
                            last = Some(v.clone());
                        }
                        async move {
                            if fresh {
                                em.emit(v).await
                            } else {
                                Ok(())
                            }
                        }
                    })
                    .await
            }
        })
    }
}

struct CompletionGuard<F: Fn(Option<&FlowError>)> {
    f: Option<Arc<F>>,
}

impl<F: Fn(Option<&FlowError>)> Drop for CompletionGuard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            (*f)(Some(&FlowError::Cancelled));
        }
    }
}
