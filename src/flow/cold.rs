//! # Cold flows.
//!
//! A [`Flow`] is a reusable *definition* of a producer. Nothing runs until
//! [`Flow::collect`] is called, and every collection runs the producer
//! afresh.
//!
//! ```text
//! collect(consumer)
//!   ├─ new Emitter (context id c)            producer and consumer are polled
//!   ├─ poll producer under context c   ◄──►  by the collecting task: no extra
//!   └─ for each emission: consumer(v), ack   task, no buffering
//! ```
//!
//! `emit` returns only after the consumer processed the value, so a slow
//! consumer naturally slows the producer down.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{FlowError, ScopeError, TaskError};
use crate::flow::emitter::{in_context, Emission, Emitter};
use crate::scope::Scope;
use crate::tasks::Job;

type Producer<T> = dyn Fn(Emitter<T>) -> BoxFuture<'static, Result<(), FlowError>> + Send + Sync;

/// Cold, re-runnable stream of values.
pub struct Flow<T> {
    producer: Arc<Producer<T>>,
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

enum Step<T> {
    Emission(Option<Emission<T>>),
    Finished(Result<(), FlowError>),
}

impl<T: Send + 'static> Flow<T> {
    /// Defines a flow from a producer closure.
    ///
    /// ```rust
    /// use scopekit::Flow;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let numbers = Flow::new(|em| async move {
    ///     for i in 1..=3 {
    ///         em.emit(i).await?;
    ///     }
    ///     Ok(())
    /// });
    /// assert_eq!(numbers.to_vec().await, Ok(vec![1, 2, 3]));
    /// assert_eq!(numbers.to_vec().await, Ok(vec![1, 2, 3]));
    /// # }
    /// ```
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: Fn(Emitter<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        Self {
            producer: Arc::new(move |em| producer(em).boxed()),
        }
    }

    /// Emits every item of `items`, once per collection.
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
        I::IntoIter: Send,
    {
        Self::new(move |em| {
            let items = items.clone();
            async move {
                for v in items {
                    em.emit(v).await?;
                }
                Ok(())
            }
        })
    }

    /// A flow that completes without emitting.
    pub fn empty() -> Self {
        Self::new(|_| async { Ok(()) })
    }

    /// Runs the producer and feeds every value to `consumer`.
    ///
    /// Fails with the first producer or consumer failure.
    pub async fn collect<F, Fut>(&self, mut consumer: F) -> Result<(), FlowError>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), FlowError>>,
    {
        self.drive(move |v| {
            let fut = consumer(v);
            async move { fut.await.map(ControlFlow::Continue) }
        })
        .await
    }

    /// Like [`collect`](Self::collect) with a synchronous consumer.
    pub async fn for_each<F>(&self, mut f: F) -> Result<(), FlowError>
    where
        F: FnMut(T),
    {
        self.collect(move |v| {
            f(v);
            async { Ok(()) }
        })
        .await
    }

    /// Core collection loop. A consumer returning `Break` stops the flow: the
    /// producer future is dropped, which cancels it at its pending `emit`.
    pub(crate) async fn drive<F, Fut>(&self, mut consumer: F) -> Result<(), FlowError>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<ControlFlow<()>, FlowError>>,
    {
        let (emitter, mut rx) = Emitter::pair();
        let producer = in_context(emitter.context(), (self.producer)(emitter));
        tokio::pin!(producer);

        loop {
            let step = tokio::select! {
                biased;
                emission = rx.recv() => Step::Emission(emission),
                res = &mut producer => Step::Finished(res),
            };
            match step {
                Step::Emission(Some(Emission { value, ack })) => match consumer(value).await? {
                    ControlFlow::Continue(()) => {
                        let _ = ack.send(());
                    }
                    ControlFlow::Break(()) => return Ok(()),
                },
                // The producer gave up its emitter but keeps running.
                Step::Emission(None) => return producer.as_mut().await,
                Step::Finished(res) => return res,
            }
        }
    }

    /// Collects every value into a `Vec`.
    pub async fn to_vec(&self) -> Result<Vec<T>, FlowError> {
        let mut out = Vec::new();
        self.for_each(|v| out.push(v)).await?;
        Ok(out)
    }

    /// Accumulates values starting from `init`.
    pub async fn fold<A, F>(&self, init: A, mut f: F) -> Result<A, FlowError>
    where
        F: FnMut(A, T) -> A,
    {
        let mut acc = Some(init);
        self.for_each(|v| {
            acc = acc.take().map(|a| f(a, v));
        })
        .await?;
        // `acc` is only vacant while `f` runs
        acc.ok_or(FlowError::Empty)
    }

    /// Combines values pairwise; fails with [`FlowError::Empty`] on an empty flow.
    pub async fn reduce<F>(&self, mut f: F) -> Result<T, FlowError>
    where
        F: FnMut(T, T) -> T,
    {
        let mut acc: Option<T> = None;
        self.for_each(|v| {
            acc = Some(match acc.take() {
                None => v,
                Some(a) => f(a, v),
            });
        })
        .await?;
        acc.ok_or(FlowError::Empty)
    }

    /// Collects this flow in a new task of `scope`, discarding values.
    pub fn launch_in(&self, scope: &Scope, name: impl Into<Arc<str>>) -> Result<Job, ScopeError> {
        let flow = self.clone();
        scope.spawn(name, move |_| async move {
            flow.for_each(drop).await.map_err(TaskError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn every_collection_reruns_the_producer() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        let flow = Flow::new(move |em| {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                em.emit(1).await?;
                em.emit(2).await
            }
        });
        assert_eq!(flow.to_vec().await, Ok(vec![1, 2]));
        assert_eq!(flow.to_vec().await, Ok(vec![1, 2]));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn nothing_runs_before_collect() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        let _flow: Flow<u8> = Flow::new(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn producer_waits_for_consumer() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let p = log.clone();
        let flow = Flow::new(move |em| {
            let p = p.clone();
            async move {
                for i in 0..2 {
                    p.lock().unwrap().push(format!("emit {i}"));
                    em.emit(i).await?;
                }
                Ok(())
            }
        });
        let c = log.clone();
        flow.for_each(|v| c.lock().unwrap().push(format!("got {v}")))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["emit 0", "got 0", "emit 1", "got 1"]
        );
    }

    #[tokio::test]
    async fn consumer_failure_stops_producer() {
        let flow = Flow::from_iter(0..10);
        let res = flow
            .collect(|v| async move {
                if v == 3 {
                    Err(FlowError::failed("stop"))
                } else {
                    Ok(())
                }
            })
            .await;
        assert_eq!(res, Err(FlowError::failed("stop")));
    }

    #[tokio::test]
    async fn reduce_and_fold() {
        let flow = Flow::from_iter(vec![1, 2, 3, 4]);
        assert_eq!(flow.reduce(|a, b| a + b).await, Ok(10));
        assert_eq!(flow.fold(String::new(), |s, v| s + &v.to_string()).await, Ok("1234".into()));
        assert_eq!(Flow::<i32>::empty().reduce(|a, b| a + b).await, Err(FlowError::Empty));
    }

    #[tokio::test]
    async fn foreign_emission_is_rejected() {
        let flow: Flow<u32> = Flow::new(|em| async move {
            let stray = tokio::spawn(async move { em.emit(1).await });
            match stray.await {
                Ok(res) => res,
                Err(_) => Err(FlowError::failed("join")),
            }
        });
        assert_eq!(flow.to_vec().await, Err(FlowError::ForeignEmission));
    }
}
