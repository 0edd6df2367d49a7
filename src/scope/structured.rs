//! # Structured runs: a body plus everything it spawned.
//!
//! ```text
//! enter(body)
//!   ├─ select { scope cancelled, body(scope) }
//!   ├─ body error ──► cancel children
//!   ├─ close tracker, wait for every child (and nested descendants)
//!   ├─ publish ScopeClosed
//!   └─ result: ChildFailed > body Failed > Cancelled > Ok(value)
//! ```
//!
//! The body itself runs in the caller's task; only spawned children run
//! concurrently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ScopeError, TaskError};
use crate::events::{Event, EventKind};
use crate::scope::{Scope, ScopeMode};

enum BodyResult<R> {
    Done(Result<R, TaskError>),
    Cancelled,
}

impl Scope {
    /// Runs `body` in this scope and waits for all of its children.
    pub(crate) async fn enter<R, F, Fut>(self, body: F) -> Result<R, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        let token = self.inner.token.clone();
        let res = tokio::select! {
            biased;
            _ = token.cancelled() => BodyResult::Cancelled,
            r = body(self.clone()) => BodyResult::Done(r),
        };
        if let BodyResult::Done(Err(e)) = &res {
            self.cancel_with(&format!("body failed: {}", e.as_label()));
        }

        self.close_and_wait().await;
        self.publish(Event::new(EventKind::ScopeClosed));

        if let Some(failure) = self.take_failure() {
            return Err(failure);
        }
        match res {
            BodyResult::Done(Ok(v)) => Ok(v),
            BodyResult::Done(Err(TaskError::Canceled)) | BodyResult::Cancelled => {
                Err(ScopeError::Cancelled)
            }
            BodyResult::Done(Err(error)) => Err(ScopeError::Failed { error }),
        }
    }

    /// Runs `body` in a nested propagating scope: the first failing child
    /// cancels its siblings and is re-raised once all children finished.
    pub async fn run_propagating<R, F, Fut>(&self, body: F) -> Result<R, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        self.child(self.child_name("propagating"), ScopeMode::Propagating)
            .enter(body)
            .await
    }

    /// Runs `body` in a nested isolating scope: child failures stay with the
    /// children and never fail this call.
    pub async fn run_isolating<R, F, Fut>(&self, body: F) -> Result<R, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        self.child(self.child_name("isolating"), ScopeMode::Isolating)
            .enter(body)
            .await
    }

    /// Runs `body` in a bounded propagating sub-scope that is cancelled once
    /// `timeout` elapses.
    ///
    /// Returns [`ScopeError::TimedOut`] (and publishes `TimeoutHit`) when the
    /// bound cut the run short.
    pub async fn with_timeout<R, F, Fut>(&self, timeout: Duration, body: F) -> Result<R, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        let bounded = self.child(self.child_name("timeout"), ScopeMode::Propagating);
        let run = bounded.clone().enter(body);
        tokio::pin!(run);
        let sleep = tokio::time::sleep(timeout);
        tokio::pin!(sleep);

        let mut timed_out = false;
        let res = loop {
            tokio::select! {
                r = &mut run => break r,
                _ = &mut sleep, if !timed_out => {
                    timed_out = true;
                    bounded.publish(Event::new(EventKind::TimeoutHit).with_timeout(timeout));
                    bounded.cancel_with("timeout");
                }
            }
        };

        // the bound covers children too: a body that returned in time still
        // times out if its children did not
        match res {
            Ok(_) | Err(ScopeError::Cancelled) if timed_out => Err(ScopeError::TimedOut { timeout }),
            other => other,
        }
    }

    fn child_name(&self, kind: &str) -> Arc<str> {
        Arc::from(format!("{}/{kind}", self.inner.name))
    }
}

/// Runs `body` in a fresh root propagating scope.
///
/// ```rust
/// use scopekit::{run_propagating, ScopeError, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let res: Result<(), ScopeError> = run_propagating(|scope| async move {
///     scope.spawn("ok", |_| async { Ok(()) })?;
///     scope.spawn("bad", |_| async { Err(TaskError::fail("boom")) })?;
///     Ok(())
/// })
/// .await;
/// assert!(matches!(res, Err(ScopeError::ChildFailed { .. })));
/// # }
/// ```
pub async fn run_propagating<R, F, Fut>(body: F) -> Result<R, ScopeError>
where
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = Result<R, TaskError>>,
{
    Scope::builder()
        .name("propagating")
        .mode(ScopeMode::Propagating)
        .build()
        .enter(body)
        .await
}

/// Runs `body` in a fresh root isolating scope.
pub async fn run_isolating<R, F, Fut>(body: F) -> Result<R, ScopeError>
where
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = Result<R, TaskError>>,
{
    Scope::builder()
        .name("isolating")
        .mode(ScopeMode::Isolating)
        .build()
        .enter(body)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn body_value_is_returned_after_children() {
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        let v = run_isolating(|scope| async move {
            for i in 0..3u64 {
                let d = d.clone();
                scope.spawn(format!("w{i}"), move |ctx| async move {
                    ctx.delay(Duration::from_millis(10 * (i + 1))).await?;
                    d.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })?;
            }
            Ok(42)
        })
        .await;
        assert_eq!(v, Ok(42));
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn body_error_cancels_children() {
        let mut seen = None;
        let res: Result<(), _> = run_isolating(|scope| {
            let seen = &mut seen;
            async move {
                let job = scope.spawn("long", |ctx| async move {
                    ctx.delay(Duration::from_secs(60)).await
                })?;
                *seen = Some(job);
                Err(TaskError::fail("body"))
            }
        })
        .await;
        assert_eq!(
            res,
            Err(ScopeError::Failed {
                error: TaskError::fail("body")
            })
        );
        assert_eq!(seen.unwrap().state(), TaskState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_and_reports() {
        let scope = Scope::new(ScopeMode::Isolating);
        let mut rx = scope.bus().subscribe();
        let res: Result<(), _> = scope
            .with_timeout(Duration::from_millis(100), |s| async move {
                s.spawn("slow", |ctx| async move { ctx.delay(Duration::from_secs(5)).await })?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(
            res,
            Err(ScopeError::TimedOut {
                timeout: Duration::from_millis(100)
            })
        );
        let mut hit = false;
        while let Ok(ev) = rx.try_recv() {
            hit |= ev.kind == EventKind::TimeoutHit && ev.timeout_ms == Some(100);
        }
        assert!(hit);
        assert!(!scope.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn finishing_in_time_returns_value() {
        let scope = Scope::new(ScopeMode::Isolating);
        let v = scope
            .with_timeout(Duration::from_secs(1), |_| async { Ok("fast") })
            .await;
        assert_eq!(v, Ok("fast"));
    }
}
