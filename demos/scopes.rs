//! # Example: scopes
//!
//! Failure propagation through a kernel-owned scope tree.
//!
//! Shows how to:
//! - Let one failing child cancel its siblings ([`ScopeMode::Propagating`])
//! - Keep siblings running next to a failure ([`ScopeMode::Isolating`])
//! - Cancel an externally held scope from outside the block that filled it
//! - See that an isolating child scope does not survive cancellation of its parent
//! - Shut the kernel down within the grace period
//!
//! ## Flow
//! ```text
//! Kernel (root: ISOLATING, LogWriter subscribed)
//!   ├─► propagating   slow-a, slow-b, failing ─► ChildFailed, siblings cancelled
//!   ├─► isolating     slow-a, slow-b, failing ─► Ok, siblings completed
//!   ├─► external      kernel.scope("pollers") ─► scope.cancel() from main
//!   ├─► caveat        parent(PROPAGATING) ─► child(ISOLATING) ─► parent.cancel()
//!   └─► shutdown      ShutdownRequested ─► AllStoppedWithin
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example scopes [scenario]
//! ```

use std::sync::Arc;
use std::time::Duration;

use scopekit::{Config, Job, Kernel, Scope, ScopeMode, Subscribe, TaskError};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut cfg = Config::default();
    cfg.grace = Duration::from_secs(2);
    cfg.bus_capacity = 256;

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(scopekit::LogWriter::new())];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();

    let kernel = Kernel::builder(cfg).with_subscribers(subs).build();

    let only = std::env::args().nth(1);
    let wants = |name: &str| only.as_deref().map_or(true, |o| o == name);

    if wants("propagating") {
        propagating(&kernel).await;
    }
    if wants("isolating") {
        isolating(&kernel).await;
    }
    if wants("external") {
        external(&kernel).await?;
    }
    if wants("caveat") {
        caveat(&kernel).await?;
    }

    println!("=== shutdown ===");
    kernel.shutdown().await?;
    println!("[main] kernel stopped");
    Ok(())
}

fn three_children(scope: &Scope) -> Result<Vec<Job>, TaskError> {
    Ok(vec![
        scope.spawn("slow-a", |ctx| async move {
            ctx.delay(Duration::from_millis(300)).await
        })?,
        scope.spawn("slow-b", |ctx| async move {
            ctx.delay(Duration::from_millis(600)).await
        })?,
        scope.spawn("failing", |ctx| async move {
            ctx.delay(Duration::from_millis(100)).await?;
            Err(TaskError::fail("boom"))
        })?,
    ])
}

fn report(jobs: &[Job]) {
    for job in jobs {
        println!("  {:<8} {}", job.name(), job.state().as_label());
    }
}

async fn propagating(kernel: &Kernel) {
    println!("=== propagating ===");
    let mut jobs = Vec::new();
    let res = kernel
        .run_propagating(|scope| {
            let jobs = &mut jobs;
            async move {
                jobs.extend(three_children(&scope)?);
                Ok(())
            }
        })
        .await;
    println!("[main] run returned {res:?}");
    report(&jobs);
    println!();
}

async fn isolating(kernel: &Kernel) {
    println!("=== isolating ===");
    let mut jobs = Vec::new();
    let res = kernel
        .run_isolating(|scope| {
            let jobs = &mut jobs;
            async move {
                jobs.extend(three_children(&scope)?);
                Ok(())
            }
        })
        .await;
    println!("[main] run returned {res:?}");
    report(&jobs);
    println!();
}

async fn external(kernel: &Kernel) -> anyhow::Result<()> {
    println!("=== external ===");
    let pollers = kernel.scope("pollers", ScopeMode::Propagating);
    for i in 0..3u64 {
        pollers.spawn(format!("poller-{i}"), move |ctx| async move {
            loop {
                ctx.delay(Duration::from_millis(100 + 50 * i)).await?;
                println!("[poller-{i}] poll");
            }
        })?;
    }
    tokio::time::sleep(Duration::from_millis(320)).await;
    println!("[main] alive: {:?}", kernel.alive_tasks().await);
    pollers.cancel();
    pollers.join_children().await;
    println!("[main] after cancel, active tasks = {}", pollers.active_tasks());

    let late = pollers.spawn("late", |_| async { Ok(()) });
    println!("[main] spawning into the cancelled scope: {late:?}\n");
    Ok(())
}

async fn caveat(kernel: &Kernel) -> anyhow::Result<()> {
    println!("=== caveat ===");
    let parent = kernel.scope("parent", ScopeMode::Propagating);
    let guarded = parent.child(format!("{}/guarded", parent.name()), ScopeMode::Isolating);

    let flaky = guarded.spawn("flaky", |_| async { Err(TaskError::fail("ignored")) })?;
    let steady = guarded.spawn("steady", |ctx| async move {
        ctx.delay(Duration::from_secs(5)).await
    })?;
    flaky.join().await;
    println!(
        "[main] isolating child absorbed the failure, steady is {}",
        steady.state().as_label()
    );

    // isolation protects siblings from each other, not from the parent
    parent.cancel();
    steady.join().await;
    println!(
        "[main] after parent.cancel(): steady is {}, guarded cancelled = {}\n",
        steady.state().as_label(),
        guarded.is_cancelled()
    );
    Ok(())
}
