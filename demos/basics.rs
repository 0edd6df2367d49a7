//! # Example: basics
//!
//! Tasks in a scope: fire-and-forget vs value-producing, completion
//! observers, cooperative cancellation and running work on another pool.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► launch_vs_deferred   spawn (Job) vs spawn_with_result (Deferred<T>)
//!   ├─► observers            on_completion before and after the task ends
//!   ├─► cancellation         cancel a ticking task, observe TaskCancelled
//!   └─► context_switch       with_context(&pool) hops to "scopekit-worker"
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=scopekit=debug cargo run --example basics [scenario]
//! ```

use std::time::Duration;

use scopekit::{run_isolating, run_propagating, with_context, Config, Outcome, TaskError};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let only = std::env::args().nth(1);
    let wants = |name: &str| only.as_deref().map_or(true, |o| o == name);

    if wants("launch_vs_deferred") {
        launch_vs_deferred().await?;
    }
    if wants("observers") {
        observers().await?;
    }
    if wants("cancellation") {
        cancellation().await?;
    }
    if wants("context_switch") {
        context_switch().await?;
    }
    Ok(())
}

async fn launch_vs_deferred() -> anyhow::Result<()> {
    println!("=== launch_vs_deferred ===");
    let answer = run_propagating(|scope| async move {
        let job = scope.spawn("printer", |ctx| async move {
            ctx.delay(Duration::from_millis(50)).await?;
            println!("[printer] done, nothing to return");
            Ok(())
        })?;
        let deferred = scope.spawn_with_result("answer", |ctx| async move {
            ctx.delay(Duration::from_millis(100)).await?;
            Ok(42)
        })?;

        println!("[main] job state right after spawn: {}", job.state().as_label());
        let value = deferred.await_value().await?;
        println!("[main] job state after awaiting the deferred: {}", job.state().as_label());
        Ok::<_, TaskError>(value)
    })
    .await?;
    println!("[main] deferred produced {answer}\n");
    Ok(())
}

async fn observers() -> anyhow::Result<()> {
    println!("=== observers ===");
    run_isolating(|scope| async move {
        let ok = scope.spawn_with_result("compute", |ctx| async move {
            ctx.delay(Duration::from_millis(30)).await?;
            Ok("value")
        })?;
        ok.on_completion(|outcome| match outcome {
            Outcome::Completed(v) => println!("[observer] compute completed with {v:?}"),
            other => println!("[observer] compute ended as {}", other.state().as_label()),
        });

        let bad = scope.spawn("explode", |_| async { Err(TaskError::fail("kaboom")) })?;
        bad.join().await;
        // already terminal: the observer fires right here
        bad.on_completion(|outcome| {
            println!("[observer] late registration sees {:?}", outcome.error());
        });
        Ok::<_, TaskError>(())
    })
    .await?;
    println!();
    Ok(())
}

async fn cancellation() -> anyhow::Result<()> {
    println!("=== cancellation ===");
    run_isolating(|scope| async move {
        let ticker = scope.spawn("ticker", |ctx| async move {
            let mut n = 0u32;
            loop {
                ctx.delay(Duration::from_millis(100)).await?;
                n += 1;
                println!("[ticker] tick #{n}");
            }
        })?;
        tokio::time::sleep(Duration::from_millis(350)).await;
        let state = ticker.cancel_and_join().await;
        println!("[main] ticker ended as {}", state.as_label());
        Ok::<_, TaskError>(())
    })
    .await?;
    println!();
    Ok(())
}

async fn context_switch() -> anyhow::Result<()> {
    println!("=== context_switch ===");
    let pool = Config {
        worker_threads: 2,
        ..Config::default()
    }
    .build_pool()?;

    let here = std::thread::current().name().map(str::to_owned);
    let there = with_context(pool.handle(), async {
        std::thread::current().name().map(str::to_owned)
    })
    .await?;
    println!("[main] caller thread {here:?}, work ran on {there:?}\n");

    // a runtime must not be dropped from async context
    pool.shutdown_background();
    Ok(())
}
