//! # Example: concurrency
//!
//! Serial vs concurrent composition, a lost-update race next to its mutex
//! guarded twin, and single-flight sharing of an in-flight result.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► serial_vs_concurrent  await one by one (~600ms) vs spawn all then await_all (~300ms)
//!   ├─► race                  N tasks × K increments, unguarded vs guarded
//!   └─► single_flight         5 callers, 1 load
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example concurrency [scenario]
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use scopekit::{
    await_all, run_isolating, run_propagating, RaceCounter, SingleFlight, TaskContext, TaskError,
};
use tracing_subscriber::EnvFilter;

const TASKS: u64 = 8;
const ROUNDS: u64 = 100;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let only = std::env::args().nth(1);
    let wants = |name: &str| only.as_deref().map_or(true, |o| o == name);

    if wants("serial_vs_concurrent") {
        serial_vs_concurrent().await?;
    }
    if wants("race") {
        race().await?;
    }
    if wants("single_flight") {
        single_flight().await?;
    }
    Ok(())
}

async fn fetch(ctx: TaskContext, ms: u64) -> Result<u64, TaskError> {
    ctx.delay(Duration::from_millis(ms)).await?;
    Ok(ms)
}

async fn serial_vs_concurrent() -> anyhow::Result<()> {
    println!("=== serial_vs_concurrent ===");
    let delays = [100u64, 200, 300];

    let started = Instant::now();
    let serial = run_propagating(|scope| async move {
        let mut out = Vec::new();
        for ms in delays {
            let d = scope.spawn_with_result(format!("serial-{ms}"), move |ctx| fetch(ctx, ms))?;
            out.push(d.await_value().await?);
        }
        Ok::<_, TaskError>(out)
    })
    .await?;
    println!("[serial] {serial:?} in {:?}", started.elapsed());

    let started = Instant::now();
    let concurrent = run_propagating(|scope| async move {
        let mut pending = Vec::new();
        for ms in delays {
            pending.push(scope.spawn_with_result(format!("concurrent-{ms}"), move |ctx| fetch(ctx, ms))?);
        }
        await_all(pending).await
    })
    .await?;
    println!("[concurrent] {concurrent:?} in {:?}\n", started.elapsed());
    Ok(())
}

async fn race() -> anyhow::Result<()> {
    println!("=== race ===");
    for guarded in [false, true] {
        let counter = Arc::new(RaceCounter::new());
        run_isolating(|scope| {
            let counter = counter.clone();
            async move {
                for i in 0..TASKS {
                    let c = counter.clone();
                    scope.spawn(format!("incrementer-{i}"), move |_| async move {
                        for _ in 0..ROUNDS {
                            if guarded {
                                c.guarded_increment().await;
                            } else {
                                c.unguarded_increment().await;
                            }
                        }
                        Ok(())
                    })?;
                }
                Ok::<_, TaskError>(())
            }
        })
        .await?;
        let label = if guarded { "guarded" } else { "unguarded" };
        println!(
            "[{label}] expected {}, counted {}",
            TASKS * ROUNDS,
            counter.get()
        );
    }
    println!();
    Ok(())
}

async fn single_flight() -> anyhow::Result<()> {
    println!("=== single_flight ===");
    let loads = Arc::new(AtomicUsize::new(0));
    let flight = SingleFlight::new("settings");

    let results = run_isolating(|scope| {
        let loads = loads.clone();
        let flight = &flight;
        async move {
            let callers = (0..5).map(|caller| {
                let loads = loads.clone();
                let scope = scope.clone();
                async move {
                    let v = flight
                        .run(&scope, move |ctx| async move {
                            loads.fetch_add(1, Ordering::SeqCst);
                            ctx.delay(Duration::from_millis(200)).await?;
                            Ok(String::from("theme=dark"))
                        })
                        .await;
                    println!("[caller {caller}] got {v:?}");
                    v
                }
            });
            join_all(callers).await.into_iter().collect::<Result<Vec<_>, _>>()
        }
    })
    .await?;
    println!(
        "[main] {} callers, {} load(s)\n",
        results.len(),
        loads.load(Ordering::SeqCst)
    );
    Ok(())
}
