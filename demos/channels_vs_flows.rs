//! # Example: channels_vs_flows
//!
//! The same three "expensive" values produced eagerly into a list, hot into a
//! channel, and lazily by a cold flow.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► list        all work done before the first value is used
//!   ├─► channel     work starts at produce(), runs once, a second reader gets nothing
//!   ├─► flow        nothing runs until collect(), every collect() re-runs the work
//!   └─► dangerous   a produced channel nobody reads keeps its scope open
//!                   until a timeout cancels it
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example channels_vs_flows [scenario]
//! ```

use std::time::{Duration, Instant};

use scopekit::{produce, run_propagating, Capacity, Flow, Scope, ScopeMode, TaskError};
use tracing_subscriber::EnvFilter;

const STEP: Duration = Duration::from_millis(100);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let only = std::env::args().nth(1);
    let wants = |name: &str| only.as_deref().map_or(true, |o| o == name);

    if wants("list") {
        list().await;
    }
    if wants("channel") {
        channel().await?;
    }
    if wants("flow") {
        flow().await?;
    }
    if wants("dangerous") {
        dangerous().await;
    }
    Ok(())
}

async fn expensive(i: u32, started: Instant) -> u32 {
    tokio::time::sleep(STEP).await;
    println!("  [work] produced {i} at {:?}", started.elapsed());
    i
}

async fn list() {
    println!("=== list ===");
    let started = Instant::now();
    let mut values = Vec::new();
    for i in 1..=3 {
        values.push(expensive(i, started).await);
    }
    for v in &values {
        println!("[consumer] {v} at {:?}", started.elapsed());
    }
    println!();
}

async fn channel() -> anyhow::Result<()> {
    println!("=== channel ===");
    let started = Instant::now();
    run_propagating(|scope| async move {
        let ch = produce(&scope, "values", Capacity::Rendezvous, move |_, tx| async move {
            for i in 1..=3 {
                if tx.send(expensive(i, started).await).await.is_err() {
                    break;
                }
            }
            Ok(())
        })?;
        ch.consume_each(|v| println!("[first reader] {v} at {:?}", started.elapsed()))
            .await;
        let mut leftovers = 0;
        ch.consume_each(|_| leftovers += 1).await;
        println!("[second reader] {leftovers} values, the channel is drained");
        Ok::<_, TaskError>(())
    })
    .await?;
    println!();
    Ok(())
}

async fn flow() -> anyhow::Result<()> {
    println!("=== flow ===");
    let started = Instant::now();
    let values = Flow::new(move |em| async move {
        println!("  [flow] collection started");
        for i in 1..=3 {
            em.emit(expensive(i, started).await).await?;
        }
        Ok(())
    });
    println!("[main] flow built at {:?}, nothing ran yet", started.elapsed());
    for reader in ["first", "second"] {
        values
            .for_each(|v| println!("[{reader} reader] {v} at {:?}", started.elapsed()))
            .await?;
    }
    println!();
    Ok(())
}

async fn dangerous() {
    println!("=== dangerous ===");
    let outer = Scope::new(ScopeMode::Isolating);
    let res = outer
        .with_timeout(Duration::from_millis(500), |scope| async move {
            let _unread = produce(&scope, "abandoned", Capacity::Rendezvous, |_, tx| async move {
                for i in 0.. {
                    tx.send(i).await.map_err(|_| TaskError::fail("closed"))?;
                }
                Ok(())
            })?;
            println!("[main] body returns without reading the channel");
            Ok(())
        })
        .await;
    println!("[main] the producer held the scope open: {res:?}\n");
}
