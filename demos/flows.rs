//! # Example: flows
//!
//! Cold flows with operators, hot state and shared flows, and bridging a
//! callback API into a flow.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► operators   on_start / filter / map / on_each / take / on_completion / catch
//!   ├─► distinct    1,1,2,2,2,3,1 ─► 1,2,3,1
//!   ├─► debounce    bursts separated by quiet periods ─► last of each burst
//!   ├─► hot         StateFlow (changes only) and SharedFlow (replay 1)
//!   ├─► foreign     emitting from another task is rejected
//!   └─► callback    listener registration ─► Flow, cleanup on take(n)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example flows [scenario]
//! ```

use std::sync::Arc;
use std::time::Duration;

use scopekit::{run_isolating, Flow, FlowError, SharedFlow, StateFlow, TaskError};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let only = std::env::args().nth(1);
    let wants = |name: &str| only.as_deref().map_or(true, |o| o == name);

    if wants("operators") {
        operators().await?;
    }
    if wants("distinct") {
        distinct().await?;
    }
    if wants("debounce") {
        debounce().await?;
    }
    if wants("hot") {
        hot().await?;
    }
    if wants("foreign") {
        foreign().await;
    }
    if wants("callback") {
        callback().await?;
    }
    Ok(())
}

async fn operators() -> anyhow::Result<()> {
    println!("=== operators ===");
    let squares = Flow::from_iter(1..=10)
        .on_start(|| println!("[flow] started"))
        .filter(|v| v % 2 == 1)
        .map(|v| v * v)
        .on_each(|v| println!("[flow] passing {v}"))
        .take(3)
        .on_completion(|err| println!("[flow] completed, error = {err:?}"));
    println!("[main] collected {:?}", squares.to_vec().await?);

    let sum = Flow::from_iter(1..=4).fold(0, |acc, v| acc + v).await?;
    let product = Flow::from_iter(1..=4).reduce(|a, b| a * b).await?;
    println!("[main] fold sum = {sum}, reduce product = {product}");

    let flaky = Flow::new(|em| async move {
        em.emit(1).await?;
        em.emit(2).await?;
        Err(FlowError::failed("sensor unplugged"))
    })
    .catch(|e| {
        println!("[catch] {e}");
        Some(-1)
    });
    println!("[main] with catch {:?}\n", flaky.to_vec().await?);
    Ok(())
}

async fn distinct() -> anyhow::Result<()> {
    println!("=== distinct ===");
    let out = Flow::from_iter([1, 1, 2, 2, 2, 3, 1])
        .distinct_until_changed()
        .to_vec()
        .await?;
    println!("[main] {out:?}\n");
    Ok(())
}

async fn debounce() -> anyhow::Result<()> {
    println!("=== debounce ===");
    let keystrokes = Flow::new(|em| async move {
        for word in ["sc", "sco", "scope", "scopek", "scopekit"] {
            em.emit(word).await?;
            tokio::time::sleep(Duration::from_millis(if word == "scope" { 400 } else { 50 })).await;
        }
        Ok(())
    });
    let queries = keystrokes
        .debounce(Duration::from_millis(200))
        .on_each(|q| println!("[search] {q}"))
        .to_vec()
        .await?;
    println!("[main] {} queries instead of 5\n", queries.len());
    Ok(())
}

async fn hot() -> anyhow::Result<()> {
    println!("=== hot ===");
    let state = StateFlow::new("idle");
    let shared: SharedFlow<String> = SharedFlow::new(1, 16);

    run_isolating(|scope| {
        let (state, shared) = (state.clone(), shared.clone());
        async move {
            let mut sub = state.subscribe();
            scope.spawn("state-watcher", move |_| async move {
                while let Some(v) = sub.next().await {
                    println!("[state-watcher] {v}");
                    if v == "done" {
                        break;
                    }
                }
                Ok(())
            })?;

            shared.emit("boot".into()).await.map_err(TaskError::from)?;
            let late = shared.subscribe();
            scope.spawn("shared-watcher", move |_| async move {
                while let Ok(v) = late.recv().await {
                    println!("[shared-watcher] {v}");
                }
                Ok(())
            })?;

            for s in ["idle", "loading", "loading", "ready", "done"] {
                let changed = state.set(s);
                shared.emit(format!("set {s}")).await.map_err(TaskError::from)?;
                println!("[main] set {s:?} changed={changed}");
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            shared.close();
            Ok::<_, TaskError>(())
        }
    })
    .await?;
    println!("[main] state is now {:?}\n", state.value());
    Ok(())
}

async fn foreign() {
    println!("=== foreign ===");
    let flow: Flow<u32> = Flow::new(|em| async move {
        em.emit(1).await?;
        let elsewhere = tokio::spawn(async move { em.emit(2).await });
        elsewhere.await.unwrap_or(Err(FlowError::Detached))
    });
    println!("[main] {:?}\n", flow.to_vec().await);
}

async fn callback() -> anyhow::Result<()> {
    println!("=== callback ===");
    // a listener-style API: callers register and get events pushed at them
    let (events, _) = broadcast::channel::<u32>(16);
    let source = Arc::new(events);

    let bridge = {
        let source = Arc::clone(&source);
        Flow::from_callback(move |sink| {
            let mut rx = source.subscribe();
            println!("[bridge] listener registered");
            let pump = tokio::spawn(async move {
                while let Ok(v) = rx.recv().await {
                    if !sink.try_emit(v) && sink.is_closed() {
                        break;
                    }
                }
                sink.close();
            });
            move || {
                pump.abort();
                println!("[bridge] listener unregistered");
            }
        })
    };

    let feeder = {
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            for i in 0..10 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = source.send(i);
            }
        })
    };
    println!("[main] first three events {:?}", bridge.take(3).to_vec().await?);
    feeder.await?;
    println!();
    Ok(())
}
