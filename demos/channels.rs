//! # Example: channels
//!
//! Point-to-point and broadcast channels under each capacity and overflow
//! policy.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► rendezvous   producer suspends on every send until the consumer takes it
//!   ├─► without_buffer 10 rendezvous sends, no consumer: one suspended send, cancelled after 1s
//!   ├─► buffered     producer runs ahead by `capacity`, then suspends
//!   ├─► drop         DropOldest vs DropLatest on a full buffer, never suspends
//!   ├─► broadcast    every subscriber gets its own copy, late ones get the replay
//!   ├─► three_twice  no replay: two late subscribers both see only the next value
//!   └─► conflated    a slow reader only ever sees the newest value
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=scopekit=trace cargo run --example channels [scenario]
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scopekit::{
    produce, run_propagating, BroadcastChannel, Capacity, Channel, Overflow, Replay, Scope,
    ScopeMode, TaskError, TrySendError,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let only = std::env::args().nth(1);
    let wants = |name: &str| only.as_deref().map_or(true, |o| o == name);

    if wants("rendezvous") {
        producer_pace("rendezvous", Capacity::Rendezvous).await?;
    }
    if wants("without_buffer") {
        without_buffer().await?;
    }
    if wants("buffered") {
        producer_pace("buffered", Capacity::Buffered(3)).await?;
    }
    if wants("drop") {
        drop_policies().await?;
    }
    if wants("broadcast") {
        broadcast().await?;
    }
    if wants("three_twice") {
        three_twice().await?;
    }
    if wants("conflated") {
        conflated().await?;
    }
    Ok(())
}

async fn producer_pace(label: &str, capacity: Capacity) -> anyhow::Result<()> {
    println!("=== {label} ===");
    run_propagating(|scope| async move {
        let numbers = produce(&scope, "numbers", capacity, |_, tx| async move {
            for i in 1..=5 {
                println!("[producer] sending {i}");
                tx.send(i).await.map_err(|_| TaskError::fail("consumer went away"))?;
                println!("[producer] sent {i}");
            }
            Ok(())
        })?;

        tokio::time::sleep(Duration::from_millis(50)).await;
        println!(
            "[consumer] before reading: buffered={}, suspended senders={}",
            numbers.len(),
            numbers.suspended_senders()
        );
        while let Ok(v) = numbers.recv().await {
            println!("[consumer] got {v}");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Ok::<_, TaskError>(())
    })
    .await?;
    println!();
    Ok(())
}

async fn without_buffer() -> anyhow::Result<()> {
    println!("=== without_buffer ===");
    let scope = Scope::new(ScopeMode::Isolating);
    let sent = Arc::new(AtomicUsize::new(0));
    let counter = sent.clone();
    let numbers = produce(&scope, "ten-sends", Capacity::Rendezvous, move |_, tx| async move {
        for i in 1..=10 {
            println!("[producer] sending {i}");
            tx.send(i).await.map_err(|_| TaskError::fail("closed"))?;
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    })?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    println!(
        "[main] after 1s: suspended senders={}, completed sends={}",
        numbers.suspended_senders(),
        sent.load(Ordering::SeqCst)
    );
    scope.cancel();
    scope.join_children().await;
    println!(
        "[main] cancelled: channel closed={}, completed sends={}\n",
        numbers.is_closed(),
        sent.load(Ordering::SeqCst)
    );
    Ok(())
}

async fn drop_policies() -> anyhow::Result<()> {
    println!("=== drop ===");
    for overflow in [Overflow::DropOldest, Overflow::DropLatest] {
        let ch = Channel::new(Capacity::Buffered(3), overflow);
        for i in 1..=6 {
            ch.send(i).await?;
        }
        ch.close();
        let mut kept = Vec::new();
        ch.consume_each(|v| kept.push(v)).await;
        println!("[{overflow:?}] sent 1..=6 into 3 slots, kept {kept:?}");
    }

    let strict = Channel::bounded(1);
    strict.try_send("first")?;
    match strict.try_send("second") {
        Err(TrySendError::Full(v)) => println!("[Suspend] try_send({v:?}) refused: buffer full"),
        other => println!("[Suspend] unexpected {other:?}"),
    }
    println!();
    Ok(())
}

async fn broadcast() -> anyhow::Result<()> {
    println!("=== broadcast ===");
    let news = BroadcastChannel::new(4, Replay::LastN(2), Overflow::Suspend);
    let early = news.subscribe();
    for headline in ["one", "two", "three"] {
        news.send(headline).await?;
    }
    let late = news.subscribe();
    news.send("four").await?;
    news.close();

    let mut seen = Vec::new();
    while let Ok(v) = early.recv().await {
        seen.push(v);
    }
    println!("[early] {seen:?}");
    seen.clear();
    while let Ok(v) = late.recv().await {
        seen.push(v);
    }
    println!("[late, replay 2] {seen:?}\n");
    Ok(())
}

async fn three_twice() -> anyhow::Result<()> {
    println!("=== three_twice ===");
    let bc = BroadcastChannel::new(1, Replay::None, Overflow::Suspend);
    bc.send(1).await?;
    bc.send(2).await?;
    let subs = [bc.subscribe(), bc.subscribe()];
    bc.send(3).await?;
    for (i, sub) in subs.iter().enumerate() {
        println!("[subscriber {i}] {}", sub.recv().await?);
    }
    println!();
    Ok(())
}

async fn conflated() -> anyhow::Result<()> {
    println!("=== conflated ===");
    run_propagating(|scope| async move {
        let temps = Channel::conflated();
        let tx = temps.clone();
        scope.spawn("sensor", move |ctx| async move {
            for reading in 20..30 {
                tx.send(reading).await.ok();
                ctx.delay(Duration::from_millis(10)).await?;
            }
            tx.close();
            Ok(())
        })?;
        while let Ok(v) = temps.recv().await {
            println!("[display] {v}");
            tokio::time::sleep(Duration::from_millis(35)).await;
        }
        Ok::<_, TaskError>(())
    })
    .await?;
    println!();
    Ok(())
}
