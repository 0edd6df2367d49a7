//! End-to-end behaviour of the concurrency kernel: channels, broadcast, flows,
//! scopes and mutual exclusion, each exercised the way the demos use them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use scopekit::{
    await_all, produce, run_isolating, run_propagating, BroadcastChannel, Capacity, Channel,
    Flow, FlowError, Job, Overflow, RaceCounter, Replay, Scope, ScopeError, ScopeMode,
    SingleFlight, StateFlow, TaskError, TaskState, TryRecvError,
};

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn suspend_channel_buffers_at_most_capacity(c in 1usize..32) {
        paused_runtime().block_on(async move {
            let ch = Channel::new(Capacity::Buffered(c), Overflow::Suspend);
            let tx = ch.clone();
            let sender = tokio::spawn(async move {
                for i in 0..=c {
                    tx.send(i).await.unwrap();
                }
            });

            while ch.suspended_senders() == 0 {
                tokio::task::yield_now().await;
            }
            assert_eq!(ch.len(), c);
            assert!(!sender.is_finished());

            assert_eq!(ch.recv().await, Ok(0));
            sender.await.unwrap();
            assert_eq!(ch.len(), c);
        });
    }

    #[test]
    fn drop_policies_never_suspend_or_overfill(c in 1usize..16, extra in 1usize..16) {
        paused_runtime().block_on(async move {
            for overflow in [Overflow::DropOldest, Overflow::DropLatest] {
                let ch = Channel::new(Capacity::Buffered(c), overflow);
                for i in 0..c + extra {
                    ch.send(i).await.unwrap();
                }
                assert_eq!(ch.len(), c);
                let first = ch.try_recv().unwrap();
                match overflow {
                    Overflow::DropOldest => assert_eq!(first, extra),
                    _ => assert_eq!(first, 0),
                }
            }
        });
    }
}

#[tokio::test(start_paused = true)]
async fn rendezvous_producer_without_consumer_completes_no_send() {
    let scope = Scope::new(ScopeMode::Isolating);
    let completed = Arc::new(AtomicUsize::new(0));
    let c = completed.clone();
    let ch = produce(&scope, "ten-sends", Capacity::Rendezvous, move |_, tx| async move {
        for i in 0..10 {
            tx.send(i).await.map_err(|_| TaskError::fail("closed"))?;
            c.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    })
    .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ch.suspended_senders(), 1);
    assert_eq!(completed.load(Ordering::SeqCst), 0);

    scope.cancel();
    scope.join_children().await;
    assert!(ch.is_closed());
    assert_eq!(ch.suspended_senders(), 0);
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn drop_oldest_with_capacity_one_keeps_the_latest() {
    let ch = Channel::conflated();
    ch.send(1).await.unwrap();
    ch.send(2).await.unwrap();
    assert_eq!(ch.len(), 1);
    ch.try_send(3).unwrap();
    assert_eq!(ch.try_recv(), Ok(3));
    assert_eq!(ch.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn broadcast_late_subscribers_see_only_new_values() {
    let bc = BroadcastChannel::new(1, Replay::None, Overflow::Suspend);
    bc.send(1).await.unwrap();
    bc.send(2).await.unwrap();

    let subs = [bc.subscribe(), bc.subscribe()];
    bc.send(3).await.unwrap();
    for sub in &subs {
        assert_eq!(sub.recv().await, Ok(3));
        assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));
    }
}

#[tokio::test]
async fn broadcast_last_replay_hands_over_the_latest_value() {
    let bc = BroadcastChannel::new(1, Replay::Last, Overflow::DropOldest);
    bc.send(1).await.unwrap();
    bc.send(2).await.unwrap();
    let late = bc.subscribe();
    assert_eq!(late.recv().await, Ok(2));
    bc.send(3).await.unwrap();
    assert_eq!(late.recv().await, Ok(3));
}

#[tokio::test(start_paused = true)]
async fn state_flow_delivers_only_changes() {
    let state = StateFlow::new(0);
    let mut sub = state.subscribe();
    let reader = tokio::spawn(async move {
        let mut seen = Vec::new();
        while seen.len() < 3 {
            match sub.next().await {
                Some(v) => seen.push(v),
                None => break,
            }
        }
        seen
    });
    for v in [0, 0, 1, 1, 2, 2] {
        state.set(v);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(reader.await.unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn cold_flow_reruns_while_channel_producer_runs_once() {
    let flow_runs = Arc::new(AtomicUsize::new(0));
    let r = flow_runs.clone();
    let flow = Flow::new(move |em| {
        let r = r.clone();
        async move {
            r.fetch_add(1, Ordering::SeqCst);
            for v in 1..=3 {
                em.emit(v).await?;
            }
            Ok(())
        }
    });
    assert_eq!(flow.to_vec().await, Ok(vec![1, 2, 3]));
    assert_eq!(flow.to_vec().await, Ok(vec![1, 2, 3]));
    assert_eq!(flow_runs.load(Ordering::SeqCst), 2);

    let channel_runs = Arc::new(AtomicUsize::new(0));
    let r = channel_runs.clone();
    let drained = run_propagating(|scope| async move {
        let ch = produce(&scope, "producer", Capacity::Buffered(8), move |_, tx| async move {
            r.fetch_add(1, Ordering::SeqCst);
            for v in 1..=3 {
                tx.send(v).await.ok();
            }
            Ok(())
        })?;
        let mut first = Vec::new();
        ch.consume_each(|v| first.push(v)).await;
        let mut second = Vec::new();
        ch.consume_each(|v| second.push(v)).await;
        Ok((first, second))
    })
    .await;
    assert_eq!(drained, Ok((vec![1, 2, 3], vec![])));
    assert_eq!(channel_runs.load(Ordering::SeqCst), 1);
}

async fn three_children(scope: &Scope, jobs: &Arc<Mutex<Vec<Job>>>) -> Result<(), TaskError> {
    let spawned = vec![
        scope.spawn("slow-a", |ctx| async move {
            ctx.delay(Duration::from_secs(1)).await
        })?,
        scope.spawn("slow-b", |ctx| async move {
            ctx.delay(Duration::from_secs(2)).await
        })?,
        scope.spawn("failing", |ctx| async move {
            ctx.delay(Duration::from_millis(10)).await?;
            Err(TaskError::fail("boom"))
        })?,
    ];
    jobs.lock().unwrap().extend(spawned);
    Ok(())
}

fn states(jobs: &Arc<Mutex<Vec<Job>>>) -> Vec<TaskState> {
    jobs.lock().unwrap().iter().map(Job::state).collect()
}

#[tokio::test(start_paused = true)]
async fn propagating_scope_cancels_siblings_and_reraises() {
    let jobs = Arc::new(Mutex::new(Vec::new()));
    let j = jobs.clone();
    let res = run_propagating(|scope| async move { three_children(&scope, &j).await }).await;

    assert_eq!(
        res,
        Err(ScopeError::ChildFailed {
            task: "failing".into(),
            error: TaskError::fail("boom"),
        })
    );
    assert_eq!(
        states(&jobs),
        vec![TaskState::Cancelled, TaskState::Cancelled, TaskState::Failed]
    );
}

#[tokio::test(start_paused = true)]
async fn isolating_scope_lets_every_child_finish() {
    let jobs = Arc::new(Mutex::new(Vec::new()));
    let j = jobs.clone();
    let res = run_isolating(|scope| async move { three_children(&scope, &j).await }).await;

    assert_eq!(res, Ok(()));
    assert_eq!(
        states(&jobs),
        vec![TaskState::Completed, TaskState::Completed, TaskState::Failed]
    );
    let failure = jobs.lock().unwrap()[2].failure();
    assert_eq!(failure, Some(TaskError::fail("boom")));
}

#[tokio::test(start_paused = true)]
async fn deferred_failure_reaches_the_awaiter_not_the_scope() {
    let res = run_propagating(|scope| async move {
        let d = scope.spawn_with_result("lookup", |_| async {
            Err::<u32, _>(TaskError::fail("not found"))
        })?;
        let got = d.await_value().await;
        Ok(got)
    })
    .await;
    assert_eq!(res, Ok(Err(TaskError::fail("not found"))));
}

#[tokio::test(start_paused = true)]
async fn externally_cancelled_scope_rejects_new_work() {
    let scope = Scope::new(ScopeMode::Propagating);
    let job = scope
        .spawn("poller", |ctx| async move {
            loop {
                ctx.delay(Duration::from_millis(100)).await?;
            }
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(job.is_active());

    scope.cancel();
    scope.join_children().await;
    assert!(job.is_cancelled());
    assert!(matches!(
        scope.spawn("late", |_| async { Ok(()) }),
        Err(ScopeError::Cancelled)
    ));
}

#[tokio::test(start_paused = true)]
async fn timeout_cancels_the_bounded_sub_scope() {
    let scope = Scope::new(ScopeMode::Isolating);
    let res = scope
        .with_timeout(Duration::from_millis(100), |inner| async move {
            inner.spawn("slow", |ctx| async move {
                ctx.delay(Duration::from_secs(10)).await
            })?;
            Ok(())
        })
        .await;
    assert_eq!(
        res,
        Err(ScopeError::TimedOut {
            timeout: Duration::from_millis(100)
        })
    );
    assert!(!scope.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn sequential_awaits_run_in_order_and_concurrent_ones_by_duration() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let o = order.clone();
    run_propagating(|scope| async move {
        let mut pending = Vec::new();
        for (name, ms) in [("slow", 300u64), ("fast", 100), ("mid", 200)] {
            let o = o.clone();
            pending.push(scope.spawn_with_result(name, move |ctx| async move {
                ctx.delay(Duration::from_millis(ms)).await?;
                o.lock().unwrap().push(name);
                Ok(ms)
            })?);
        }
        let values = await_all(pending).await?;
        assert_eq!(values, vec![300, 100, 200]);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["fast", "mid", "slow"]);
}

#[tokio::test(start_paused = true)]
async fn serial_awaits_start_the_next_task_only_after_the_previous_one() {
    let marks = Arc::new(Mutex::new(Vec::new()));
    let started = tokio::time::Instant::now();
    let m = marks.clone();
    let total = run_propagating(|scope| async move {
        let mut sum = 0;
        for (name, ms) in [("slow", 300u64), ("fast", 100)] {
            let m = m.clone();
            sum += scope
                .spawn_with_result(name, move |ctx| async move {
                    m.lock().unwrap().push(format!("{name} start"));
                    ctx.delay(Duration::from_millis(ms)).await?;
                    m.lock().unwrap().push(format!("{name} end"));
                    Ok(ms)
                })?
                .await_value()
                .await?;
        }
        Ok(sum)
    })
    .await
    .unwrap();

    assert_eq!(total, 400);
    assert_eq!(
        *marks.lock().unwrap(),
        vec!["slow start", "slow end", "fast start", "fast end"]
    );
    // the sum of both delays, not the longer one
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(450), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn debounce_keeps_only_the_last_value_of_a_burst() {
    let burst = Flow::new(|em| async move {
        for v in [0, 0, 1, 1, 2, 2] {
            em.emit(v).await?;
        }
        Ok(())
    });
    let out = burst.debounce(Duration::from_millis(100)).to_vec().await;
    assert_eq!(out, Ok(vec![2]));
}

#[tokio::test(start_paused = true)]
async fn debounce_delivers_the_last_value_of_each_separated_burst() {
    let bursts = Flow::new(|em| async move {
        for pair in [[0, 0], [1, 1], [2, 2]] {
            for v in pair {
                em.emit(v).await?;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(())
    });
    let out = bursts.debounce(Duration::from_millis(100)).to_vec().await;
    assert_eq!(out, Ok(vec![0, 1, 2]));
}

#[tokio::test(start_paused = true)]
async fn debounce_flushes_a_value_emitted_right_before_completion() {
    let flow = Flow::new(|em| async move {
        em.emit(0).await?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        em.emit(1).await?;
        tokio::time::sleep(Duration::from_millis(10)).await;
        em.emit(2).await
    });
    let out = flow.debounce(Duration::from_millis(100)).to_vec().await;
    assert_eq!(out, Ok(vec![0, 2]));
}

#[tokio::test]
async fn foreign_emission_is_rejected() {
    let flow: Flow<&str> = Flow::new(|em| async move {
        let handle = tokio::spawn(async move { em.emit("from elsewhere").await });
        handle.await.unwrap_or(Err(FlowError::Detached))
    });
    assert_eq!(flow.to_vec().await, Err(FlowError::ForeignEmission));
}

#[tokio::test]
async fn mutex_makes_increments_exact_for_every_load() {
    for (n, k) in [(2u64, 1u64), (4, 10), (16, 25)] {
        for guarded in [false, true] {
            let counter = Arc::new(RaceCounter::new());
            let mut handles = Vec::new();
            for _ in 0..n {
                let c = counter.clone();
                handles.push(tokio::spawn(async move {
                    for _ in 0..k {
                        if guarded {
                            c.guarded_increment().await;
                        } else {
                            c.unguarded_increment().await;
                        }
                    }
                }));
            }
            for h in handles {
                h.await.unwrap();
            }
            if guarded {
                assert_eq!(counter.get(), n * k, "n={n} k={k}");
            } else {
                assert!(counter.get() < n * k, "n={n} k={k}");
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn single_flight_shares_one_in_flight_call() {
    let scope = Scope::new(ScopeMode::Isolating);
    let flight = SingleFlight::new("config-load");
    let loads = Arc::new(AtomicUsize::new(0));

    let call = |loads: Arc<AtomicUsize>| {
        move |ctx: scopekit::TaskContext| async move {
            loads.fetch_add(1, Ordering::SeqCst);
            ctx.delay(Duration::from_millis(50)).await?;
            Ok::<_, TaskError>("loaded")
        }
    };
    let (a, b) = tokio::join!(
        flight.run(&scope, call(loads.clone())),
        flight.run(&scope, call(loads.clone())),
    );
    assert_eq!((a, b), (Ok("loaded"), Ok("loaded")));
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn with_context_runs_on_the_dedicated_pool() {
    let pool = scopekit::Config {
        worker_threads: 1,
        ..scopekit::Config::default()
    }
    .build_pool()
    .unwrap();
    let caller = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let handle = pool.handle().clone();
    let name = caller
        .block_on(scopekit::with_context(&handle, async {
            std::thread::current().name().map(str::to_owned)
        }))
        .unwrap();
    assert_eq!(name.as_deref(), Some("scopekit-worker"));
}
