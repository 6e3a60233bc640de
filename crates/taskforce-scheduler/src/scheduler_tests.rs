use super::*;
use crate::policy::NoRetry;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use taskforce_protocols::error::ProviderError;
use tokio::sync::Notify;

fn settings(max: usize, initial: usize, increase_after: u32) -> SchedulerSettings {
    SchedulerSettings {
        max_parallel_requests: max,
        initial_parallel_requests: initial,
        min_interval_between_start_ms: 0,
        start_jitter_ms: 0,
        increase_after_consecutive_successes: increase_after,
        max_attempts: 1,
    }
}

fn no_retry(key: &str, settings: SchedulerSettings) -> CallScheduler {
    CallScheduler::with_policies(
        key,
        settings,
        Arc::new(NoRetry),
        Arc::new(DefaultOverloadClassifier),
    )
}

fn overloaded() -> ProviderError {
    ProviderError::ApiError {
        status: 429,
        message: "rate limit exceeded".to_string(),
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_overload_halves_limit_with_floor() {
    let scheduler = no_retry("m", settings(8, 8, 100));

    for expected in [4, 2, 1, 1] {
        let result: Result<(), _> = scheduler
            .run(|| async { Err(overloaded()) }, RunOptions::default())
            .await;
        assert!(result.is_err());
        assert_eq!(scheduler.snapshot().current_parallel_limit, expected);
    }
}

#[tokio::test]
async fn test_non_overload_failure_keeps_limit() {
    let scheduler = no_retry("m", settings(4, 4, 100));

    let result: Result<(), _> = scheduler
        .run(
            || async { Err(ProviderError::InvalidRequest("bad".to_string())) },
            RunOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    assert_eq!(scheduler.snapshot().current_parallel_limit, 4);
}

#[tokio::test]
async fn test_limit_grows_after_consecutive_successes() {
    let scheduler = no_retry("m", settings(3, 1, 2));

    let ok = || async { Ok::<_, ProviderError>(()) };
    scheduler.run(ok, RunOptions::default()).await.unwrap();
    let stats = scheduler.snapshot();
    assert_eq!(stats.current_parallel_limit, 1);
    assert_eq!(stats.consecutive_successes, 1);

    scheduler.run(ok, RunOptions::default()).await.unwrap();
    let stats = scheduler.snapshot();
    assert_eq!(stats.current_parallel_limit, 2);
    assert_eq!(stats.consecutive_successes, 0);

    for _ in 0..4 {
        scheduler.run(ok, RunOptions::default()).await.unwrap();
    }
    // capped at max
    assert_eq!(scheduler.snapshot().current_parallel_limit, 3);
}

#[tokio::test]
async fn test_overload_resets_success_counter() {
    let scheduler = no_retry("m", settings(4, 2, 3));

    let ok = || async { Ok::<_, ProviderError>(()) };
    scheduler.run(ok, RunOptions::default()).await.unwrap();
    scheduler.run(ok, RunOptions::default()).await.unwrap();
    assert_eq!(scheduler.snapshot().consecutive_successes, 2);

    let _ = scheduler
        .run(|| async { Err::<(), _>(overloaded()) }, RunOptions::default())
        .await;
    let stats = scheduler.snapshot();
    assert_eq!(stats.consecutive_successes, 0);
    assert_eq!(stats.current_parallel_limit, 1);
}

#[tokio::test]
async fn test_fifo_admission_with_single_slot() {
    let scheduler = Arc::new(no_retry("m", settings(1, 1, 100)));
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let gate = Arc::new(Notify::new());

    // Occupy the only slot.
    let blocker = {
        let scheduler = scheduler.clone();
        let gate = gate.clone();
        tokio::spawn(async move {
            scheduler
                .run(
                    || {
                        let gate = gate.clone();
                        async move {
                            gate.notified().await;
                            Ok::<_, ProviderError>(())
                        }
                    },
                    RunOptions::default(),
                )
                .await
        })
    };
    settle().await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let scheduler = scheduler.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            scheduler
                .run(
                    || {
                        let order = order.clone();
                        async move {
                            order.lock().push(i);
                            Ok::<_, ProviderError>(())
                        }
                    },
                    RunOptions::default(),
                )
                .await
        }));
        settle().await;
    }
    assert_eq!(scheduler.snapshot().queued, 4);

    gate.notify_one();
    blocker.await.unwrap().unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    assert_eq!(scheduler.snapshot().active, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_accumulates_metrics() {
    let mut s = settings(2, 2, 100);
    s.max_attempts = 5;
    let policy = |_attempt: u32, _failure: &CallFailure| Some(Duration::from_millis(250));
    let scheduler = CallScheduler::with_policies(
        "m",
        s,
        Arc::new(policy),
        Arc::new(DefaultOverloadClassifier),
    );

    let calls = Arc::new(AtomicU32::new(0));
    let metrics = Arc::new(parking_lot::Mutex::new(None));
    let sink = metrics.clone();
    let counter = calls.clone();

    let result = scheduler
        .run(
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(overloaded())
                    } else {
                        Ok("done")
                    }
                }
            },
            RunOptions::default().on_settled(move |m| *sink.lock() = Some(m.clone())),
        )
        .await;

    assert_eq!(result.unwrap(), "done");
    let m = metrics.lock().clone().unwrap();
    assert_eq!(m.attempts, 3);
    assert_eq!(m.overload_count, 2);
    assert_eq!(m.retry_delay_ms, 500);
    assert!(m.succeeded);
    assert_eq!(m.key, "m");
}

#[tokio::test]
async fn test_policy_none_stops_immediately() {
    let mut s = settings(2, 2, 100);
    s.max_attempts = 10;
    let scheduler = no_retry("m", s);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result: Result<(), _> = scheduler
        .run(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Network("reset".to_string())) }
            },
            RunOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(ProviderError::Network(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_attempts_return_last_error() {
    let mut s = settings(2, 2, 100);
    s.max_attempts = 3;
    let policy = |_attempt: u32, _failure: &CallFailure| Some(Duration::from_millis(10));
    let scheduler = CallScheduler::with_policies(
        "m",
        s,
        Arc::new(policy),
        Arc::new(DefaultOverloadClassifier),
    );
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result: Result<(), _> = scheduler
        .run(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(ProviderError::Network(format!("failure {}", n))) }
            },
            RunOptions::default(),
        )
        .await;

    match result {
        Err(ProviderError::Network(msg)) => assert_eq!(msg, "failure 3"),
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_start_spacing() {
    let mut s = settings(4, 4, 100);
    s.min_interval_between_start_ms = 200;
    let scheduler = Arc::new(no_retry("m", s));
    let starts = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let scheduler = scheduler.clone();
        let starts = starts.clone();
        handles.push(tokio::spawn(async move {
            scheduler
                .run(
                    || {
                        let starts = starts.clone();
                        async move {
                            starts.lock().push(Instant::now());
                            Ok::<_, ProviderError>(())
                        }
                    },
                    RunOptions::default(),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let starts = starts.lock().clone();
    assert_eq!(starts.len(), 3);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(200));
    }
}

#[tokio::test]
async fn test_cancel_while_queued_releases_nothing() {
    let scheduler = Arc::new(no_retry("m", settings(1, 1, 100)));
    let gate = Arc::new(Notify::new());

    let blocker = {
        let scheduler = scheduler.clone();
        let gate = gate.clone();
        tokio::spawn(async move {
            scheduler
                .run(
                    || {
                        let gate = gate.clone();
                        async move {
                            gate.notified().await;
                            Ok::<_, ProviderError>(())
                        }
                    },
                    RunOptions::default(),
                )
                .await
        })
    };
    settle().await;

    let cancel = CancellationToken::new();
    let ran = Arc::new(AtomicBool::new(false));
    let queued = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        let ran = ran.clone();
        tokio::spawn(async move {
            scheduler
                .run(
                    || {
                        let ran = ran.clone();
                        async move {
                            ran.store(true, Ordering::SeqCst);
                            Ok::<_, ProviderError>(())
                        }
                    },
                    RunOptions::default().with_cancel(cancel),
                )
                .await
        })
    };
    settle().await;
    assert_eq!(scheduler.snapshot().queued, 1);

    cancel.cancel();
    let result = queued.await.unwrap();
    assert!(matches!(result, Err(ProviderError::Cancelled)));
    assert!(!ran.load(Ordering::SeqCst));

    gate.notify_one();
    blocker.await.unwrap().unwrap();
    let stats = scheduler.snapshot();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.queued, 0);

    // The slot is still usable.
    scheduler
        .run(|| async { Ok::<_, ProviderError>(()) }, RunOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancel_in_flight_call() {
    let scheduler = no_retry("m", settings(1, 1, 100));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let result: Result<(), _> = scheduler
        .run(
            move || {
                let trigger = trigger.clone();
                async move {
                    trigger.cancel();
                    std::future::pending::<Result<(), ProviderError>>().await
                }
            },
            RunOptions::default().with_cancel(cancel),
        )
        .await;

    assert!(matches!(result, Err(ProviderError::Cancelled)));
    assert_eq!(scheduler.snapshot().active, 0);
}

struct Gated {
    started: AtomicBool,
    gate: Notify,
}

impl Gated {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicBool::new(false),
            gate: Notify::new(),
        })
    }

    fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

fn spawn_gated(
    scheduler: &Arc<CallScheduler>,
    task: &Arc<Gated>,
    fail_with_overload: bool,
) -> tokio::task::JoinHandle<Result<(), ProviderError>> {
    let scheduler = scheduler.clone();
    let task = task.clone();
    tokio::spawn(async move {
        scheduler
            .run(
                || {
                    let task = task.clone();
                    async move {
                        task.started.store(true, Ordering::SeqCst);
                        task.gate.notified().await;
                        if fail_with_overload {
                            Err(overloaded())
                        } else {
                            Ok(())
                        }
                    }
                },
                RunOptions::default(),
            )
            .await
    })
}

#[tokio::test]
async fn test_overload_throttles_queued_work() {
    let scheduler = Arc::new(no_retry("model-x", settings(4, 4, 100)));
    let tasks: Vec<_> = (0..6).map(|_| Gated::new()).collect();

    let mut handles = Vec::new();
    for (i, task) in tasks.iter().enumerate() {
        handles.push(spawn_gated(&scheduler, task, i == 0));
        settle().await;
    }

    assert!(tasks[..4].iter().all(|t| t.started()));
    assert!(!tasks[4].started());
    assert!(!tasks[5].started());

    // Task 1 fails with a 429: limit 4 -> 2 while three calls are still active.
    tasks[0].gate.notify_one();
    settle().await;
    let stats = scheduler.snapshot();
    assert_eq!(stats.current_parallel_limit, 2);
    assert_eq!(stats.active, 3);
    assert!(!tasks[4].started());

    tasks[1].gate.notify_one();
    settle().await;
    assert_eq!(scheduler.snapshot().active, 2);
    assert!(!tasks[4].started());

    tasks[2].gate.notify_one();
    settle().await;
    assert!(tasks[4].started());
    assert!(!tasks[5].started());

    for task in &tasks[3..] {
        task.gate.notify_one();
    }
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert!(results[0].is_err());
    assert!(results[1..].iter().all(|r| r.is_ok()));

    let stats = scheduler.snapshot();
    assert_eq!(stats.active, 0);
    assert!(stats.current_parallel_limit >= 1);
    assert!(stats.current_parallel_limit <= stats.max_parallel_requests);
}

#[tokio::test]
async fn test_dropping_a_granted_waiter_frees_its_slot() {
    let scheduler = Arc::new(no_retry("m", settings(1, 1, 100)));
    let gate = Arc::new(Notify::new());

    let holder = {
        let scheduler = scheduler.clone();
        let gate = gate.clone();
        tokio::spawn(async move {
            scheduler
                .run(
                    || {
                        let gate = gate.clone();
                        async move {
                            gate.notified().await;
                            Ok::<_, ProviderError>(())
                        }
                    },
                    RunOptions::default(),
                )
                .await
        })
    };
    settle().await;

    // Queue a second call, then stop polling it.
    let mut waiter = Box::pin(scheduler.run(
        || async { Ok::<_, ProviderError>(()) },
        RunOptions::default(),
    ));
    tokio::select! {
        biased;
        _ = &mut waiter => panic!("second call must queue behind the first"),
        _ = std::future::ready(()) => {}
    }
    assert_eq!(scheduler.snapshot().queued, 1);

    // The first call finishes and hands its slot to the idle waiter.
    gate.notify_one();
    holder.await.unwrap().unwrap();
    let stats = scheduler.snapshot();
    assert_eq!(stats.active, 1);
    assert_eq!(stats.queued, 0);

    drop(waiter);
    assert_eq!(scheduler.snapshot().active, 0);

    let third = tokio::time::timeout(
        Duration::from_millis(500),
        scheduler.run(|| async { Ok::<_, ProviderError>(()) }, RunOptions::default()),
    )
    .await;
    assert!(matches!(third, Ok(Ok(()))));
    assert_eq!(scheduler.snapshot().active, 0);
}

#[tokio::test]
async fn test_cancel_after_grant_frees_the_slot() {
    let scheduler = Arc::new(no_retry("m", settings(1, 1, 100)));
    let gate = Arc::new(Notify::new());

    let holder = {
        let scheduler = scheduler.clone();
        let gate = gate.clone();
        tokio::spawn(async move {
            scheduler
                .run(
                    || {
                        let gate = gate.clone();
                        async move {
                            gate.notified().await;
                            Ok::<_, ProviderError>(())
                        }
                    },
                    RunOptions::default(),
                )
                .await
        })
    };
    settle().await;

    let cancel = CancellationToken::new();
    let mut waiter = Box::pin(scheduler.run(
        || async { Ok::<_, ProviderError>(()) },
        RunOptions::default().with_cancel(cancel.clone()),
    ));
    tokio::select! {
        biased;
        _ = &mut waiter => panic!("second call must queue behind the first"),
        _ = std::future::ready(()) => {}
    }

    gate.notify_one();
    holder.await.unwrap().unwrap();
    assert_eq!(scheduler.snapshot().active, 1);

    // Cancellation wins over the pending grant.
    cancel.cancel();
    let result = waiter.await;
    assert!(matches!(result, Err(ProviderError::Cancelled)));
    assert_eq!(scheduler.snapshot().active, 0);
}

#[tokio::test(start_paused = true)]
async fn test_full_range_jitter_does_not_overflow() {
    let scheduler = no_retry(
        "m",
        SchedulerSettings {
            start_jitter_ms: u64::MAX,
            ..settings(1, 1, 1)
        },
    );
    let spaced = tokio::time::timeout(Duration::from_millis(10), scheduler.space_start()).await;
    // Either a short jitter finished or the timeout cut a huge one short.
    assert!(spaced.map_or(true, |d| d <= Duration::from_millis(10)));
}
