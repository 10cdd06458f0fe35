//! Integration tests for errand-dispatch

use errand_dispatch::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;

fn x_policy() -> TimeoutPolicy {
    TimeoutPolicy::new(Duration::from_secs(1), Duration::from_millis(200)).with_max_retry(2)
}

#[tokio::test(start_paused = true)]
async fn test_fails_twice_then_succeeds() {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicU32::new(0));

    let mut dispatcher = Dispatcher::new(2);
    let seen = calls.clone();
    dispatcher.register(
        "X",
        move |_scope, job: Job, _span| {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            let done_tx = done_tx.clone();
            async move {
                if n < 2 {
                    return Err(DispatchError::failed("transient"));
                }
                let _ = done_tx.send((job.retry, Instant::now()));
                Ok(())
            }
        },
        x_policy(),
    );
    dispatcher.start(1).unwrap();

    let started = Instant::now();
    assert!(dispatcher.enqueue(Job::new("X", Vec::new()).with_trace_id("req-1")));

    let (retry, finished) = tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
        .await
        .unwrap()
        .unwrap();

    let backoff = x_policy().backoff;
    let elapsed = finished - started;
    assert_eq!(retry, 2);
    assert!(elapsed >= backoff.delay_for_retry(0) + backoff.delay_for_retry(1));
    assert!(elapsed < Duration::from_secs(1));

    dispatcher.stop().await;
    let stats = dispatcher.stats();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.retries, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_job_is_abandoned() {
    let calls = Arc::new(AtomicU32::new(0));

    let mut dispatcher = Dispatcher::new(2);
    let seen = calls.clone();
    dispatcher.register(
        "X",
        move |_scope, _job, _span| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Err(DispatchError::failed("always")) }
        },
        x_policy(),
    );
    dispatcher.start(1).unwrap();
    assert!(dispatcher.enqueue(Job::new("X", Vec::new())));

    // Well past the job budget: no further attempts may appear.
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let stats = dispatcher.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.succeeded, 0);

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_capacity_one_rejects_until_drained() {
    let release = Arc::new(Notify::new());
    let (ran_tx, mut ran_rx) = mpsc::unbounded_channel();

    let mut dispatcher = Dispatcher::new(1);
    let gate = release.clone();
    dispatcher.register(
        "X",
        move |_scope, _job, _span| {
            let gate = gate.clone();
            let ran_tx = ran_tx.clone();
            async move {
                let _ = ran_tx.send(());
                gate.notified().await;
                Ok(())
            }
        },
        TimeoutPolicy::new(Duration::from_secs(30), Duration::from_secs(30)),
    );

    assert!(dispatcher.enqueue(Job::new("X", Vec::new())));
    assert!(!dispatcher.enqueue(Job::new("X", Vec::new())));

    dispatcher.start(1).unwrap();
    ran_rx.recv().await.unwrap();

    // The worker holds the first job, so the single slot is free again.
    assert_eq!(dispatcher.queue_len(), 0);
    assert!(dispatcher.enqueue(Job::new("X", Vec::new())));
    assert!(!dispatcher.enqueue(Job::new("X", Vec::new())));

    release.notify_one();
    dispatcher.stop().await;

    let stats = dispatcher.stats();
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.rejected_full, 2);
}

#[tokio::test]
async fn test_panicking_handler_keeps_worker_alive() {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let mut dispatcher = Dispatcher::new(8);
    dispatcher.register(
        "X",
        move |_scope, job: Job, _span| {
            let done_tx = done_tx.clone();
            async move {
                if job.payload.as_ref() == b"boom" {
                    panic!("handler exploded");
                }
                let _ = done_tx.send(job.trace_id.clone());
                Ok(())
            }
        },
        x_policy(),
    );
    dispatcher.start(1).unwrap();

    assert!(dispatcher.enqueue(Job::new("X", &b"boom"[..]).with_trace_id("first")));
    assert!(dispatcher.enqueue(Job::new("X", &b"ok"[..]).with_trace_id("second")));

    let trace_id = tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trace_id, "second");
    assert_eq!(dispatcher.worker_count(), 1);

    dispatcher.stop().await;
    let stats = dispatcher.stats();
    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 1);
}

#[tokio::test]
async fn test_panic_is_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));

    let mut dispatcher = Dispatcher::new(8);
    let seen = calls.clone();
    dispatcher.register(
        "X",
        move |_scope, _job, _span| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { panic!("always") }
        },
        x_policy(),
    );
    dispatcher.start(1).unwrap();
    assert!(dispatcher.enqueue(Job::new("X", Vec::new())));

    while dispatcher.stats().finished() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    dispatcher.stop().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.stats().panicked, 1);
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_handler() {
    let running = Arc::new(Notify::new());
    let observed = Arc::new(AtomicBool::new(false));

    let mut dispatcher = Dispatcher::new(64);
    let (started, seen) = (running.clone(), observed.clone());
    dispatcher.register(
        "Slow",
        move |scope: Scope, _job, _span| {
            let started = started.clone();
            let seen = seen.clone();
            async move {
                started.notify_one();
                tokio::select! {
                    _ = scope.token().cancelled() => {
                        seen.store(true, Ordering::SeqCst);
                        Err(DispatchError::Cancelled)
                    }
                    _ = tokio::time::sleep(Duration::from_secs(2)) => Ok(()),
                }
            }
        },
        TimeoutPolicy::new(Duration::from_secs(10), Duration::from_secs(5)),
    );
    dispatcher.start(2).unwrap();
    assert!(dispatcher.enqueue(Job::new("Slow", Vec::new())));

    running.notified().await;
    dispatcher.stop().await;

    assert!(observed.load(Ordering::SeqCst));
    assert_eq!(dispatcher.worker_count(), 0);
    assert_eq!(dispatcher.stats().failed, 1);
}

#[tokio::test]
async fn test_queued_jobs_are_not_drained_on_stop() {
    let calls = Arc::new(AtomicU32::new(0));

    let mut dispatcher = Dispatcher::new(16);
    let seen = calls.clone();
    dispatcher.register(
        "X",
        move |_scope, _job, _span| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        },
        x_policy(),
    );

    for _ in 0..5 {
        assert!(dispatcher.enqueue(Job::new("X", Vec::new())));
    }
    // Stopped before any worker ever ran.
    dispatcher.stop().await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!dispatcher.enqueue(Job::new("X", Vec::new())));
}

#[tokio::test]
async fn test_unregistered_job_type_is_dropped() {
    let dispatcher = Dispatcher::new(4);
    dispatcher.start(1).unwrap();

    assert!(dispatcher.enqueue(Job::new("Unknown", Vec::new())));

    while dispatcher.stats().finished() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(dispatcher.stats().failed, 1);
    assert_eq!(dispatcher.worker_count(), 1);

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_same_type_runs_concurrently_on_multiple_workers() {
    let both_running = Arc::new(tokio::sync::Barrier::new(2));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let mut dispatcher = Dispatcher::new(8);
    let barrier = both_running.clone();
    dispatcher.register(
        "X",
        move |_scope, _job, _span| {
            let barrier = barrier.clone();
            let done_tx = done_tx.clone();
            async move {
                // Only completes if two handlers are in flight at once.
                barrier.wait().await;
                let _ = done_tx.send(());
                Ok(())
            }
        },
        TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(5)),
    );
    dispatcher.start(2).unwrap();

    assert!(dispatcher.enqueue(Job::new("X", Vec::new())));
    assert!(dispatcher.enqueue(Job::new("X", Vec::new())));

    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
            .await
            .unwrap()
            .unwrap();
    }

    dispatcher.stop().await;
}

#[test]
fn test_error_display() {
    let err = DispatchError::NoHandler("X".to_string());
    assert!(err.to_string().contains("no handler for job type"));
}
