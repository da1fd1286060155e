use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kashvi_pool::{Pool, PoolError};

/// Polls `cond` until it holds or two seconds pass.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn submit_and_execute() {
    let pool = Pool::new(4);
    let count = Arc::new(AtomicU64::new(0));

    const N: u64 = 100;
    for _ in 0..N {
        let count = Arc::clone(&count);
        pool.submit_wait(async move {
            count.fetch_add(1, Ordering::Relaxed);
        })
        .await
        .expect("submit_wait returned unexpected error");
    }

    wait_until(|| count.load(Ordering::Relaxed) == N).await;
    pool.shutdown().await;
}

#[tokio::test]
async fn submit_returns_full_when_buffer_exhausted() {
    // Size-1 pool whose only worker is blocked.
    let pool = Pool::new(1);

    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    pool.submit_wait(async move {
        let _ = started_tx.send(());
        let _ = release_rx.await;
    })
    .await
    .unwrap();
    started_rx.await.unwrap();

    // Fill the 2-slot buffer (2 × worker count).
    pool.submit(async {}).unwrap();
    pool.submit(async {}).unwrap();

    assert_eq!(pool.submit(async {}), Err(PoolError::Full));
    assert_eq!(pool.submit_rejected(), 1);

    release_tx.send(()).unwrap();
    pool.shutdown().await;
}

#[tokio::test]
async fn submit_wait_suspends_until_slot_frees() {
    let pool = Arc::new(Pool::new(1));

    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    pool.submit_wait(async move {
        let _ = started_tx.send(());
        let _ = release_rx.await;
    })
    .await
    .unwrap();
    started_rx.await.unwrap();

    pool.submit(async {}).unwrap();
    pool.submit(async {}).unwrap();

    let submitted = Arc::new(AtomicBool::new(false));
    let waiter = {
        let pool = Arc::clone(&pool);
        let submitted = Arc::clone(&submitted);
        tokio::spawn(async move {
            pool.submit_wait(async {}).await.unwrap();
            submitted.store(true, Ordering::Relaxed);
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!submitted.load(Ordering::Relaxed), "submit_wait should block on a full buffer");

    release_tx.send(()).unwrap();
    waiter.await.unwrap();
    assert!(submitted.load(Ordering::Relaxed));

    pool.shutdown().await;
}

#[tokio::test]
async fn submit_after_shutdown_returns_closed() {
    let pool = Pool::new(2);
    pool.shutdown().await;

    assert_eq!(pool.submit(async {}), Err(PoolError::Closed));
    assert_eq!(pool.submit_wait(async {}).await, Err(PoolError::Closed));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let pool = Pool::new(2);
    pool.shutdown().await;
    pool.shutdown().await;
}

#[tokio::test]
async fn panicking_task_does_not_kill_worker() {
    let pool = Pool::new(2);

    pool.submit_wait(async {
        panic!("intentional panic");
    })
    .await
    .unwrap();

    // The pool must still accept and run tasks afterwards.
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    pool.submit_wait(async move {
        let _ = done_tx.send(());
    })
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(2), done_rx)
        .await
        .expect("pool did not recover from panic")
        .unwrap();

    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_waits_for_queued_tasks() {
    let pool = Pool::new(10);
    let count = Arc::new(AtomicU64::new(0));

    for _ in 0..50 {
        let count = Arc::clone(&count);
        pool.submit_wait(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            count.fetch_add(1, Ordering::Relaxed);
        })
        .await
        .unwrap();
    }

    pool.shutdown().await;
    assert_eq!(count.load(Ordering::Relaxed), 50);
    assert_eq!(pool.in_flight(), 0);
}

#[tokio::test]
async fn zero_capacity_is_coerced_to_one() {
    let pool = Pool::new(0);
    assert_eq!(pool.capacity(), 1);

    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    pool.submit(async move {
        let _ = done_tx.send(());
    })
    .unwrap();

    done_rx.await.unwrap();
    pool.shutdown().await;
}
