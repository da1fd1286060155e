use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kashvi_schedule::Scheduler;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn interval_entry_first_run_is_immediate() {
    let scheduler = Scheduler::new();
    let count = Arc::new(AtomicU32::new(0));

    {
        let count = Arc::clone(&count);
        scheduler.every(60).seconds().name("slowpoke").run(move || {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let token = CancellationToken::new();
    scheduler.start(token.clone());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // Not due again until the interval has elapsed.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);

    token.cancel();
}

#[tokio::test(start_paused = true)]
async fn overlap_guard_limits_concurrent_runs() {
    let scheduler = Scheduler::new();
    let runs = Arc::new(AtomicU32::new(0));

    {
        let runs = Arc::clone(&runs);
        scheduler
            .every(1)
            .seconds()
            .without_overlapping()
            .name("slow")
            .run(move || {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(3)).await;
                }
            });
    }

    let token = CancellationToken::new();
    scheduler.start(token.clone());

    tokio::time::sleep(Duration::from_secs(10)).await;
    token.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let total = runs.load(Ordering::SeqCst);
    assert!((3..=4).contains(&total), "expected 3-4 runs, got {total}");

    let skips = scheduler.metrics().overlap_skips("slow");
    assert!(skips >= 6, "expected at least 6 overlap skips, got {skips}");
    assert_eq!(scheduler.metrics().fires("slow"), u64::from(total));
}

#[tokio::test(start_paused = true)]
async fn hooks_bracket_the_task() {
    let scheduler = Scheduler::new();
    let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    {
        let before = Arc::clone(&events);
        let task = Arc::clone(&events);
        let after = Arc::clone(&events);
        scheduler
            .every(3600)
            .seconds()
            .name("hooked")
            .before(move || {
                let events = Arc::clone(&before);
                async move {
                    events.lock().push("before");
                }
            })
            .after(move || {
                let events = Arc::clone(&after);
                async move {
                    events.lock().push("after");
                }
            })
            .run(move || {
                let events = Arc::clone(&task);
                async move {
                    events.lock().push("task");
                }
            });
    }

    let token = CancellationToken::new();
    scheduler.start(token.clone());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(*events.lock(), vec!["before", "task", "after"]);

    token.cancel();
}

#[tokio::test(start_paused = true)]
async fn after_hook_fires_when_task_panics() {
    let scheduler = Scheduler::new();
    let after_ran = Arc::new(AtomicBool::new(false));

    {
        let after_ran = Arc::clone(&after_ran);
        scheduler
            .every(3600)
            .seconds()
            .name("explosive")
            .after(move || {
                let after_ran = Arc::clone(&after_ran);
                async move {
                    after_ran.store(true, Ordering::SeqCst);
                }
            })
            .run(|| async {
                panic!("task blew up");
            });
    }

    let token = CancellationToken::new();
    scheduler.start(token.clone());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(after_ran.load(Ordering::SeqCst));

    // The dispatch loop survives the panic.
    assert_eq!(scheduler.metrics().fires("explosive"), 1);

    token.cancel();
}

#[tokio::test(start_paused = true)]
async fn panicking_entry_does_not_starve_others() {
    let scheduler = Scheduler::new();
    let healthy_runs = Arc::new(AtomicU32::new(0));

    scheduler.every(1).seconds().name("faulty").run(|| async {
        panic!("always fails");
    });
    {
        let healthy_runs = Arc::clone(&healthy_runs);
        scheduler.every(1).seconds().name("healthy").run(move || {
            let healthy_runs = Arc::clone(&healthy_runs);
            async move {
                healthy_runs.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let token = CancellationToken::new();
    scheduler.start(token.clone());

    tokio::time::sleep(Duration::from_secs(5)).await;
    token.cancel();

    assert!(healthy_runs.load(Ordering::SeqCst) >= 4);
}

#[tokio::test(start_paused = true)]
async fn cron_entry_fires_once_per_matching_minute() {
    let scheduler = Scheduler::new();

    scheduler.cron("* * * * *").name("minutely").run(|| async {});

    let token = CancellationToken::new();
    scheduler.start(token.clone());

    tokio::time::sleep(Duration::from_secs(5)).await;
    token.cancel();

    // Five ticks inside the same calendar minute dispatch exactly once
    // (twice if the test happens to straddle a minute boundary).
    let fires = scheduler.metrics().fires("minutely");
    assert!((1..=2).contains(&fires), "fires = {fires}");
}

#[tokio::test(start_paused = true)]
async fn non_matching_cron_never_fires() {
    let scheduler = Scheduler::new();

    // February 30th does not exist.
    scheduler.cron("0 0 30 2 *").name("never").run(|| async {});

    let token = CancellationToken::new();
    scheduler.start(token.clone());

    tokio::time::sleep(Duration::from_secs(3)).await;
    token.cancel();

    assert_eq!(scheduler.metrics().fires("never"), 0);
}

#[tokio::test(start_paused = true)]
async fn invalid_cron_expression_never_fires() {
    let scheduler = Scheduler::new();

    scheduler.cron("not a cron").name("broken").run(|| async {});

    let token = CancellationToken::new();
    scheduler.start(token.clone());

    tokio::time::sleep(Duration::from_secs(3)).await;
    token.cancel();

    assert_eq!(scheduler.metrics().fires("broken"), 0);
    assert_eq!(scheduler.list(), vec!["broken  [not a cron]".to_string()]);
}

#[tokio::test]
async fn list_describes_entries() {
    let scheduler = Scheduler::new();

    scheduler.every(5).seconds().name("heartbeat").run(|| async {});
    scheduler.cron("0 3 * * *").name("backup").run(|| async {});
    scheduler.every_minute().run(|| async {});

    let list = scheduler.list();
    assert_eq!(list[0], "heartbeat  [5s]");
    assert_eq!(list[1], "backup  [0 3 * * *]");
    assert_eq!(list[2], "task-3  [60s]");
}
