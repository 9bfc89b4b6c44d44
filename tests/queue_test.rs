//! Integration tests for serialized execution through a queue.

use serialq::timeline::Timeline;
use serialq::{Error, QueueState, SerialQueue};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout};

#[derive(Debug, PartialEq, thiserror::Error)]
enum CommandError {
    #[error("target closed")]
    TargetClosed,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Queue(#[from] Error),
    #[error("command failed: {0}")]
    Command(String),
}

// ---------------------------------------------------------------------------
// Mutual exclusion
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_items_never_overlap() {
    let queue = Arc::new(SerialQueue::new());
    let timeline = Arc::new(Timeline::new());
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    for i in 0..24u64 {
        let queue = Arc::clone(&queue);
        let timeline = Arc::clone(&timeline);
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        tasks.spawn(async move {
            queue
                .enqueue(|| {
                    timeline.measure(format!("item-{i}"), async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(1 + i % 3)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                })
                .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    assert_eq!(timeline.intervals().len(), 24);
    assert!(
        timeline.overlapping_pairs().is_empty(),
        "overlaps: {:?}",
        timeline.overlapping_pairs()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_items_take_at_least_the_sum_of_their_durations() {
    let queue = Arc::new(SerialQueue::new());
    let started = Instant::now();

    let mut tasks = JoinSet::new();
    for ms in [50u64, 10, 30] {
        let queue = Arc::clone(&queue);
        tasks.spawn(async move {
            queue
                .enqueue(|| tokio::time::sleep(Duration::from_millis(ms)))
                .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    assert!(
        started.elapsed() >= Duration::from_millis(90),
        "finished in {:?}, items ran in parallel",
        started.elapsed()
    );
}

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn value_and_unit_results_pass_through() {
    let queue = SerialQueue::new();

    let reply = queue.enqueue(|| async { 42 }).await.unwrap();
    assert_eq!(reply, 42);

    let () = queue.enqueue(|| async {}).await.unwrap();
}

#[tokio::test]
async fn work_error_reaches_caller_and_queue_stays_usable() {
    let queue = SerialQueue::new();

    let failed = queue
        .enqueue(|| async { Err::<u32, _>(CommandError::TargetClosed) })
        .await
        .unwrap();
    assert_eq!(failed, Err(CommandError::TargetClosed));

    let next = queue
        .enqueue(|| async { Ok::<_, CommandError>(7) })
        .await
        .unwrap();
    assert_eq!(next, Ok(7));
    assert_eq!(queue.state(), QueueState::Open);
}

#[tokio::test]
async fn try_enqueue_folds_both_error_kinds() {
    let queue = SerialQueue::new();

    let ok: Result<&str, AppError> = queue.try_enqueue(|| async { Ok("done") }).await;
    assert_eq!(ok.unwrap(), "done");

    let failed: Result<(), AppError> = queue
        .try_enqueue(|| async { Err(AppError::Command("Page.navigate".to_string())) })
        .await;
    assert!(matches!(failed, Err(AppError::Command(ref m)) if m == "Page.navigate"));

    queue.dispose_async().await;

    let rejected: Result<(), AppError> = queue.try_enqueue(|| async { Ok(()) }).await;
    assert!(matches!(rejected, Err(AppError::Queue(Error::Disposed))));
}

// ---------------------------------------------------------------------------
// Release on every exit path
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_work_releases_the_lock() {
    let queue = Arc::new(SerialQueue::new());

    let panicked = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            queue
                .enqueue(|| async {
                    panic!("work item blew up");
                })
                .await
        })
    };
    let joined = panicked.await;
    assert!(joined.unwrap_err().is_panic());

    let after = timeout(Duration::from_secs(1), queue.enqueue(|| async { "still serving" }))
        .await
        .expect("lock leaked by panicking work item");
    assert_eq!(after.unwrap(), "still serving");
}

#[tokio::test]
async fn cancelled_work_releases_the_lock() {
    let queue = SerialQueue::new();

    let cancelled = timeout(
        Duration::from_millis(20),
        queue.enqueue(|| tokio::time::sleep(Duration::from_secs(30))),
    )
    .await;
    assert!(cancelled.is_err(), "long work item should have timed out");

    let after = timeout(Duration::from_secs(1), queue.enqueue(|| async { 1 }))
        .await
        .expect("lock leaked by cancelled work item");
    assert_eq!(after.unwrap(), 1);
}

#[tokio::test]
async fn cancelled_waiter_does_not_block_later_callers() {
    let queue = Arc::new(SerialQueue::new());
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();

    let holder = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            queue
                .enqueue(|| async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                })
                .await
        })
    };
    started_rx.await.unwrap();

    // Gives up while parked behind the holder.
    let gave_up = timeout(Duration::from_millis(20), queue.enqueue(|| async {})).await;
    assert!(gave_up.is_err());

    release_tx.send(()).unwrap();
    holder.await.unwrap().unwrap();

    let after = timeout(Duration::from_secs(1), queue.enqueue(|| async { "next" }))
        .await
        .expect("abandoned waiter kept the lock");
    assert_eq!(after.unwrap(), "next");
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

#[test]
fn new_queue_is_open_with_unique_id() {
    let a = SerialQueue::new();
    let b = SerialQueue::default();

    assert_eq!(a.state(), QueueState::Open);
    assert!(!a.is_disposed());
    assert_ne!(a.id(), b.id());
    assert_eq!(a.id().to_string().len(), 8);

    let debug = format!("{a:?}");
    assert!(debug.contains("SerialQueue"));
    assert!(debug.contains("Open"));
}
