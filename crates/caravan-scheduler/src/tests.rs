use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn submit_returns_a_result() {
    let scheduler = Scheduler::new(1);

    let mut future = scheduler.submit(|_token| async { Ok("done") });
    let result = timeout(Duration::from_secs(2), future.result())
        .await
        .expect("result should arrive");

    assert_eq!(result.expect("work should succeed"), "done");
    scheduler.close().await;
}

#[tokio::test]
async fn executes_multiple_work_items() {
    let scheduler = Scheduler::new(2);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut futures = Vec::new();
    for index in 0..3usize {
        let counter = counter.clone();
        futures.push(scheduler.submit(move |_token| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(index)
        }));
    }

    for (index, future) in futures.iter_mut().enumerate() {
        let value = timeout(Duration::from_secs(2), future.result())
            .await
            .expect("result should arrive")
            .expect("work should succeed");
        assert_eq!(value, index);
    }
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    scheduler.close().await;
}

#[tokio::test]
async fn serves_work_in_submission_order() {
    let scheduler = Scheduler::new(1);
    let (order_tx, mut order_rx) = mpsc::unbounded_channel();

    for index in 0..5usize {
        let order_tx = order_tx.clone();
        scheduler.submit(move |_token| async move {
            let _ = order_tx.send(index);
            Ok(())
        });
    }

    for expected in 0..5usize {
        let observed = timeout(Duration::from_secs(2), order_rx.recv())
            .await
            .expect("work should run")
            .expect("channel open");
        assert_eq!(observed, expected);
    }
    scheduler.close().await;
}

#[tokio::test]
async fn live_workers_never_exceed_pool_size() {
    let scheduler = Scheduler::new(2);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut futures = Vec::new();
    for _ in 0..6 {
        let running = running.clone();
        let peak = peak.clone();
        futures.push(scheduler.submit(move |_token| async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(30)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }));
    }

    for future in futures.iter_mut() {
        timeout(Duration::from_secs(2), future.result())
            .await
            .expect("result should arrive")
            .expect("work should succeed");
    }

    assert!(peak.load(Ordering::SeqCst) <= 2);
    scheduler.close().await;
}

#[tokio::test]
async fn cancels_work_through_its_future() {
    let scheduler = Scheduler::new(1);
    let started = Arc::new(Notify::new());

    let begin = started.clone();
    let mut future = scheduler.submit(move |token| async move {
        begin.notify_one();
        tokio::select! {
            _ = token.cancelled() => Err(WorkError::Canceled),
            _ = sleep(Duration::from_secs(5)) => Ok(()),
        }
    });

    started.notified().await;
    future.cancel();

    let result = timeout(Duration::from_secs(2), future.result())
        .await
        .expect("result should arrive");
    assert!(matches!(result, Err(WorkError::Canceled)));
    scheduler.close().await;
}

#[tokio::test]
async fn close_cancels_in_flight_work() {
    let scheduler = Scheduler::new(1);
    let started = Arc::new(Notify::new());

    let begin = started.clone();
    let mut future: WorkFuture<()> = scheduler.submit(move |token| async move {
        begin.notify_one();
        token.cancelled().await;
        Err(WorkError::Canceled)
    });

    started.notified().await;
    scheduler.close().await;

    let result = timeout(Duration::from_secs(2), future.result())
        .await
        .expect("result should arrive");
    assert!(matches!(result, Err(WorkError::Canceled)));
}

#[tokio::test]
async fn submit_after_close_is_canceled() {
    let scheduler = Scheduler::new(1);
    scheduler.close().await;

    let mut future = scheduler.submit(|_token| async { Ok("done") });
    let result = timeout(Duration::from_secs(1), future.result())
        .await
        .expect("result should be pre-filled");
    assert!(matches!(result, Err(WorkError::Canceled)));

    // Closing again is a no-op.
    scheduler.close().await;
}

#[tokio::test]
async fn close_waits_for_in_flight_work() {
    let scheduler = Arc::new(Scheduler::new(1));
    let started = Arc::new(Notify::new());
    let unblock = Arc::new(Notify::new());

    let begin = started.clone();
    let gate = unblock.clone();
    scheduler.submit(move |_token| async move {
        begin.notify_one();
        gate.notified().await;
        Ok(())
    });
    started.notified().await;

    let closer = scheduler.clone();
    let close_task = tokio::spawn(async move { closer.close().await });

    // The work is still blocked, so close must not have completed.
    sleep(Duration::from_millis(100)).await;
    assert!(!close_task.is_finished());

    unblock.notify_one();
    timeout(Duration::from_secs(2), close_task)
        .await
        .expect("close should finish")
        .expect("close task should not panic");
}

#[tokio::test]
async fn panicking_work_is_reported_and_pool_survives() {
    let scheduler = Scheduler::new(1);

    fn boom() -> Result<(), WorkError> {
        panic!("boom")
    }
    let mut future = scheduler.submit(|_token| async move { boom() });

    let err = timeout(Duration::from_secs(2), future.result())
        .await
        .expect("result should arrive")
        .expect_err("panic should surface as an error");
    let message = err.to_string();
    assert!(message.contains("worker panicked"), "got: {message}");
    assert!(message.contains("boom"), "got: {message}");

    // The pool keeps accepting and running work after a panic.
    let mut next = scheduler.submit(|_token| async { Ok(42) });
    let value = timeout(Duration::from_secs(2), next.result())
        .await
        .expect("result should arrive")
        .expect("work should succeed");
    assert_eq!(value, 42);
    scheduler.close().await;
}

#[tokio::test]
async fn canceled_future_resolves_within_bounded_time() {
    let scheduler = Scheduler::new(1);

    // Occupy the only worker so the second submission stays queued.
    let gate = Arc::new(Notify::new());
    let release = gate.clone();
    let mut blocker = scheduler.submit(move |token| async move {
        tokio::select! {
            _ = token.cancelled() => Err(WorkError::Canceled),
            _ = release.notified() => Ok(()),
        }
    });

    let mut queued = scheduler.submit(|token| async move {
        tokio::select! {
            _ = token.cancelled() => Err(WorkError::Canceled),
            _ = sleep(Duration::from_secs(5)) => Ok(()),
        }
    });
    queued.cancel();
    gate.notify_one();

    let result = timeout(Duration::from_secs(2), queued.result())
        .await
        .expect("canceled work should still resolve");
    assert!(matches!(result, Err(WorkError::Canceled)));

    blocker
        .result()
        .await
        .expect("blocking work should succeed");
    scheduler.close().await;
}
