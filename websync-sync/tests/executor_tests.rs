use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use websync_sync::BoundedExecutor;

#[tokio::test(start_paused = true)]
async fn never_exceeds_the_ceiling() {
    let executor = BoundedExecutor::new(3);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let results = executor
        .run_all((0..20).map(|i| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                i
            }
        }))
        .await;

    assert_eq!(results, (0..20).collect::<Vec<_>>());
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(executor.in_flight(), 0);
}

#[tokio::test]
async fn try_run_all_reports_first_error_after_all_settle() {
    let executor = BoundedExecutor::new(2);
    let finished = Arc::new(AtomicUsize::new(0));

    let result: Result<Vec<usize>, String> = executor
        .try_run_all((0..5).map(|i| {
            let finished = finished.clone();
            async move {
                finished.fetch_add(1, Ordering::SeqCst);
                if i == 1 { Err(format!("task {i} failed")) } else { Ok(i) }
            }
        }))
        .await;

    assert_eq!(result, Err("task 1 failed".to_string()));
    assert_eq!(finished.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn zero_limit_is_raised_to_one() {
    assert_eq!(BoundedExecutor::new(0).limit(), 1);
}

#[tokio::test(start_paused = true)]
async fn drain_waits_for_in_flight_tasks() {
    let executor = BoundedExecutor::new(2);
    let background = executor.clone();
    let task = tokio::spawn(async move {
        background
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await;
    });
    tokio::task::yield_now().await;
    assert_eq!(executor.in_flight(), 1);

    assert!(!executor.drain(Duration::from_millis(10)).await);
    assert!(executor.drain(Duration::from_millis(100)).await);
    task.await.unwrap();
}
