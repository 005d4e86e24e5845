mod common;

use std::time::Duration;

use common::{harness, scraped};
use job_alert::{spawn_worker, ListingStore, Sweeper, Task, WorkQueue};

#[tokio::test]
async fn sweep_visits_each_subscribed_location_once() {
    let h = harness().await;
    h.store
        .upsert_subscriber("a@example.com", &["L".to_string(), "M".to_string()])
        .await
        .unwrap();
    h.store
        .upsert_subscriber("b@example.com", &["L".to_string()])
        .await
        .unwrap();

    let report = Sweeper::new(h.engine.clone()).run_sweep().await.unwrap();

    assert_eq!(report.locations(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(h.fetcher.calls(), vec!["L".to_string(), "M".to_string()]);
}

#[tokio::test]
async fn sweep_continues_after_failing_location() {
    let h = harness().await;
    h.fetcher.fail_on("L");
    h.fetcher.set("M", vec![scraped("m-job", "M")]);
    h.store
        .upsert_subscriber("a@example.com", &["L".to_string(), "M".to_string()])
        .await
        .unwrap();

    let report = Sweeper::new(h.engine.clone()).run_sweep().await.unwrap();

    assert_eq!(report.failed, vec!["L".to_string()]);
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].location, "M");
    assert_eq!(
        h.mailer.sent_to("a@example.com"),
        vec![vec!["m-job".to_string()]]
    );
}

#[tokio::test]
async fn sweep_with_no_subscribers_is_noop() {
    let h = harness().await;

    let report = Sweeper::new(h.engine.clone()).run_sweep().await.unwrap();

    assert_eq!(report.locations(), 0);
    assert!(h.fetcher.calls().is_empty());
}

#[tokio::test]
async fn worker_processes_submitted_locations_in_order() {
    let h = harness().await;
    h.fetcher.set("L", vec![scraped("l-job", "L")]);
    h.store
        .upsert_subscriber("a@example.com", &["L".to_string()])
        .await
        .unwrap();

    let (queue, receiver) = WorkQueue::new(8);
    let worker = spawn_worker(h.engine.clone(), receiver);

    assert!(queue.submit(Task::ProcessLocation("L".into())));
    assert!(queue.submit(Task::ProcessLocation("missing".into())));
    drop(queue);

    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(h.fetcher.calls(), vec!["L".to_string(), "missing".to_string()]);
    assert_eq!(h.mailer.sent_to("a@example.com").len(), 1);
}
