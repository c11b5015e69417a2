//! Poller worker cancellation tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use deploylog::storage::store::{DeploymentStore, JsonStore};
use deploylog::sync::reconciler::Reconciler;
use deploylog::sync::syncer::Syncer;
use deploylog::workers::poller;

use crate::fakes::{run, FakeRunSource};

fn syncer(source: Arc<FakeRunSource>) -> (Arc<JsonStore>, Syncer) {
    let store = Arc::new(JsonStore::in_memory());
    let syncer = Syncer::new(Reconciler::new(store.clone(), source, 10));
    (store, syncer)
}

#[tokio::test]
async fn test_shutdown_during_initial_delay() {
    let source = FakeRunSource::new();
    source.set_runs(vec![run(1, "queued", None, 0)]);
    let (store, syncer) = syncer(source.clone());

    let finished = tokio::time::timeout(
        Duration::from_secs(5),
        poller::run(
            &poller::Options::default(),
            &syncer,
            |_| std::future::pending::<()>(),
            Box::pin(async {}),
        ),
    )
    .await;

    assert!(finished.is_ok(), "poller did not stop");
    assert!(source.requested_limits.lock().unwrap().is_empty());
    assert!(store.list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_after_passes() {
    let source = FakeRunSource::new();
    source.set_runs(vec![run(1, "queued", None, 0), run(2, "in_progress", None, 1)]);
    let (store, syncer) = syncer(source.clone());

    // Sleeps return at once; the third one signals shutdown and never returns
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let shutdown_tx = Arc::new(Mutex::new(Some(shutdown_tx)));
    let sleeps = Arc::new(AtomicUsize::new(0));
    let sleep_fn = {
        let sleeps = sleeps.clone();
        move |_: Duration| {
            let count = sleeps.fetch_add(1, Ordering::SeqCst) + 1;
            let trigger = if count >= 3 {
                shutdown_tx.lock().unwrap().take()
            } else {
                None
            };
            async move {
                if let Some(tx) = trigger {
                    let _ = tx.send(());
                    std::future::pending::<()>().await;
                }
            }
        }
    };

    let finished = tokio::time::timeout(
        Duration::from_secs(5),
        poller::run(
            &poller::Options::default(),
            &syncer,
            sleep_fn,
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        ),
    )
    .await;

    assert!(finished.is_ok(), "poller did not stop");
    assert_eq!(sleeps.load(Ordering::SeqCst), 3);
    assert_eq!(source.requested_limits.lock().unwrap().as_slice(), [10, 10]);
    assert_eq!(store.list_recent(10).await.unwrap().len(), 2);
    assert!(syncer.get_state().await.last_report.is_some());
}
