//! Integration tests for the cover fetch pool

use async_trait::async_trait;
use bridge_traits::cover::{CoverRequest, CoverResolver};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use core_metadata::{CoverFetchConfig, CoverFetchPool, CoverJob, CoverOutcome, MetadataError};
use mockall::mock;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

mock! {
    pub Resolver {}

    #[async_trait::async_trait]
    impl CoverResolver for Resolver {
        async fn resolve(&self, request: &CoverRequest, destination: &Path) -> BridgeResult<()>;
    }
}

fn request(artist: &str, title: &str) -> CoverRequest {
    CoverRequest {
        artist: artist.to_string(),
        title: title.to_string(),
        ..Default::default()
    }
}

fn recording_job(
    tab_id: &str,
    request: CoverRequest,
    destination: PathBuf,
    outcomes: &Arc<Mutex<Vec<CoverOutcome>>>,
) -> CoverJob {
    let outcomes = Arc::clone(outcomes);
    CoverJob::new(tab_id, request, destination).on_complete(move |outcome| {
        Box::pin(async move {
            outcomes.lock().push(outcome);
        })
    })
}

/// Sleeps a little per lookup so jobs pile up in the queue.
struct SlowResolver {
    calls: AtomicUsize,
}

#[async_trait]
impl CoverResolver for SlowResolver {
    async fn resolve(&self, _request: &CoverRequest, destination: &Path) -> BridgeResult<()> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, b"jpeg").await?;
        Ok(())
    }
}

/// Blocks every lookup until the test hands out permits.
struct GatedResolver {
    started: Notify,
    gate: Semaphore,
}

#[async_trait]
impl CoverResolver for GatedResolver {
    async fn resolve(&self, _request: &CoverRequest, _destination: &Path) -> BridgeResult<()> {
        self.started.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        permit.forget();
        Ok(())
    }
}

#[tokio::test]
async fn test_success_and_failure_reach_callback() {
    let dir = tempfile::tempdir().unwrap();

    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .withf(|request, _| request.artist == "Oasis")
        .returning(|_, destination| {
            std::fs::write(destination, b"jpeg")?;
            Ok(())
        });
    resolver
        .expect_resolve()
        .withf(|request, _| request.artist == "Nobody")
        .returning(|_, _| Err(BridgeError::NotAvailable("no artwork".to_string())));

    let pool = CoverFetchPool::new(CoverFetchConfig::default(), Arc::new(resolver)).unwrap();
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let found = dir.path().join("covers").join("found.jpg");
    pool.submit(recording_job("found", request("Oasis", "Wonderwall"), found.clone(), &outcomes))
        .await
        .unwrap();
    pool.submit(recording_job(
        "missing",
        request("Nobody", "Silence"),
        dir.path().join("covers").join("missing.jpg"),
        &outcomes,
    ))
    .await
    .unwrap();

    pool.stop().await;

    let mut outcomes = outcomes.lock().clone();
    outcomes.sort_by(|a, b| a.tab_id.cmp(&b.tab_id));
    assert_eq!(outcomes.len(), 2);

    assert_eq!(outcomes[0].tab_id, "found");
    assert_eq!(outcomes[0].result_path.as_deref(), Some(found.as_path()));
    assert!(outcomes[0].error.is_none());
    assert!(found.exists());

    assert_eq!(outcomes[1].tab_id, "missing");
    assert!(outcomes[1].result_path.is_none());
    assert!(outcomes[1].error.as_deref().unwrap().contains("no artwork"));

    let stats = pool.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_stop_drains_queued_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = Arc::new(SlowResolver {
        calls: AtomicUsize::new(0),
    });

    let config = CoverFetchConfig::default()
        .with_workers(2)
        .with_queue_capacity(20);
    let pool = CoverFetchPool::new(config, resolver.clone()).unwrap();
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    for index in 0..10 {
        let tab_id = format!("tab-{}", index);
        let destination = dir.path().join(format!("{}.jpg", tab_id));
        pool.submit(recording_job(&tab_id, request("Artist", "Song"), destination, &outcomes))
            .await
            .unwrap();
    }

    pool.stop().await;

    assert_eq!(resolver.calls.load(Ordering::SeqCst), 10);
    assert_eq!(outcomes.lock().len(), 10);
    assert!(outcomes.lock().iter().all(CoverOutcome::is_success));
}

#[tokio::test]
async fn test_submit_async_drops_when_full() {
    let resolver = Arc::new(GatedResolver {
        started: Notify::new(),
        gate: Semaphore::new(0),
    });

    let config = CoverFetchConfig::default()
        .with_workers(1)
        .with_queue_capacity(1);
    let pool = CoverFetchPool::new(config, resolver.clone()).unwrap();
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let destination = PathBuf::from("unused.jpg");

    // Occupies the only worker
    assert!(pool.submit_async(recording_job("running", request("A", "1"), destination.clone(), &outcomes)));
    resolver.started.notified().await;

    // Fills the queue
    assert!(pool.submit_async(recording_job("queued", request("A", "2"), destination.clone(), &outcomes)));
    assert_eq!(pool.queued(), 1);

    // No room left
    assert!(!pool.submit_async(recording_job("dropped", request("A", "3"), destination.clone(), &outcomes)));
    assert_eq!(pool.stats().dropped, 1);

    resolver.gate.add_permits(10);
    pool.stop().await;

    let mut ids: Vec<String> = outcomes.lock().iter().map(|o| o.tab_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["queued".to_string(), "running".to_string()]);
}

#[tokio::test]
async fn test_blocked_submit_fails_when_pool_stops() {
    let resolver = Arc::new(GatedResolver {
        started: Notify::new(),
        gate: Semaphore::new(0),
    });

    let config = CoverFetchConfig::default()
        .with_workers(1)
        .with_queue_capacity(1);
    let pool = Arc::new(CoverFetchPool::new(config, resolver.clone()).unwrap());
    let destination = PathBuf::from("unused.jpg");

    pool.submit(CoverJob::new("running", request("A", "1"), destination.clone()))
        .await
        .unwrap();
    resolver.started.notified().await;
    pool.submit(CoverJob::new("queued", request("A", "2"), destination.clone()))
        .await
        .unwrap();

    let blocked = {
        let pool = Arc::clone(&pool);
        let destination = destination.clone();
        tokio::spawn(async move {
            pool.submit(CoverJob::new("blocked", request("A", "3"), destination))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!blocked.is_finished());

    let stopper = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.stop().await })
    };

    let result = blocked.await.unwrap();
    assert!(matches!(result, Err(MetadataError::PoolClosed)));

    resolver.gate.add_permits(10);
    stopper.await.unwrap();
    assert_eq!(pool.stats().submitted, 2);
}

#[tokio::test]
async fn test_stop_is_idempotent_and_rejects_new_jobs() {
    let resolver = MockResolver::new();
    let pool = CoverFetchPool::new(CoverFetchConfig::default(), Arc::new(resolver)).unwrap();
    assert!(pool.is_running());

    pool.stop().await;
    pool.stop().await;
    assert!(!pool.is_running());

    let err = pool
        .submit(CoverJob::new("late", request("A", "B"), PathBuf::from("late.jpg")))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::PoolClosed));
    assert!(!pool.submit_async(CoverJob::new("late", request("A", "B"), PathBuf::from("late.jpg"))));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let result = CoverFetchPool::new(
        CoverFetchConfig::default().with_workers(0),
        Arc::new(MockResolver::new()),
    );
    assert!(matches!(result, Err(MetadataError::InvalidConfig(_))));
}
