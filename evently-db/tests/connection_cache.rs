//! Connection cache under concurrent first use

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evently_db::config::{ConfigError, DatabaseConfig, PoolSettings};
use evently_db::db::{ConnectionCache, ConnectionError, Connector};

/// Fake transport: every successful connect returns a fresh handle
#[derive(Debug)]
struct FakeLink {
    serial: usize,
}

struct FakeConnector {
    calls: Arc<AtomicUsize>,
    fail_first: bool,
}

#[async_trait]
impl Connector for FakeConnector {
    type Handle = Arc<FakeLink>;

    async fn connect(&self, _config: &DatabaseConfig) -> Result<Arc<FakeLink>, ConnectionError> {
        let serial = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(50)).await;

        if self.fail_first && serial == 1 {
            return Err(ConnectionError::Unavailable("authentication rejected".into()));
        }
        Ok(Arc::new(FakeLink { serial }))
    }
}

fn cache(fail_first: bool) -> (Arc<ConnectionCache<FakeConnector>>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = DatabaseConfig::new("postgres://evently@localhost/evently", PoolSettings::default())
        .unwrap();
    let cache = ConnectionCache::new(
        config,
        FakeConnector {
            calls: Arc::clone(&calls),
            fail_first,
        },
    );
    (Arc::new(cache), calls)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn n_concurrent_first_callers_get_one_handle() {
    let (cache, calls) = cache(false);

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.acquire().await })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.attempts(), 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(handles[0].serial, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn n_concurrent_first_callers_share_one_failure_then_retry() {
    let (cache, calls) = cache(true);

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.acquire().await })
        })
        .collect();

    let mut failures = 0;
    for task in tasks {
        // Late starters may land on the retry; everyone else shares the first failure
        match task.await.unwrap() {
            Err(err) => {
                assert_eq!(err.to_string(), "database unavailable: authentication rejected");
                failures += 1;
            }
            Ok(handle) => assert_eq!(handle.serial, 2),
        }
    }
    assert!(failures >= 1);
    assert!(calls.load(Ordering::SeqCst) <= 2);

    // The failed attempt was forgotten, so the next caller reconnects
    let handle = cache.acquire().await.unwrap();
    assert_eq!(handle.serial, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_ready());
}

#[tokio::test]
async fn acquire_after_success_never_reconnects() {
    let (cache, calls) = cache(false);

    let first = cache.acquire().await.unwrap();
    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.acquire().await })
        })
        .collect();
    for task in tasks {
        assert!(Arc::ptr_eq(&task.await.unwrap().unwrap(), &first));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&cache.try_get().unwrap(), &first));
}

#[test]
fn missing_uri_fails_at_initialization() {
    let err = DatabaseConfig::from_lookup(|_| None, PoolSettings::default()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingDatabaseUrl));
    assert!(err.to_string().contains("DATABASE_URL"));
}
