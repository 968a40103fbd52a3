use super::{ActorError, ActorHandle, CounterActor, LimiterActor};
use crate::store::{KvStore, MemoryStore, StoreError};
use async_trait::async_trait;
use pacekeeper::PacerConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

fn fixed_clock(ms: u64) -> Arc<dyn Fn() -> SystemTime + Send + Sync> {
    Arc::new(move || UNIX_EPOCH + Duration::from_millis(ms))
}

/// Store whose reads block until released
struct SlowStore {
    release: Arc<Notify>,
    result: Result<Option<String>, StoreError>,
}

#[async_trait]
impl KvStore for SlowStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        self.release.notified().await;
        self.result.clone()
    }

    async fn put(&self, _key: &str, _value: String) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store that cannot be reached at all
struct DownStore;

#[async_trait]
impl KvStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    async fn put(&self, _key: &str, _value: String) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }
}

/// Store that reads fine but cannot be written
struct ReadOnlyStore;

#[async_trait]
impl KvStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(Some("3".to_string()))
    }

    async fn put(&self, _key: &str, _value: String) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_limiter_burst_scenario() {
    let handle =
        LimiterActor::spawn_with_clock("A", PacerConfig::default(), 100, fixed_clock(0));

    let first = handle.admit(true).await.unwrap();
    assert_eq!(first.next_allowed_ms, 10);
    assert_eq!(first.wait, Duration::ZERO);

    let mut last = first;
    for _ in 1..2001 {
        last = handle.admit(true).await.unwrap();
    }
    assert_eq!(last.next_allowed_ms, 20_010);
    assert_eq!(last.wait, Duration::from_millis(10));
}

#[tokio::test]
async fn test_limiter_peek_does_not_consume() {
    let handle =
        LimiterActor::spawn_with_clock("A", PacerConfig::default(), 100, fixed_clock(1_000));

    let peek = handle.admit(false).await.unwrap();
    assert_eq!(peek.next_allowed_ms, 1_000);
    let consumed = handle.admit(true).await.unwrap();
    assert_eq!(consumed.next_allowed_ms, 1_010);
}

#[tokio::test]
async fn test_limiter_serializes_concurrent_callers() {
    let handle =
        LimiterActor::spawn_with_clock("shared", PacerConfig::default(), 1_000, fixed_clock(0));

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move { h.admit(true).await }));
    }

    let mut deadlines = Vec::new();
    for task in tasks {
        deadlines.push(task.await.unwrap().unwrap().next_allowed_ms);
    }
    deadlines.sort_unstable();

    // Every caller observed a distinct step of the same deadline
    let expected: Vec<u64> = (1..=100).map(|n| n * 10).collect();
    assert_eq!(deadlines, expected);
}

#[tokio::test]
async fn test_limiter_keys_are_independent() {
    let uploads =
        LimiterActor::spawn_with_clock("uploads", PacerConfig::default(), 10, fixed_clock(0));
    let downloads =
        LimiterActor::spawn_with_clock("downloads", PacerConfig::default(), 10, fixed_clock(0));

    for _ in 0..5 {
        uploads.admit(true).await.unwrap();
    }
    let admission = downloads.admit(true).await.unwrap();
    assert_eq!(admission.next_allowed_ms, 10);
}

#[tokio::test]
async fn test_limiter_invalid_config_fails_every_request() {
    let config = PacerConfig {
        unit_cost: Duration::ZERO,
        grace_period: Duration::from_secs(1),
    };
    let handle = LimiterActor::spawn("broken", config, 10);

    let err = handle.admit(true).await.unwrap_err();
    assert!(
        matches!(&err, ActorError::Initialization(msg) if msg.contains("unit cost")),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_limiter_shutdown_makes_handle_stale() {
    let handle = LimiterActor::spawn("A", PacerConfig::default(), 10);
    handle.admit(true).await.unwrap();

    handle.shutdown().await;
    let err = handle.admit(true).await.unwrap_err();
    assert!(matches!(err, ActorError::Unavailable(_)));
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_limiter_evictable_only_after_backlog_drains() {
    let now_ms = Arc::new(AtomicU64::new(10_000));
    let clock = {
        let now_ms = Arc::clone(&now_ms);
        Arc::new(move || UNIX_EPOCH + Duration::from_millis(now_ms.load(Ordering::SeqCst)))
    };
    let config = PacerConfig {
        unit_cost: Duration::from_millis(500),
        grace_period: Duration::ZERO,
    };
    let handle = LimiterActor::spawn_with_clock("A", config, 10, clock);

    assert!(handle.can_evict());
    handle.admit(true).await.unwrap();
    handle.admit(true).await.unwrap();
    assert!(!handle.can_evict());

    now_ms.store(10_999, Ordering::SeqCst);
    assert!(!handle.can_evict());

    now_ms.store(11_000, Ordering::SeqCst);
    assert!(handle.can_evict());
}

#[tokio::test]
async fn test_counter_defaults_to_zero_when_absent() {
    let handle = CounterActor::spawn("A", Arc::new(MemoryStore::new()), 10);
    assert_eq!(handle.get().await.unwrap(), 0);
}

#[tokio::test]
async fn test_counter_loads_and_persists() {
    let store = Arc::new(MemoryStore::new());
    store.put("A/value", "41".to_string()).await.unwrap();

    let handle = CounterActor::spawn("A", store.clone(), 10);
    assert_eq!(handle.get().await.unwrap(), 41);
    assert_eq!(handle.increment(1).await.unwrap(), 42);
    assert_eq!(store.get("A/value").await.unwrap(), Some("42".to_string()));

    // A fresh instance picks up the persisted value
    handle.shutdown().await;
    let reloaded = CounterActor::spawn("A", store, 10);
    assert_eq!(reloaded.get().await.unwrap(), 42);
}

#[tokio::test]
async fn test_counter_requests_wait_for_initialization() {
    let release = Arc::new(Notify::new());
    let store = Arc::new(SlowStore {
        release: release.clone(),
        result: Ok(Some("5".to_string())),
    });
    let handle = CounterActor::spawn("slow", store, 10);

    // Queue requests while the load is still pending
    let early_get = {
        let h = handle.clone();
        tokio::spawn(async move { h.get().await })
    };
    let early_increment = {
        let h = handle.clone();
        tokio::spawn(async move { h.increment(2).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!early_get.is_finished());

    release.notify_one();

    let seen = early_get.await.unwrap().unwrap();
    let incremented = early_increment.await.unwrap().unwrap();
    // Whatever the order, both observed the loaded value, never the default
    assert!(seen == 5 || seen == 7);
    assert_eq!(incremented, 7);
    assert_eq!(handle.get().await.unwrap(), 7);
}

#[tokio::test]
async fn test_counter_initialization_failure_reaches_every_queued_caller() {
    let release = Arc::new(Notify::new());
    let store = Arc::new(SlowStore {
        release: release.clone(),
        result: Err(StoreError::Unavailable("connection refused".to_string())),
    });
    let handle = CounterActor::spawn("down", store, 10);

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move { h.get().await }));
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    release.notify_one();

    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(
            matches!(&err, ActorError::Initialization(msg) if msg.contains("connection refused")),
            "unexpected error: {err:?}"
        );
    }

    // The failed instance stops accepting work but keeps reporting why
    let late = handle.get().await.unwrap_err();
    assert!(matches!(late, ActorError::Initialization(_)), "{late:?}");
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_counter_corrupt_value_is_an_initialization_failure() {
    let store = Arc::new(MemoryStore::new());
    store.put("A/value", "forty-two".to_string()).await.unwrap();

    let handle = CounterActor::spawn("A", store, 10);
    let err = handle.get().await.unwrap_err();
    assert!(
        matches!(&err, ActorError::Initialization(msg) if msg.contains("forty-two")),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_counter_failed_write_keeps_value() {
    let handle = CounterActor::spawn("A", Arc::new(ReadOnlyStore), 10);

    let err = handle.increment(1).await.unwrap_err();
    assert!(matches!(err, ActorError::Store(StoreError::Unavailable(_))));
    assert_eq!(handle.get().await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counter_late_caller_sees_initialization_failure() {
    let handle = CounterActor::spawn("down", Arc::new(DownStore), 10);

    // Setup fails on another worker before anyone asks
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.is_closed());

    for _ in 0..3 {
        let err = handle.get().await.unwrap_err();
        assert!(
            matches!(&err, ActorError::Initialization(msg) if msg.contains("store offline")),
            "unexpected error: {err:?}"
        );
        let err = handle.increment(1).await.unwrap_err();
        assert!(matches!(err, ActorError::Initialization(_)), "{err:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_limiter_late_caller_sees_initialization_failure() {
    let config = PacerConfig {
        unit_cost: Duration::ZERO,
        grace_period: Duration::from_secs(1),
    };
    let handle = LimiterActor::spawn("broken", config, 10);

    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = handle.admit(true).await.unwrap_err();
    assert!(matches!(err, ActorError::Initialization(_)), "{err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_never_lose_setup_failure() {
    let handle = CounterActor::spawn("down", Arc::new(DownStore), 4);

    // Some callers race the failing setup, the rest arrive after it
    let mut tasks = Vec::new();
    for _ in 0..200 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move { h.get().await }));
    }

    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(
            matches!(&err, ActorError::Initialization(msg) if msg.contains("store offline")),
            "unexpected error: {err:?}"
        );
    }
}

#[tokio::test]
async fn test_shutdown_without_failure_reports_unavailable() {
    let handle = CounterActor::spawn("A", Arc::new(MemoryStore::new()), 10);
    handle.get().await.unwrap();

    handle.shutdown().await;
    let err = handle.get().await.unwrap_err();
    assert!(matches!(err, ActorError::Unavailable(_)), "{err:?}");
}
