use huginn_ratelimit::{Backend, MemoryBackend, RateLimitError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_load_creates_once_and_then_hits() -> TestResult {
    let backend: MemoryBackend<u64> =
        MemoryBackend::new(CancellationToken::new(), Duration::from_secs(60))?;

    let first = backend.load("client-a", || 1u64);
    let second = backend.load("client-a", || 2u64);

    assert_eq!(first, 1);
    assert_eq!(second, 1, "Live entry must be returned, factory must not run");

    let stats = backend.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(backend.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_loads_invoke_factory_once() -> TestResult {
    let backend: MemoryBackend<Arc<usize>> =
        MemoryBackend::new(CancellationToken::new(), Duration::from_secs(60))?;
    let calls = AtomicUsize::new(0);
    let workers = 16;
    let barrier = Barrier::new(workers);

    let values = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let backend = &backend;
                let calls = &calls;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    backend.load("shared", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Arc::new(i)
                    })
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| "worker panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "Factory must run exactly once");
    let first = &values[0];
    for value in &values {
        assert!(Arc::ptr_eq(first, value), "Every caller must observe the same value");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_value_live_within_ttl() -> TestResult {
    let backend: MemoryBackend<Option<i32>> =
        MemoryBackend::new(CancellationToken::new(), Duration::from_millis(500))?;
    backend.store("key", Some(10))?;

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(backend.load("key", || None), Some(10));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_value_absent_after_two_ttls() -> TestResult {
    let backend: MemoryBackend<Option<i32>> =
        MemoryBackend::new(CancellationToken::new(), Duration::from_millis(200))?;
    backend.store("key", Some(10))?;

    tokio::time::sleep(Duration::from_millis(450)).await;

    let calls = AtomicUsize::new(0);
    let value = backend.load("key", || {
        calls.fetch_add(1, Ordering::SeqCst);
        None
    });
    assert_eq!(value, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "Expired entry must trigger the factory");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sweeper_removes_expired_entries() -> TestResult {
    let backend: MemoryBackend<i32> =
        MemoryBackend::new(CancellationToken::new(), Duration::from_millis(100))?;
    for i in 0..50 {
        backend.store(&format!("key-{i}"), i)?;
    }
    assert_eq!(backend.len(), 50);

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(backend.is_empty(), "Sweeper should have dropped every expired entry");
    assert_eq!(backend.stats().evictions, 50);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_sweeper_leaves_lazy_expiry() -> TestResult {
    let cancel = CancellationToken::new();
    let backend: MemoryBackend<i32> =
        MemoryBackend::new(cancel.clone(), Duration::from_millis(100))?;
    cancel.cancel();

    backend.store("key", 1)?;
    tokio::time::sleep(Duration::from_millis(350)).await;

    // Not swept, still not visible
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.load("key", || 2), 2);
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.stats().evictions, 0);

    // Loads and stores keep working after cancellation
    backend.store("other", 3)?;
    assert_eq!(backend.load("other", || 4), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_store_overrides_live_value() -> TestResult {
    let backend: MemoryBackend<&str> =
        MemoryBackend::new(CancellationToken::new(), Duration::from_secs(60))?;

    backend.store("key", "v1")?;
    backend.store("key", "v2")?;

    assert_eq!(backend.load("key", || "factory"), "v2");
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.stats().stores, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_store_restarts_ttl() -> TestResult {
    let backend: MemoryBackend<i32> =
        MemoryBackend::new(CancellationToken::new(), Duration::from_millis(300))?;

    backend.store("key", 1)?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    backend.store("key", 2)?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(backend.load("key", || 0), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_manual_sweep_reports_removed() -> TestResult {
    let cancel = CancellationToken::new();
    let backend: MemoryBackend<i32> =
        MemoryBackend::new(cancel.clone(), Duration::from_millis(50))?;
    cancel.cancel();

    backend.store("a", 1)?;
    backend.store("b", 2)?;
    tokio::time::sleep(Duration::from_millis(80)).await;
    backend.store("c", 3)?;

    assert_eq!(backend.sweep(), 2);
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.load("c", || 0), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_factory_leaves_partition_usable() -> TestResult {
    let backend: MemoryBackend<u32> =
        MemoryBackend::new(CancellationToken::new(), Duration::from_secs(60))?;

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        backend.load("boom", || -> u32 { panic!("factory failed") })
    }));
    assert!(outcome.is_err());
    assert!(backend.is_empty(), "Nothing is inserted for the failed key");

    // Loads and stores keep working on the recovered partition
    assert_eq!(backend.load("boom", || 7), 7);
    for i in 0..100 {
        backend.store(&format!("key-{i}"), i)?;
    }
    assert_eq!(backend.len(), 101);
    assert_eq!(backend.load("key-42", || 0), 42);
    assert_eq!(backend.stats().stores, 100);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_loads_on_expired_key_invoke_factory_once() -> TestResult {
    let cancel = CancellationToken::new();
    let backend: MemoryBackend<Arc<usize>> =
        MemoryBackend::new(cancel.clone(), Duration::from_millis(50))?;
    // Keep the stale entry in the map so every racer sees it expired, not absent
    cancel.cancel();

    let stale = Arc::new(usize::MAX);
    backend.store("shared", Arc::clone(&stale))?;
    tokio::time::sleep(Duration::from_millis(70)).await;
    assert_eq!(backend.len(), 1);

    let calls = AtomicUsize::new(0);
    let workers = 16;
    let barrier = Barrier::new(workers);

    let values = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let backend = &backend;
                let calls = &calls;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    backend.load("shared", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        Arc::new(i)
                    })
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| "worker panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "Factory must run exactly once");
    let first = &values[0];
    assert!(!Arc::ptr_eq(first, &stale), "Expired value must not be returned");
    for value in &values {
        assert!(Arc::ptr_eq(first, value), "Every caller must observe the same value");
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_timing_rejected() {
    let zero_ttl = MemoryBackend::<u8>::new(CancellationToken::new(), Duration::ZERO);
    assert!(matches!(zero_ttl, Err(RateLimitError::Config(_))));

    let slow_sweep = MemoryBackend::<u8>::with_sweep_interval(
        CancellationToken::new(),
        Duration::from_secs(1),
        Duration::from_secs(2),
    );
    assert!(matches!(slow_sweep, Err(RateLimitError::Config(_))));

    let zero_sweep = MemoryBackend::<u8>::with_sweep_interval(
        CancellationToken::new(),
        Duration::from_secs(1),
        Duration::ZERO,
    );
    assert!(matches!(zero_sweep, Err(RateLimitError::Config(_))));
}

#[test]
fn test_requires_runtime() {
    let backend = MemoryBackend::<u8>::new(CancellationToken::new(), Duration::from_secs(1));
    assert!(matches!(backend, Err(RateLimitError::NoRuntime)));
}
