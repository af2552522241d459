//! Tests for single-flight loading, failure retry, and caching.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Notify;

use crate::Error;
use crate::Lazy;

const WASM_HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

/// Producer that counts invocations and blocks until `gate` is notified.
fn gated(calls: Arc<AtomicUsize>, gate: Arc<Notify>) -> Lazy<Arc<[u8]>, String> {
    Lazy::new(move || {
        let calls = calls.clone();
        let gate = gate.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            Ok(Arc::from(&WASM_HEADER[..]))
        }
    })
}

#[tokio::test]
async fn test_first_get_returns_produced_bytes() {
    let lazy: Lazy<Vec<u8>, String> = Lazy::new(|| async { Ok(WASM_HEADER.to_vec()) });

    assert_eq!(lazy.peek(), None);
    let bytes = lazy.get().await.unwrap();
    assert_eq!(bytes, WASM_HEADER.to_vec());
    assert_eq!(lazy.peek(), Some(WASM_HEADER.to_vec()));
}

#[tokio::test]
async fn test_resolved_value_is_never_recomputed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let lazy: Lazy<Vec<u8>, String> = Lazy::new(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(WASM_HEADER.to_vec())
        }
    });

    let first = lazy.get().await.unwrap();
    for _ in 0..10 {
        assert_eq!(lazy.get().await.unwrap(), first);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(lazy.attempts(), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let lazy = Arc::new(gated(calls.clone(), gate.clone()));

    let waiters: Vec<_> = (0..16)
        .map(|_| {
            let lazy = lazy.clone();
            tokio::spawn(async move { lazy.get().await })
        })
        .collect();

    // Let every waiter reach the in-flight attempt before releasing it.
    while !lazy.is_loading() {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(lazy.is_loading());
    gate.notify_one();

    for waiter in waiters {
        let bytes = waiter.await.unwrap().unwrap();
        assert_eq!(&bytes[..], &WASM_HEADER[..]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!lazy.is_loading());
}

#[tokio::test]
async fn test_concurrent_callers_share_one_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let counter = calls.clone();
    let release = gate.clone();
    let lazy: Arc<Lazy<u32, String>> = Arc::new(Lazy::new(move || {
        let counter = counter.clone();
        let release = release.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            release.notified().await;
            Err(format!("attempt {} failed", n))
        }
    }));

    let (a, b, c, _) = tokio::join!(lazy.get(), lazy.get(), lazy.get(), async {
        tokio::task::yield_now().await;
        gate.notify_one();
    });

    let expected = Error::Failed("attempt 0 failed".to_string());
    assert_eq!(a, Err(expected.clone()));
    assert_eq!(b, Err(expected.clone()));
    assert_eq!(c, Err(expected));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failure_is_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let lazy: Lazy<&'static str, String> = Lazy::new(move || {
        let counter = counter.clone();
        async move {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err("Failed to fetch wasm module".to_string()),
                _ => Ok("module"),
            }
        }
    });

    let err = lazy.get().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch wasm module");
    assert!(!lazy.is_loading());
    assert_eq!(lazy.peek(), None);

    assert_eq!(lazy.get().await.unwrap(), "module");
    assert_eq!(lazy.get().await.unwrap(), "module");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_panicking_producer_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let lazy: Lazy<u8, String> = Lazy::new(move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("boom");
            }
            Ok(7)
        }
    });

    match lazy.get().await {
        Err(Error::Panicked(msg)) => assert_eq!(msg, "boom"),
        other => panic!("Expected Panicked, got {:?}", other),
    }
    assert_eq!(lazy.get().await, Ok(7));
    assert_eq!(lazy.attempts(), 2);
}

#[tokio::test]
async fn test_attempt_survives_dropped_callers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let lazy = gated(calls.clone(), gate.clone());

    // Start an attempt, then give up on it.
    let abandoned = tokio::time::timeout(Duration::from_millis(10), lazy.get()).await;
    assert!(abandoned.is_err());
    assert!(lazy.is_loading());

    gate.notify_one();
    let bytes = lazy.get().await.unwrap();
    assert_eq!(&bytes[..], &WASM_HEADER[..]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
