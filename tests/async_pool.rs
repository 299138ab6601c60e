//! Async checkout behavior

use gated_objectpool::{CancellationToken, ObjectPool, PoolConfiguration, PoolError};

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken as TaskCancellationToken;

fn numbered_pool(max_size: usize) -> ObjectPool<usize> {
    let counter = Arc::new(AtomicUsize::new(0));
    ObjectPool::new(
        move || Ok::<_, Infallible>(counter.fetch_add(1, Ordering::SeqCst)),
        PoolConfiguration::new().with_max_pool_size(max_size),
    )
    .unwrap()
}

#[tokio::test]
async fn test_async_take_until_exhausted() {
    let pool = numbered_pool(5);
    let mut held = Vec::new();
    for _ in 0..5 {
        held.push(pool.take_async().await.unwrap());
    }

    let err = pool.take_timeout_async(Duration::ZERO).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_fast_path_completes_on_first_poll() {
    let pool = numbered_pool(1);

    // A zero timeout only lets the future be polled once
    let obj = timeout(Duration::ZERO, pool.take_async())
        .await
        .expect("fast path must not suspend")
        .unwrap();
    assert_eq!(*obj, 0);

    drop(obj);
    let obj = timeout(Duration::ZERO, pool.take_async()).await.unwrap().unwrap();
    assert_eq!(*obj, 0);
}

#[tokio::test]
async fn test_waiting_task_gets_released_object() {
    let pool = numbered_pool(1);
    let first = pool.take_async().await.unwrap();

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move { *waiter_pool.take_async().await.unwrap() });

    sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    drop(first);
    assert_eq!(waiter.await.unwrap(), 0);
}

#[tokio::test]
async fn test_async_cancel() {
    let pool = numbered_pool(1);
    let _held = pool.take().unwrap();
    let token = CancellationToken::new();

    let waiter_pool = pool.clone();
    let waiter_token = token.clone();
    let waiter = tokio::spawn(async move {
        waiter_pool
            .take_with_cancel_async(&waiter_token)
            .await
            .map(|obj| *obj)
    });

    sleep(Duration::from_millis(20)).await;
    token.cancel();
    assert!(matches!(waiter.await.unwrap(), Err(PoolError::Cancelled)));
}

#[tokio::test]
async fn test_async_timeout_with_cancel() {
    let pool = numbered_pool(1);
    let _held = pool.take().unwrap();
    let token = CancellationToken::new();

    let err = pool
        .take_timeout_with_cancel_async(Duration::from_millis(20), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Timeout(_)));

    token.cancel();
    let err = pool
        .take_timeout_with_cancel_async(Duration::from_secs(5), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Cancelled));
}

#[tokio::test]
async fn test_tokio_token_cancels_wait() {
    let pool = numbered_pool(1);
    let held = pool.take().unwrap();
    let token = TaskCancellationToken::new();

    let waiter_pool = pool.clone();
    let waiter_token = token.clone();
    let waiter = tokio::spawn(async move {
        waiter_pool
            .take_until_cancelled_async(&waiter_token)
            .await
            .map(|obj| *obj)
    });

    sleep(Duration::from_millis(20)).await;
    token.cancel();
    assert!(matches!(waiter.await.unwrap(), Err(PoolError::Cancelled)));

    drop(held);
    let obj = pool.take_timeout_async(Duration::from_secs(1)).await.unwrap();
    assert_eq!(*obj, 0);
    assert_eq!(pool.size(), 1);
}

#[tokio::test]
async fn test_tokio_token_prefers_idle_object() {
    let pool = numbered_pool(1);
    let token = TaskCancellationToken::new();
    token.cancel();

    let obj = pool.take_until_cancelled_async(&token).await.unwrap();
    assert_eq!(*obj, 0);

    let err = pool
        .take_timeout_until_cancelled_async(Duration::from_secs(5), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Cancelled));
}

#[tokio::test]
async fn test_tokio_token_wait_times_out() {
    let pool = numbered_pool(1);
    let _held = pool.take().unwrap();
    let token = TaskCancellationToken::new();

    let err = pool
        .take_timeout_until_cancelled_async(Duration::from_millis(20), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Timeout(_)));
}

#[tokio::test]
async fn test_factory_panic_in_waiting_task_propagates() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pool = ObjectPool::new(
        move || {
            if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                panic!("factory blew up");
            }
            Ok::<_, Infallible>(0)
        },
        PoolConfiguration::new().with_max_pool_size(1),
    )
    .unwrap();

    let held = pool.take().unwrap();
    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move { waiter_pool.take_async().await.map(|obj| *obj) });

    sleep(Duration::from_millis(50)).await;
    held.detach();

    let err = waiter.await.unwrap_err();
    assert!(err.is_panic());
    assert_eq!(pool.size(), 0);
}

#[tokio::test]
async fn test_warmup_async_propagates_factory_panic() {
    let pool = ObjectPool::new(
        || -> Result<usize, Infallible> { panic!("factory blew up") },
        PoolConfiguration::new().with_max_pool_size(2),
    )
    .unwrap();

    let warmup_pool = pool.clone();
    let err = tokio::spawn(async move { warmup_pool.warmup_async(2).await })
        .await
        .unwrap_err();
    assert!(err.is_panic());
    assert_eq!(pool.size(), 0);
}

#[tokio::test]
async fn test_abandoned_wait_loses_nothing() {
    let pool = numbered_pool(1);
    let held = pool.take().unwrap();

    assert!(timeout(Duration::from_millis(20), pool.take_async()).await.is_err());

    drop(held);
    let obj = pool.take_timeout_async(Duration::from_secs(1)).await.unwrap();
    assert_eq!(*obj, 0);
    assert_eq!(pool.size(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_tasks_take_distinct_objects() {
    const MAX: usize = 100;
    let counter = Arc::new(AtomicUsize::new(0));
    let pool = ObjectPool::with_initial(
        move || Ok::<_, Infallible>(1_000 + counter.fetch_add(1, Ordering::SeqCst)),
        0..MAX / 10,
        PoolConfiguration::new().with_max_pool_size(MAX),
    )
    .unwrap();

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let mut held = Vec::new();
                for _ in 0..MAX / 5 {
                    held.push(pool.take_async().await.unwrap());
                }
                held
            })
        })
        .collect();

    let mut distinct = HashSet::new();
    let mut held = Vec::new();
    for task in tasks {
        for obj in task.await.unwrap() {
            assert!(distinct.insert(*obj));
            held.push(obj);
        }
    }

    assert_eq!(distinct.len(), MAX);
    assert_eq!(pool.get_metrics().total_created, 90);
}
