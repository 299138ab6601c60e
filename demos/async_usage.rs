//! Async usage examples

use gated_objectpool::{CancellationToken, ObjectPool, PoolConfiguration};
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== Gated object pool - Async Examples ===\n");

    // Example 1: Async take
    async_take().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Cancelling a wait
    async_with_cancel().await;

    // Example 4: Factory pool with warmup
    factory_warmup().await;

    // Example 5: Concurrent access
    concurrent_access().await;
}

async fn async_take() {
    println!("1. Async Take:");
    let pool = ObjectPool::fixed(vec![1, 2, 3], PoolConfiguration::default()).unwrap();

    {
        let obj = pool.take_async().await.unwrap();
        println!("   Got object asynchronously: {}", *obj);
    }

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");
    let pool = ObjectPool::fixed(vec![42], PoolConfiguration::default()).unwrap();

    // Get the only object
    let _obj = pool.take().unwrap();

    // Try to get another (should time out)
    match pool.take_timeout_async(Duration::from_millis(100)).await {
        Ok(_) => println!("   Got object"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn async_with_cancel() {
    println!("3. Async with Cancellation:");
    let pool = ObjectPool::fixed(vec![7], PoolConfiguration::default()).unwrap();
    let _obj = pool.take().unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    match pool.take_with_cancel_async(&token).await {
        Ok(_) => println!("   Got object"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn factory_warmup() {
    println!("4. Factory Pool with Warmup:");

    let pool = ObjectPool::new(
        || {
            println!("   Creating new object...");
            Ok::<_, Infallible>(42)
        },
        PoolConfiguration::new().with_max_pool_size(10),
    )
    .unwrap();

    println!("   Warming up pool with 5 objects...");
    let created = pool.warmup_async(5).await.unwrap();
    println!("   Created {}, available after warmup: {}", created, pool.available_count());

    // Get object (should not create a new one)
    {
        let obj = pool.take_async().await.unwrap();
        println!("   Got pre-created object: {}", *obj);
    }

    println!();
}

async fn concurrent_access() {
    println!("5. Concurrent Access:");

    let pool = ObjectPool::fixed(vec![1, 2, 3, 4, 5], PoolConfiguration::default()).unwrap();

    let mut handles = vec![];

    for i in 0..10 {
        let pool = pool.clone();
        let handle = tokio::spawn(async move {
            match pool.take_timeout_async(Duration::from_secs(1)).await {
                Ok(obj) => {
                    println!("   Task {} got object: {}", i, *obj);
                    sleep(Duration::from_millis(50)).await;
                }
                Err(e) => println!("   Task {} couldn't get object: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final available: {}", pool.available_count());
}
