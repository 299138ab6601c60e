//! Basic usage examples for ObjectPool

use gated_objectpool::{ObjectPool, PoolConfiguration};
use std::convert::Infallible;
use std::time::Duration;

fn main() {
    println!("=== Gated object pool - Basic Examples ===\n");

    // Example 1: Fixed pool with integers
    fixed_pool();

    // Example 2: Pool with a factory
    factory_pool();

    // Example 3: Non-waiting and timed takes
    try_methods();

    // Example 4: Metrics
    metrics();
}

fn fixed_pool() {
    println!("1. Fixed Pool:");
    let pool = ObjectPool::fixed(vec![1, 2, 3], PoolConfiguration::default()).unwrap();

    {
        let obj = pool.take().unwrap();
        println!("   Got object: {}", *obj);
        // Object automatically returned when dropped
    }

    println!("   Available after return: {}\n", pool.available_count());
}

fn factory_pool() {
    println!("2. Factory Pool:");

    let config = PoolConfiguration::new().with_max_pool_size(5);
    let pool =
        ObjectPool::new(|| Ok::<_, Infallible>(Vec::<u8>::with_capacity(4096)), config).unwrap();

    {
        let _obj1 = pool.take().unwrap();
        let _obj2 = pool.take().unwrap();
        println!("   Size: {} of {}", pool.size(), pool.max_size());
        println!("   Active objects: {}", pool.active_count());
    }

    println!("   After return - Available: {}\n", pool.available_count());
}

fn try_methods() {
    println!("3. Try Methods:");
    let pool = ObjectPool::fixed(vec![42], PoolConfiguration::default()).unwrap();

    // Get the only object
    let obj1 = pool.try_take().unwrap();
    assert!(obj1.is_some());
    println!("   First try: Success");

    // Try again while object is checked out
    let obj2 = pool.try_take().unwrap();
    assert!(obj2.is_none());
    println!("   Second try: None (pool exhausted)");

    match pool.take_timeout(Duration::from_millis(10)) {
        Ok(_) => println!("   Timed take: Success"),
        Err(e) => println!("   Timed take: {}", e),
    }

    drop(obj1); // Return object

    // Try again after return
    let obj3 = pool.try_take().unwrap();
    assert!(obj3.is_some());
    println!("   Third try: Success\n");
}

fn metrics() {
    println!("4. Metrics:");
    let pool = ObjectPool::fixed(vec![1, 2, 3, 4, 5], PoolConfiguration::default()).unwrap();

    {
        let _obj1 = pool.take().unwrap();
        let _obj2 = pool.take().unwrap();

        let metrics = pool.get_metrics();
        println!("   Utilization: {:.1}%", metrics.utilization * 100.0);
        println!("   Active: {}, Available: {}", metrics.active_objects, metrics.available_objects);
    }

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
