// Gated object pool demo binary
// Run examples with: cargo run --example basic

use std::convert::Infallible;
use std::time::Duration;

use gated_objectpool::{ObjectPool, PoolConfiguration};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Gated object pool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let pool = match ObjectPool::new(
        || Ok::<_, Infallible>(String::from("connection")),
        PoolConfiguration::new().with_max_pool_size(1),
    ) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("  Could not build pool: {}", e);
            return;
        }
    };

    {
        let obj = pool.take().expect("an empty pool below capacity creates an object");
        println!("  Got object: {}", *obj);

        match pool.take_timeout(Duration::from_millis(10)) {
            Ok(_) => println!("  Unexpectedly got a second object"),
            Err(e) => println!("  Second take while full: {}", e),
        }
    }

    println!("  Available after return: {}", pool.available_count());
}
