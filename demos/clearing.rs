//! Clearing objects before reuse, and what happens when clearing fails

use gated_objectpool::{Clearable, ObjectPool, PoolConfiguration, PoolError};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Session {
    id: usize,
    scratch: Vec<String>,
    poisoned: bool,
}

impl Clearable for Session {
    type Error = String;

    fn clear(&mut self) -> Result<(), Self::Error> {
        if self.poisoned {
            return Err(format!("session {} is poisoned", self.id));
        }
        self.scratch.clear();
        Ok(())
    }
}

fn report(err: &PoolError) {
    println!("   Hook: {}", err);
}

fn main() {
    println!("=== Gated object pool - Clearing Examples ===\n");

    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    let pool = ObjectPool::new(
        || {
            Ok::<_, Infallible>(Session {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                scratch: Vec::new(),
                poisoned: false,
            })
        },
        PoolConfiguration::new()
            .with_max_pool_size(2)
            .with_clearing()
            .with_reclaim_failure_hook(report),
    )
    .unwrap();

    println!("1. Clean return:");
    {
        let mut session = pool.take().unwrap();
        session.scratch.push("temporary".to_string());
        println!("   Using session {} with {} scratch entries", session.id, session.scratch.len());
    }
    {
        let session = pool.take().unwrap();
        println!(
            "   Reused session {} with {} scratch entries\n",
            session.id,
            session.scratch.len()
        );
    }

    println!("2. Failed clear:");
    {
        let mut session = pool.take().unwrap();
        session.poisoned = true;
        println!("   Poisoning session {}", session.id);
    }
    println!("   Size after discard: {} of {}", pool.size(), pool.max_size());

    let session = pool.take().unwrap();
    println!("   Replacement session: {}", session.id);
}
