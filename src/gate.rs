//! Capacity gate deciding whether another object may be created

use parking_lot::Mutex;

/// Counts live objects against the pool's maximum
///
/// This is the only lock in the pool. Creation reserves a slot under the lock
/// and runs the factory outside it; the reservation is rolled back unless the
/// caller commits it.
pub(crate) struct CapacityGate {
    size: Mutex<usize>,
    max_size: usize,
}

impl CapacityGate {
    pub fn new(size: usize, max_size: usize) -> Self {
        debug_assert!(size <= max_size);
        Self {
            size: Mutex::new(size),
            max_size,
        }
    }

    /// Claim a slot if the pool is below capacity
    pub fn try_reserve(&self) -> Option<Reservation<'_>> {
        let mut size = self.size.lock();
        if *size < self.max_size {
            *size += 1;
            Some(Reservation {
                gate: self,
                committed: false,
            })
        } else {
            None
        }
    }

    /// Give up the slot of an object that left the pool for good
    pub fn free(&self) -> usize {
        let mut size = self.size.lock();
        debug_assert!(*size > 0, "freed more slots than were taken");
        *size = size.saturating_sub(1);
        *size
    }

    pub fn size(&self) -> usize {
        *self.size.lock()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// A slot claimed from the gate for an object that is still being created
pub(crate) struct Reservation<'a> {
    gate: &'a CapacityGate,
    committed: bool,
}

impl Reservation<'_> {
    /// Keep the slot; the object now exists
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.gate.free();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_reserve_up_to_max() {
        let gate = CapacityGate::new(0, 2);
        gate.try_reserve().unwrap().commit();
        gate.try_reserve().unwrap().commit();
        assert!(gate.try_reserve().is_none());
        assert_eq!(gate.size(), 2);

        assert_eq!(gate.free(), 1);
        assert!(gate.try_reserve().is_some());
    }

    #[test]
    fn test_uncommitted_reservation_rolls_back() {
        let gate = CapacityGate::new(1, 2);
        {
            let _reservation = gate.try_reserve().unwrap();
            assert_eq!(gate.size(), 2);
        }
        assert_eq!(gate.size(), 1);
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_max() {
        let gate = Arc::new(CapacityGate::new(0, 16));
        let granted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let granted = Arc::clone(&granted);
                thread::spawn(move || {
                    for _ in 0..100 {
                        if let Some(reservation) = gate.try_reserve() {
                            reservation.commit();
                            granted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(granted.load(Ordering::Relaxed), 16);
        assert_eq!(gate.size(), 16);
    }
}
