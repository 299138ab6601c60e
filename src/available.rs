//! Holding area for objects that are not checked out
//!
//! Objects travel through an unbounded crossbeam channel, so returning one
//! never blocks; capacity is enforced by the gate, not here. Waiters select on
//! the object channel, a vacancy channel and any cancellation signals.

use std::time::Instant;

use crossbeam::channel::{self, Receiver, Select, Sender, TryRecvError};

use crate::cancellation::CancellationToken;

/// Why a wait on the available set ended
#[derive(Debug)]
pub(crate) enum Wake<T> {
    /// An object was handed over
    Object(T),

    /// A capacity slot was freed; the waiter may be able to create an object
    Vacancy,

    TimedOut,

    Cancelled,
}

pub(crate) struct AvailableSet<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    vacancy_sender: Sender<()>,
    vacancy_receiver: Receiver<()>,
}

impl<T> AvailableSet<T> {
    /// Create an empty set. At most `max_size` vacancy notices are kept pending.
    pub fn new(max_size: usize) -> Self {
        let (sender, receiver) = channel::unbounded();
        let (vacancy_sender, vacancy_receiver) = channel::bounded(max_size.max(1));
        Self {
            sender,
            receiver,
            vacancy_sender,
            vacancy_receiver,
        }
    }

    pub fn put(&self, object: T) {
        // Both halves live in `self`, so the channel cannot be disconnected
        let _ = self.sender.send(object);
    }

    pub fn try_take(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(object) => Some(object),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wake one waiter so it can retry creating an object
    pub fn notify_vacancy(&self) {
        // A full queue already has enough pending notices to wake every slot
        let _ = self.vacancy_sender.try_send(());
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Wait for an object until `deadline` (forever when `None`) or until any
    /// of `signals` is cancelled
    ///
    /// A deadline that has already passed makes this a single non-blocking
    /// attempt. An object is only ever removed when it is the operation that
    /// completes, so a cancellation racing with a return never loses it.
    pub fn wait(&self, deadline: Option<Instant>, signals: &[&CancellationToken]) -> Wake<T> {
        if signals.iter().any(|signal| signal.is_cancelled()) {
            return Wake::Cancelled;
        }

        let mut select = Select::new();
        let object_index = select.recv(&self.receiver);
        let vacancy_index = select.recv(&self.vacancy_receiver);
        for signal in signals {
            select.recv(signal.signal());
        }

        let operation = match deadline {
            Some(deadline) => match select.select_deadline(deadline) {
                Ok(operation) => operation,
                Err(_) => return Wake::TimedOut,
            },
            None => select.select(),
        };

        match operation.index() {
            index if index == object_index => match operation.recv(&self.receiver) {
                Ok(object) => Wake::Object(object),
                Err(_) => Wake::Cancelled,
            },
            index if index == vacancy_index => {
                let _ = operation.recv(&self.vacancy_receiver);
                Wake::Vacancy
            }
            index => {
                let _ = operation.recv(signals[index - vacancy_index - 1].signal());
                Wake::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_put_then_take_is_fifo() {
        let set = AvailableSet::new(3);
        set.put(1);
        set.put(2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.try_take(), Some(1));
        assert_eq!(set.try_take(), Some(2));
        assert_eq!(set.try_take(), None);
    }

    #[test]
    fn test_past_deadline_does_not_block() {
        let set = AvailableSet::<u32>::new(1);
        let started = Instant::now();
        assert!(matches!(set.wait(Some(Instant::now()), &[]), Wake::TimedOut));
        assert!(started.elapsed() < Duration::from_millis(100));

        set.put(7);
        assert!(matches!(set.wait(Some(Instant::now()), &[]), Wake::Object(7)));
    }

    #[test]
    fn test_wait_receives_object_from_other_thread() {
        let set = Arc::new(AvailableSet::new(1));
        let producer = Arc::clone(&set);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.put(42);
        });

        assert!(matches!(set.wait(None, &[]), Wake::Object(42)));
        handle.join().unwrap();
    }

    #[test]
    fn test_cancel_interrupts_wait_and_keeps_objects() {
        let set = Arc::new(AvailableSet::<u32>::new(1));
        let token = CancellationToken::new();
        let waiter_set = Arc::clone(&set);
        let waiter_token = token.clone();
        let handle = thread::spawn(move || {
            matches!(waiter_set.wait(None, &[&waiter_token]), Wake::Cancelled)
        });

        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(handle.join().unwrap());

        set.put(5);
        assert!(matches!(set.wait(None, &[&token]), Wake::Cancelled));
        assert_eq!(set.try_take(), Some(5));
    }

    #[test]
    fn test_vacancy_wakes_waiter() {
        let set = Arc::new(AvailableSet::<u32>::new(2));
        let notifier = Arc::clone(&set);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            notifier.notify_vacancy();
        });

        assert!(matches!(set.wait(None, &[]), Wake::Vacancy));
        handle.join().unwrap();
    }

    #[test]
    fn test_vacancy_notices_are_bounded() {
        let set = AvailableSet::<u32>::new(2);
        for _ in 0..10 {
            set.notify_vacancy();
        }
        assert_eq!(set.vacancy_receiver.len(), 2);
    }
}
