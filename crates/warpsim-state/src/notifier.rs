//! ChangeNotifier — a binary, auto-reset signal for observers.
//!
//! Mutators call [`ChangeNotifier::notify`]; an observer blocks in
//! [`ChangeNotifier::wait`] until the signal is set and clears it on
//! wake. Setting an already-set signal is a no-op, so a burst of changes
//! before the observer wakes is delivered once.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct ChangeNotifier {
    set: Mutex<bool>,
    cond: Condvar,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal and wake every waiter.
    pub fn notify(&self) {
        let mut set = self.set.lock();
        *set = true;
        self.cond.notify_all();
    }

    /// Block until the signal is set, then clear it.
    pub fn wait(&self) {
        let mut set = self.set.lock();
        while !*set {
            self.cond.wait(&mut set);
        }
        *set = false;
    }

    /// Like [`wait`](Self::wait) with an upper bound. Returns true if the
    /// signal was consumed, false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.set.lock();
        while !*set {
            if self.cond.wait_until(&mut set, deadline).timed_out() {
                break;
            }
        }
        std::mem::take(&mut *set)
    }

    pub fn is_set(&self) -> bool {
        *self.set.lock()
    }

    pub fn clear(&self) {
        *self.set.lock() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_consumes_signal() {
        let n = ChangeNotifier::new();
        n.notify();
        n.notify();
        assert!(n.is_set());
        n.wait();
        assert!(!n.is_set());
    }

    #[test]
    fn wait_timeout_without_signal() {
        let n = ChangeNotifier::new();
        assert!(!n.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn waiter_wakes_on_notify_from_other_thread() {
        let n = Arc::new(ChangeNotifier::new());
        let waiter = {
            let n = n.clone();
            thread::spawn(move || n.wait_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        n.notify();
        assert!(waiter.join().unwrap());
        assert!(!n.is_set());
    }

    #[test]
    fn clear_resets() {
        let n = ChangeNotifier::new();
        n.notify();
        n.clear();
        assert!(!n.wait_timeout(Duration::from_millis(1)));
    }
}
