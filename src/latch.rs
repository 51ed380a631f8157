use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};



/// A one-shot signal. Setting it is idempotent, and a wait started after
/// the latch was set returns immediately.
#[derive(Debug, Default)]
pub struct Latch {
    set: AtomicBool,
    lock: Mutex<()>,
    cvar: Condvar
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true only for the call that actually set the latch.
    pub fn set(&self) -> bool {
        if self.set.swap(true, Ordering::AcqRel) { return false }

        // Taking the lock orders this notify after any waiter that checked
        // the flag has gone to sleep on the condvar.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.cvar.notify_all();

        true
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    pub fn wait(&self) {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        while !self.is_set() {
            guard = self.cvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait at most `timeout`; returns whether the latch is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        while !self.is_set() {
            let now = Instant::now();
            if now >= deadline { return false }

            guard = self.cvar.wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner).0;
        }

        true
    }
}



#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_before_wait_is_observed() {
        let latch = Latch::new();

        assert!(latch.set());
        latch.wait();
        assert!(latch.is_set());
    }

    #[test]
    fn set_is_idempotent() {
        let latch = Latch::new();

        assert!(latch.set());
        assert!(!latch.set());
        assert!(latch.is_set());
    }

    #[test]
    fn wait_wakes_on_set_from_other_thread() {
        let latch = Arc::new(Latch::new());
        let setter = {
            let latch = latch.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                latch.set();
            })
        };

        latch.wait();
        assert!(latch.is_set());
        setter.join().unwrap();
    }

    #[test]
    fn wait_timeout_expires_when_unset() {
        let latch = Latch::new();

        assert!(!latch.wait_timeout(Duration::from_millis(10)));
    }
}
