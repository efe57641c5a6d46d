//! Store-wide request gate.
//!
//! Every request holds the gate for its whole duration. Waiting is bounded:
//! a caller that cannot enter within the timeout gets
//! [`StockError::LockTimeout`] instead of blocking forever.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Result, StockError};

/// Default wait bound, 30 seconds.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
pub struct RequestGate {
    busy: Mutex<bool>,
    released: Condvar,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the gate, waiting at most `timeout`.
    pub fn acquire(&self, timeout: Duration) -> Result<GateGuard<'_>> {
        let started = Instant::now();
        let busy = self
            .busy
            .lock()
            .map_err(|e| StockError::Storage(format!("Mutex poisoned: {}", e)))?;
        let (mut busy, wait) = self
            .released
            .wait_timeout_while(busy, timeout, |busy| *busy)
            .map_err(|e| StockError::Storage(format!("Mutex poisoned: {}", e)))?;
        if wait.timed_out() && *busy {
            let waited_ms = started.elapsed().as_millis() as u64;
            tracing::warn!(waited_ms, "request gate wait timed out");
            return Err(StockError::LockTimeout { waited_ms });
        }
        *busy = true;
        Ok(GateGuard { gate: self })
    }

    /// Whether a request currently holds the gate.
    pub fn is_busy(&self) -> bool {
        self.busy.lock().map(|b| *b).unwrap_or(true)
    }

    fn release(&self) {
        // A poisoned flag is still cleared so later requests are not locked out.
        let mut busy = match self.busy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *busy = false;
        drop(busy);
        self.released.notify_one();
    }
}

/// Holds the gate until dropped.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a RequestGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_and_release() {
        let gate = RequestGate::new();
        {
            let _guard = gate.acquire(Duration::from_millis(10)).unwrap();
            assert!(gate.is_busy());
        }
        assert!(!gate.is_busy());
        let _again = gate.acquire(Duration::from_millis(10)).unwrap();
    }

    #[test]
    fn contended_acquire_times_out() {
        let gate = RequestGate::new();
        let _held = gate.acquire(Duration::from_millis(10)).unwrap();
        let err = gate.acquire(Duration::from_millis(30)).unwrap_err();
        match err {
            StockError::LockTimeout { waited_ms } => assert!(waited_ms >= 30),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn waiter_enters_after_release() {
        let gate = Arc::new(RequestGate::new());
        let guard = gate.acquire(Duration::from_millis(10)).unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.acquire(Duration::from_secs(5)).map(|_| ()))
        };
        thread::sleep(Duration::from_millis(20));
        drop(guard);

        assert!(waiter.join().unwrap().is_ok());
        assert!(!gate.is_busy());
    }

    #[test]
    fn released_on_panic() {
        let gate = Arc::new(RequestGate::new());
        let worker = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _guard = gate.acquire(Duration::from_millis(10)).unwrap();
                panic!("request failed mid-flight");
            })
        };
        assert!(worker.join().is_err());
        assert!(gate.acquire(Duration::from_millis(10)).is_ok());
    }
}
