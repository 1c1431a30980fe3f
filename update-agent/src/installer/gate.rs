use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One-shot synchronization primitive separating "install in flight" from "install concluded".
///
/// The gate holds the number of terminal signals still expected. [`CompletionGate::wait`] blocks
/// until that number reaches zero. Signalling an already released gate is a no-op, which makes
/// duplicated completion notifications harmless. Clones share the same gate.
#[derive(Debug, Clone)]
pub struct CompletionGate(Arc<(Mutex<usize>, Condvar)>);

impl Default for CompletionGate {
    fn default() -> Self {
        Self::with_count(1)
    }
}

impl CompletionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate released after `count` signals.
    pub fn with_count(count: usize) -> Self {
        Self(Arc::new((Mutex::new(count), Condvar::new())))
    }

    pub fn signal(&self) {
        let (lck, cvar) = &*self.0;
        let mut remaining = Self::lock(lck);
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            cvar.notify_all();
        }
    }

    /// Blocks until the gate is released.
    pub fn wait(&self) {
        let (lck, cvar) = &*self.0;
        let remaining = Self::lock(lck);
        let _released = cvar
            .wait_while(remaining, |remaining| *remaining > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until the gate is released or `timeout` elapses.
    ///
    /// Returns `true` when the gate was released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lck, cvar) = &*self.0;
        let deadline = Instant::now().checked_add(timeout);
        let mut remaining = Self::lock(lck);
        while *remaining > 0 {
            // A timeout too large to represent is an unbounded wait.
            let Some(deadline) = deadline else {
                remaining = cvar.wait(remaining).unwrap_or_else(PoisonError::into_inner);
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = cvar
                .wait_timeout(remaining, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            remaining = guard;
        }
        true
    }

    pub fn is_released(&self) -> bool {
        let (lck, _) = &*self.0;
        *Self::lock(lck) == 0
    }

    fn lock(lck: &Mutex<usize>) -> MutexGuard<'_, usize> {
        // The counter is always consistent, a panicking holder cannot leave it half updated.
        lck.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
