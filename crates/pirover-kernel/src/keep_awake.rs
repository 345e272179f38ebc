//! [`KeepAwake`] – acquire-once / release-if-held wrapper for a [`WakeLock`].
//!
//! The underlying lock is not reference-counted.  This wrapper makes sure it
//! is acquired at most once per session and released only while held.

use pirover_hal::WakeLock;
use tracing::info;

pub struct KeepAwake {
    lock: Box<dyn WakeLock>,
    held: bool,
}

impl KeepAwake {
    pub fn new(lock: Box<dyn WakeLock>) -> Self {
        Self { lock, held: false }
    }

    /// Acquire the lock unless already held.  Returns `true` if this call
    /// actually acquired it.
    pub fn acquire(&mut self) -> bool {
        if self.held {
            return false;
        }
        self.lock.acquire();
        self.held = true;
        info!("keep-awake acquired");
        true
    }

    /// Release the lock if held.  Returns `true` if this call released it.
    pub fn release(&mut self) -> bool {
        if !self.held {
            return false;
        }
        self.lock.release();
        self.held = false;
        info!("keep-awake released");
        true
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl std::fmt::Debug for KeepAwake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAwake").field("held", &self.held).finish()
    }
}
