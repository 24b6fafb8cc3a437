//! Single-writer discipline for one container
//!
//! Reconciliation and edit write-back both mutate the same snapshot and cache
//! root. The session holds them apart with `&mut` access; the `BusyFlag` makes
//! that state visible to the container watcher thread, which drops change
//! notifications while a pass or write-back is in flight instead of queueing them.

use parking_lot::RwLock;
use std::sync::Arc;

/// Shared "pass in flight" flag
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    busy: Arc<RwLock<bool>>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.read()
    }

    /// Mark busy unless already busy. The flag clears when the guard drops.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        let mut busy = self.busy.write();
        if *busy {
            return None;
        }
        *busy = true;
        Some(BusyGuard {
            busy: Arc::clone(&self.busy),
        })
    }
}

/// Clears the busy flag on drop
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<RwLock<bool>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        *self.busy.write() = false;
    }
}
