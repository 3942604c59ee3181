//! Single-lane exclusivity
//!
//! In single-lane mode one entry may be in flight across all instruments, and no
//! entry starts while any exit is running. Both are released by dropping their
//! guard, so every return path and error releases them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The single-lane entry lock
#[derive(Debug, Clone, Default)]
pub struct ExclusivityToken {
    lane: Arc<Mutex<()>>,
}

/// Proof of holding the lane
#[derive(Debug)]
pub struct LaneGuard {
    _guard: OwnedMutexGuard<()>,
}

impl ExclusivityToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lane without waiting. `None` when it is held elsewhere.
    pub fn try_acquire(&self) -> Option<LaneGuard> {
        self.lane
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| LaneGuard { _guard: guard })
    }

    pub fn is_held(&self) -> bool {
        self.lane.try_lock().is_err()
    }
}

/// Number of exits currently running
#[derive(Debug, Default)]
pub struct SellInFlight {
    count: AtomicUsize,
}

/// Counts one running exit until dropped
#[derive(Debug)]
pub struct SellGuard {
    owner: Arc<SellInFlight>,
}

impl SellInFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(self: &Arc<Self>) -> SellGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        SellGuard {
            owner: Arc::clone(self),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Drop for SellGuard {
    fn drop(&mut self) {
        self.owner.count.fetch_sub(1, Ordering::SeqCst);
    }
}
