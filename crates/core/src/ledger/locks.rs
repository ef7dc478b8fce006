//! Per-target critical sections.
//!
//! Group writes and totals recomputation for one target invoice never
//! interleave with another reconciliation of the same target. Different
//! targets proceed in parallel.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, PoisonError};

use landed_shared::types::InvoiceId;

/// Application-level locks keyed by target invoice id.
#[derive(Debug, Default)]
pub struct TargetLocks {
    held: Mutex<BTreeSet<InvoiceId>>,
    released: Condvar,
}

impl TargetLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `target` is free, then holds it until the guard drops.
    pub fn acquire(&self, target: &InvoiceId) -> TargetGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(target) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(target.clone());
        TargetGuard {
            locks: self,
            target: target.clone(),
        }
    }

    /// Returns true if some caller currently holds `target`.
    #[must_use]
    pub fn is_held(&self, target: &InvoiceId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(target)
    }
}

/// Releases its target on drop.
#[derive(Debug)]
pub struct TargetGuard<'a> {
    locks: &'a TargetLocks,
    target: InvoiceId,
}

impl TargetGuard<'_> {
    /// The locked target.
    #[must_use]
    pub fn target(&self) -> &InvoiceId {
        &self.target
    }
}

impl Drop for TargetGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.target);
        drop(held);
        self.locks.released.notify_all();
    }
}
