//! Derived totals on a target invoice.

use landed_shared::types::InvoiceId;
use tracing::info;

use crate::document::AllocationTotals;
use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::DocumentStore;

/// Recomputes `total_allocated_cost` and `total_allocated_tax`.
pub struct TotalsAggregator<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> TotalsAggregator<'a> {
    /// Creates an aggregator over `store`.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Sums the current rows of `target` and overwrites its totals.
    ///
    /// Works on any status; the write bypasses document validation.
    ///
    /// # Errors
    ///
    /// Returns a `Collaborator` error if the store fails and `Overflow` if
    /// the rows do not fit in a total. Stored totals are left untouched then.
    pub fn recompute_totals(&self, target: &InvoiceId) -> ReconcileResult<AllocationTotals> {
        let rows = self.store.allocation_rows(target).map_err(|e| {
            ReconcileError::collaborator(format!("Loading allocation rows of {target}"), e)
        })?;
        let totals = AllocationTotals::from_rows(&rows).ok_or_else(|| {
            ReconcileError::Overflow(format!("summing allocation rows of {target}"))
        })?;

        self.store
            .set_allocation_totals(target, totals)
            .map_err(|e| {
                ReconcileError::collaborator(format!("Writing allocation totals of {target}"), e)
            })?;

        info!(
            target = %target,
            rows = rows.len(),
            total_allocated_cost = %totals.total_allocated_cost,
            total_allocated_tax = %totals.total_allocated_tax,
            "Allocation totals recomputed"
        );
        Ok(totals)
    }
}
