//! Allocation ledger: replacing one source's group of rows on a target.
//!
//! A group is identified by (target invoice, source). Every write deletes the
//! whole group and re-inserts it in a single atomic batch, so a failed write
//! leaves the previous rows in place and rows of other sources are never
//! touched.

mod locks;

pub use locks::{TargetGuard, TargetLocks};

use landed_shared::types::InvoiceId;
use serde::Serialize;
use tracing::info;

use crate::document::{AllocationCandidate, AllocationRow, SourceRef};
use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::{DocumentStore, WriteBatch};

/// Result of one group replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupWrite {
    /// Target invoice.
    pub target: InvoiceId,
    /// Source whose group was replaced.
    pub source: SourceRef,
    /// Rows removed.
    pub removed: usize,
    /// Rows inserted.
    pub inserted: usize,
}

/// Writes source groups to target invoices.
pub struct AllocationLedger<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> AllocationLedger<'a> {
    /// Creates a ledger over `store`.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Replaces the rows of `source` on `target` with `candidates`.
    ///
    /// An empty candidate list is a pure deletion and is allowed on any
    /// target. Inserting requires a draft target.
    ///
    /// # Errors
    ///
    /// - `InvoiceNotFound` if the target does not exist
    /// - `TargetNotDraft` if rows would be inserted into a non-draft target
    /// - `Collaborator` if the store rejects the batch (nothing is written)
    pub fn replace_group(
        &self,
        target: &InvoiceId,
        source: &SourceRef,
        candidates: Vec<AllocationCandidate>,
    ) -> ReconcileResult<GroupWrite> {
        let invoice = self
            .store
            .invoice(target)
            .map_err(|e| ReconcileError::collaborator(format!("Loading invoice {target}"), e))?
            .ok_or_else(|| ReconcileError::InvoiceNotFound(target.clone()))?;

        if !candidates.is_empty() && !invoice.status.is_draft() {
            return Err(ReconcileError::TargetNotDraft(target.clone()));
        }

        let removed = self
            .store
            .allocation_rows(target)
            .map_err(|e| {
                ReconcileError::collaborator(format!("Loading allocation rows of {target}"), e)
            })?
            .iter()
            .filter(|row| &row.source == source)
            .count();

        let mut batch = WriteBatch::new();
        batch.delete_group(target, source);
        for (position, candidate) in candidates.into_iter().enumerate() {
            batch.insert_row(AllocationRow::stamp(target, source, position, candidate));
        }
        let inserted = batch.inserted_rows();

        self.store.apply(batch).map_err(|e| {
            ReconcileError::collaborator(format!("Writing {source} rows on invoice {target}"), e)
        })?;

        info!(
            target = %target,
            source = %source,
            removed,
            inserted,
            "Allocation group replaced"
        );

        Ok(GroupWrite {
            target: target.clone(),
            source: source.clone(),
            removed,
            inserted,
        })
    }

    /// Removes the rows of `source` on `target`.
    ///
    /// # Errors
    ///
    /// Same as `replace_group`, minus the draft guard.
    pub fn retract_group(
        &self,
        target: &InvoiceId,
        source: &SourceRef,
    ) -> ReconcileResult<GroupWrite> {
        self.replace_group(target, source, Vec::new())
    }
}
