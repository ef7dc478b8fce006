//! Finding the sources linked to a target invoice.

use std::collections::BTreeSet;

use landed_shared::types::{InvoiceId, VoucherId};
use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::DocumentStore;

/// Read-only lookups of the vouchers and cost invoices feeding a target.
pub struct SourceLocator<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> SourceLocator<'a> {
    /// Creates a locator over `store`.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Submitted vouchers with an invoice receipt link to `invoice`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub fn find_charge_vouchers(&self, invoice: &InvoiceId) -> ReconcileResult<BTreeSet<VoucherId>> {
        let ids = self.store.vouchers_referencing(invoice).map_err(|e| {
            ReconcileError::collaborator(format!("Finding vouchers of invoice {invoice}"), e)
        })?;

        let mut found = BTreeSet::new();
        for id in ids {
            let voucher = self.store.charge_voucher(&id).map_err(|e| {
                ReconcileError::collaborator(format!("Loading charge voucher {id}"), e)
            })?;
            match voucher {
                Some(voucher) if voucher.status.is_submitted() && voucher.references(invoice) => {
                    found.insert(id);
                }
                Some(_) => {}
                None => debug!(voucher = %id, target = %invoice, "Linked voucher no longer exists"),
            }
        }
        Ok(found)
    }

    /// Submitted invoices whose original invoice is `invoice`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub fn find_secondary_invoices(
        &self,
        invoice: &InvoiceId,
    ) -> ReconcileResult<BTreeSet<InvoiceId>> {
        let ids = self.store.invoices_with_original(invoice).map_err(|e| {
            ReconcileError::collaborator(format!("Finding cost invoices of invoice {invoice}"), e)
        })?;

        let mut found = BTreeSet::new();
        for id in ids {
            let secondary = self
                .store
                .invoice(&id)
                .map_err(|e| ReconcileError::collaborator(format!("Loading invoice {id}"), e))?;
            match secondary {
                Some(secondary)
                    if secondary.status.is_submitted()
                        && secondary.original_invoice.as_ref() == Some(invoice) =>
                {
                    found.insert(id);
                }
                Some(_) => {}
                None => debug!(invoice = %id, target = %invoice, "Linked invoice no longer exists"),
            }
        }
        Ok(found)
    }
}
