//! Readiness report for externally funded charge rows.

use landed_shared::types::InvoiceId;
use serde::Serialize;

use crate::document::{ChargeRow, ChargeVoucher};
use crate::error::ReconcileError;

/// A charge row already billed through a secondary invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoicedRow {
    /// Charge row number.
    pub idx: u32,
    /// The secondary invoice.
    pub invoice: InvoiceId,
}

/// What materializing a voucher's externally funded rows would do.
#[derive(Debug, Default)]
pub struct ChargeCheck {
    /// Rows that already have a secondary invoice.
    pub already_invoiced: Vec<InvoicedRow>,
    /// Rows that would be billed.
    pub pending: Vec<u32>,
    /// Missing fields on rows without an invoice.
    pub problems: Vec<ReconcileError>,
}

impl ChargeCheck {
    /// Returns true if at least one row can be billed.
    #[must_use]
    pub fn has_rows_to_process(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Field checks of one externally funded row, in display order.
pub(crate) fn missing_fields(row: &ChargeRow) -> Vec<ReconcileError> {
    let mut missing = Vec::new();
    if row.billing_supplier().is_none() {
        missing.push(ReconcileError::MissingChargeField {
            idx: row.idx,
            field: "supplier",
        });
    }
    if row.item().is_none() {
        missing.push(ReconcileError::MissingChargeField {
            idx: row.idx,
            field: "service item",
        });
    }
    if row.amount.is_zero() {
        missing.push(ReconcileError::MissingChargeField {
            idx: row.idx,
            field: "amount",
        });
    }
    missing
}

/// Checks the externally funded rows of `voucher` using their cached links.
///
/// Rows with a cached secondary invoice are reported as already invoiced and
/// are not field-checked.
#[must_use]
pub fn check_charges(voucher: &ChargeVoucher) -> ChargeCheck {
    let mut check = ChargeCheck::default();
    for row in voucher.charges.iter().filter(|row| row.externally_funded) {
        if let Some(invoice) = row.secondary_invoice.as_ref().filter(|id| !id.is_blank()) {
            check.already_invoiced.push(InvoicedRow {
                idx: row.idx,
                invoice: invoice.clone(),
            });
            continue;
        }
        let missing = missing_fields(row);
        if missing.is_empty() {
            check.pending.push(row.idx);
        } else {
            check.problems.extend(missing);
        }
    }
    check
}
