//! Per-run reporting.
//!
//! A reconciliation run never stops at the first failing step. Each failed
//! group, supplier or document is recorded here and the run carries on with
//! its siblings.

use std::collections::BTreeMap;
use std::fmt;

use landed_shared::types::{CurrencyCode, InvoiceId, SupplierId, VoucherId};
use tracing::warn;

use crate::document::{AllocationTotals, ChargeRowRef, SourceRef};
use crate::error::ReconcileError;
use crate::ledger::GroupWrite;
use crate::materialize::InvoicedRow;

/// What a failure applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureScope {
    /// A (supplier, currency) group of externally funded charges.
    Supplier {
        /// Billing supplier.
        supplier: SupplierId,
        /// Transaction currency.
        currency: CurrencyCode,
    },
    /// A whole charge voucher.
    Voucher(VoucherId),
    /// A single charge row.
    ChargeRow(ChargeRowRef),
    /// One source group on one target.
    Group {
        /// Target invoice.
        target: InvoiceId,
        /// Source of the group.
        source: SourceRef,
    },
    /// A whole document: totals of a target, or a lifecycle call.
    Invoice(InvoiceId),
}

impl fmt::Display for FailureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supplier { supplier, currency } => write!(f, "supplier {supplier} ({currency})"),
            Self::Voucher(id) => write!(f, "charge voucher {id}"),
            Self::ChargeRow(row) => write!(f, "charge voucher {} row {}", row.voucher, row.idx),
            Self::Group { target, source } => write!(f, "{source} on invoice {target}"),
            Self::Invoice(id) => write!(f, "invoice {id}"),
        }
    }
}

/// A failed step.
#[derive(Debug)]
pub struct Failure {
    /// What failed.
    pub scope: FailureScope,
    /// Why.
    pub error: ReconcileError,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.error)
    }
}

/// Everything one reconciliation run did and failed to do.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Group replacements, in write order.
    pub groups: Vec<GroupWrite>,
    /// Secondary invoices created.
    pub created_invoices: Vec<InvoiceId>,
    /// Secondary invoices submitted (new ones and resumed drafts).
    pub submitted_invoices: Vec<InvoiceId>,
    /// Secondary invoices cancelled.
    pub cancelled_invoices: Vec<InvoiceId>,
    /// Charge rows skipped because a live secondary invoice already bills them.
    pub already_invoiced: Vec<InvoicedRow>,
    /// Totals recomputed per target.
    pub totals: BTreeMap<InvoiceId, AllocationTotals>,
    /// Non-fatal problems (defaulted tax, fallback exchange rates).
    pub warnings: Vec<ReconcileError>,
    /// Failed steps.
    pub failures: Vec<Failure>,
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed step and logs it.
    pub fn fail(&mut self, scope: FailureScope, error: ReconcileError) {
        warn!(
            scope = %scope,
            code = error.error_code(),
            error = %error,
            "Reconciliation step failed"
        );
        self.failures.push(Failure { scope, error });
    }

    /// Returns true if no step failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total rows inserted across all group writes.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.groups.iter().map(|g| g.inserted).sum()
    }

    /// Failure messages, one per failed step.
    #[must_use]
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

/// Result of a manual refresh.
#[derive(Debug)]
pub struct RefreshOutcome {
    /// Rows inserted on the target.
    pub rows_written: usize,
    /// Totals after the refresh.
    pub totals: AllocationTotals,
    /// Details of the run.
    pub report: RunReport,
}
