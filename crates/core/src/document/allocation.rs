//! The derived allocation ledger.
//!
//! Allocation rows live on a target invoice and are grouped by the source
//! document that contributed them. A group is always replaced as a whole.

use landed_shared::types::{AllocationRowId, CurrencyCode, InvoiceId, ItemCode, VoucherId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of document that contributes allocation rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Landed cost / charge voucher.
    ChargeVoucher,
    /// Purchase invoice (secondary cost invoice).
    Invoice,
}

/// Identity of a source group: source kind plus document name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceRef {
    /// Rows contributed by a charge voucher's own charges.
    ChargeVoucher(VoucherId),
    /// Rows contributed by a cost invoice's line items.
    Invoice(InvoiceId),
}

impl SourceRef {
    /// Returns the source kind.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::ChargeVoucher(_) => SourceKind::ChargeVoucher,
            Self::Invoice(_) => SourceKind::Invoice,
        }
    }

    /// Returns the source document name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ChargeVoucher(id) => id.as_str(),
            Self::Invoice(id) => id.as_str(),
        }
    }

    /// Stable key used when deriving row ids.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::ChargeVoucher(id) => format!("voucher:{id}"),
            Self::Invoice(id) => format!("invoice:{id}"),
        }
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChargeVoucher(id) => write!(f, "Charge Voucher {id}"),
            Self::Invoice(id) => write!(f, "Invoice {id}"),
        }
    }
}

/// An allocation row computed from a source, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationCandidate {
    /// Cost / service item.
    pub service_item: ItemCode,
    /// Amount in base currency.
    pub base_amount: Decimal,
    /// Tax amount in base currency.
    pub base_tax_amount: Decimal,
    /// Amount in transaction currency.
    pub amount: Decimal,
    /// Transaction currency.
    pub currency: CurrencyCode,
}

/// A persisted allocation row on a target invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRow {
    /// Row id.
    pub id: AllocationRowId,
    /// Invoice the cost is allocated to.
    pub target: InvoiceId,
    /// Cost / service item.
    pub service_item: ItemCode,
    /// Amount in base currency.
    pub base_amount: Decimal,
    /// Tax amount in base currency.
    pub base_tax_amount: Decimal,
    /// Amount in transaction currency.
    pub amount: Decimal,
    /// Transaction currency.
    pub currency: CurrencyCode,
    /// Contributing source.
    pub source: SourceRef,
}

impl AllocationRow {
    /// Stamps a candidate as the `position`-th row of `source`'s group on `target`.
    #[must_use]
    pub fn stamp(
        target: &InvoiceId,
        source: &SourceRef,
        position: usize,
        candidate: AllocationCandidate,
    ) -> Self {
        Self {
            id: AllocationRowId::derive(target, &source.key(), position),
            target: target.clone(),
            service_item: candidate.service_item,
            base_amount: candidate.base_amount,
            base_tax_amount: candidate.base_tax_amount,
            amount: candidate.amount,
            currency: candidate.currency,
            source: source.clone(),
        }
    }
}

/// Derived totals on an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationTotals {
    /// Sum of allocated base amounts.
    pub total_allocated_cost: Decimal,
    /// Sum of allocated base tax amounts.
    pub total_allocated_tax: Decimal,
}

impl AllocationTotals {
    /// Sums a set of allocation rows, or `None` if a sum overflows.
    #[must_use]
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a AllocationRow>) -> Option<Self> {
        rows.into_iter().try_fold(Self::default(), |totals, row| {
            Some(Self {
                total_allocated_cost: totals.total_allocated_cost.checked_add(row.base_amount)?,
                total_allocated_tax: totals.total_allocated_tax.checked_add(row.base_tax_amount)?,
            })
        })
    }
}
