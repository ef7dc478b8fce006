//! Interfaces to the external collaborators of the engine.
//!
//! The engine never talks to a database, a tax engine or a rate provider
//! directly. It consumes these traits; `landed-store` ships in-process
//! implementations.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use landed_shared::AppResult;
use landed_shared::types::{
    AccountId, CompanyId, CurrencyCode, InvoiceId, ItemCode, SupplierId, VoucherId,
};
use rust_decimal::Decimal;

use crate::document::{
    AllocationRow, AllocationTotals, ChargeRowRef, ChargeVoucher, Invoice, SourceRef, TaxRow,
};

/// A single write inside a `WriteBatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Delete every allocation row of `source` on `target`.
    DeleteGroup {
        /// Target invoice.
        target: InvoiceId,
        /// Source whose rows are deleted.
        source: SourceRef,
    },
    /// Insert one allocation row.
    InsertRow(AllocationRow),
}

/// Ordered writes the store must apply all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a group deletion.
    pub fn delete_group(&mut self, target: &InvoiceId, source: &SourceRef) {
        self.ops.push(WriteOp::DeleteGroup {
            target: target.clone(),
            source: source.clone(),
        });
    }

    /// Appends a row insertion.
    pub fn insert_row(&mut self, row: AllocationRow) {
        self.ops.push(WriteOp::InsertRow(row));
    }

    /// Returns the queued writes.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch, returning its writes.
    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Number of queued row insertions.
    #[must_use]
    pub fn inserted_rows(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, WriteOp::InsertRow(_)))
            .count()
    }
}

/// Document storage and querying.
pub trait DocumentStore: Send + Sync {
    /// Loads an invoice.
    fn invoice(&self, id: &InvoiceId) -> AppResult<Option<Invoice>>;

    /// Loads a charge voucher.
    fn charge_voucher(&self, id: &VoucherId) -> AppResult<Option<ChargeVoucher>>;

    /// Vouchers with a receipt link naming `invoice`, any status.
    fn vouchers_referencing(&self, invoice: &InvoiceId) -> AppResult<Vec<VoucherId>>;

    /// Invoices whose `original_invoice` is `invoice`, any status.
    fn invoices_with_original(&self, invoice: &InvoiceId) -> AppResult<Vec<InvoiceId>>;

    /// Invoices with a line billing the given charge row, any status.
    fn invoices_with_charge_origin(&self, origin: &ChargeRowRef) -> AppResult<Vec<InvoiceId>>;

    /// Base currency of a company.
    fn company_currency(&self, company: &CompanyId) -> AppResult<Option<CurrencyCode>>;

    /// Current allocation rows of `target`, in insertion order.
    fn allocation_rows(&self, target: &InvoiceId) -> AppResult<Vec<AllocationRow>>;

    /// Applies a batch atomically: either every write lands or none does.
    fn apply(&self, batch: WriteBatch) -> AppResult<()>;

    /// Writes the derived totals directly, bypassing document validation.
    fn set_allocation_totals(&self, target: &InvoiceId, totals: AllocationTotals)
    -> AppResult<()>;

    /// Records the secondary invoice billing a charge row.
    fn link_charge_row(&self, origin: &ChargeRowRef, invoice: &InvoiceId) -> AppResult<()>;
}

/// One line of a secondary invoice to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
    /// Service item billed.
    pub item_code: ItemCode,
    /// Quantity.
    pub qty: Decimal,
    /// Unit rate in transaction currency.
    pub rate: Decimal,
    /// Charge row this line bills.
    pub charge_origin: ChargeRowRef,
}

/// A secondary invoice billing a supplier for voucher charges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryInvoiceDraft {
    /// Owning company.
    pub company: CompanyId,
    /// Billing supplier.
    pub supplier: SupplierId,
    /// Supplier's payable account.
    pub payable_account: AccountId,
    /// Transaction currency.
    pub currency: CurrencyCode,
    /// Transaction to base conversion rate.
    pub conversion_rate: Decimal,
    /// Posting date (the voucher's).
    pub posting_date: NaiveDate,
    /// Invoice whose cost this invoice covers.
    pub original_invoice: InvoiceId,
    /// Lines, one per charge row.
    pub lines: Vec<DraftLine>,
}

/// Invoice creation and lifecycle transitions (with their GL side effects).
pub trait InvoiceLifecycle: Send + Sync {
    /// Creates a draft invoice, returning its name.
    fn create(&self, draft: SecondaryInvoiceDraft) -> AppResult<InvoiceId>;

    /// Submits a draft invoice.
    fn submit(&self, id: &InvoiceId) -> AppResult<()>;

    /// Cancels an invoice.
    fn cancel(&self, id: &InvoiceId) -> AppResult<()>;
}

/// Tax of one component for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentTax {
    /// Tax amount in transaction currency.
    pub tax_amount: Decimal,
    /// Tax amount in base currency, when known.
    pub base_tax_amount: Option<Decimal>,
}

/// Item key -> tax component -> tax.
pub type ItemisedTax = BTreeMap<String, BTreeMap<String, ComponentTax>>;

/// Itemised tax computation.
pub trait TaxService: Send + Sync {
    /// Breaks the given tax rows down per item.
    fn itemised_tax(&self, taxes: &[TaxRow]) -> AppResult<ItemisedTax>;
}

/// Exchange rate lookup.
pub trait ExchangeRates: Send + Sync {
    /// Rate such that `1 from = rate to` on `as_of`.
    fn exchange_rate(&self, from: &CurrencyCode, to: &CurrencyCode, as_of: NaiveDate)
    -> AppResult<Decimal>;
}

/// Party account resolution.
pub trait PartyAccounts: Send + Sync {
    /// Payable account of a supplier within a company.
    fn payable_account(
        &self,
        supplier: &SupplierId,
        company: &CompanyId,
    ) -> AppResult<Option<AccountId>>;
}
