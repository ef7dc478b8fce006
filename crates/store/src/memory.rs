//! In-memory document store.
//!
//! Holds invoices, vouchers and allocation rows behind a single mutex. Group
//! writes are applied to a copy of the affected rows and committed only when
//! every operation succeeds. Invoice lifecycle calls move documents between
//! draft, submitted and cancelled.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use landed_core::document::{
    AllocationRow, AllocationTotals, ChargeRowRef, ChargeVoucher, DocStatus, Invoice, InvoiceItem,
};
use landed_core::ports::{DocumentStore, InvoiceLifecycle, SecondaryInvoiceDraft, WriteBatch, WriteOp};
use landed_shared::types::{CompanyId, CurrencyCode, InvoiceId, VoucherId};
use landed_shared::{AppError, AppResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Serializable contents of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Invoices by name.
    #[serde(default)]
    pub invoices: BTreeMap<InvoiceId, Invoice>,
    /// Charge vouchers by name.
    #[serde(default)]
    pub vouchers: BTreeMap<VoucherId, ChargeVoucher>,
    /// Base currency per company.
    #[serde(default)]
    pub company_currencies: BTreeMap<CompanyId, CurrencyCode>,
    /// Allocation rows per target invoice, in insertion order.
    #[serde(default)]
    pub allocation_rows: BTreeMap<InvoiceId, Vec<AllocationRow>>,
}

#[derive(Debug, Default)]
struct State {
    data: Snapshot,
    next_invoice: u32,
    failing_writes: BTreeSet<InvoiceId>,
    failing_submits: usize,
    failing_cancels: BTreeSet<InvoiceId>,
}

/// Thread-safe in-memory implementation of `DocumentStore` and `InvoiceLifecycle`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

/// Decimal places of base amounts on created invoices.
const BASE_AMOUNT_PRECISION: u32 = 2;

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let next_invoice = u32::try_from(snapshot.invoices.len()).unwrap_or(u32::MAX);
        Self {
            state: Mutex::new(State {
                data: snapshot,
                next_invoice,
                ..State::default()
            }),
        }
    }

    /// Parses a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the JSON does not describe a snapshot.
    pub fn from_json(json: &str) -> AppResult<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| AppError::Validation(format!("Invalid snapshot: {e}")))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Copies the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.lock().data.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds or replaces an invoice.
    pub fn insert_invoice(&self, invoice: Invoice) {
        self.lock().data.invoices.insert(invoice.id.clone(), invoice);
    }

    /// Adds or replaces a charge voucher.
    pub fn insert_voucher(&self, voucher: ChargeVoucher) {
        self.lock().data.vouchers.insert(voucher.id.clone(), voucher);
    }

    /// Sets a company's base currency.
    pub fn set_company_currency(&self, company: CompanyId, currency: CurrencyCode) {
        self.lock().data.company_currencies.insert(company, currency);
    }

    /// Modifies a stored invoice in place.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the invoice does not exist.
    pub fn update_invoice(&self, id: &InvoiceId, f: impl FnOnce(&mut Invoice)) -> AppResult<()> {
        let mut state = self.lock();
        let invoice = state
            .data
            .invoices
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {id}")))?;
        f(invoice);
        Ok(())
    }

    /// Modifies a stored voucher in place.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the voucher does not exist.
    pub fn update_voucher(
        &self,
        id: &VoucherId,
        f: impl FnOnce(&mut ChargeVoucher),
    ) -> AppResult<()> {
        let mut state = self.lock();
        let voucher = state
            .data
            .vouchers
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Charge voucher {id}")))?;
        f(voucher);
        Ok(())
    }

    /// Makes every batch touching `target` fail until cleared.
    pub fn fail_writes_on(&self, target: &InvoiceId) {
        self.lock().failing_writes.insert(target.clone());
    }

    /// Lets batches touching `target` succeed again.
    pub fn clear_write_failure(&self, target: &InvoiceId) {
        self.lock().failing_writes.remove(target);
    }

    /// Makes the next `count` submissions fail.
    pub fn fail_next_submits(&self, count: usize) {
        self.lock().failing_submits = count;
    }

    /// Makes cancelling `invoice` fail.
    pub fn fail_cancel_of(&self, invoice: &InvoiceId) {
        self.lock().failing_cancels.insert(invoice.clone());
    }

    /// Invoices whose original invoice is `original`, any status.
    #[must_use]
    pub fn invoices_for(&self, original: &InvoiceId) -> Vec<Invoice> {
        self.lock()
            .data
            .invoices
            .values()
            .filter(|invoice| invoice.original_invoice.as_ref() == Some(original))
            .cloned()
            .collect()
    }
}

fn touched_target(op: &WriteOp) -> &InvoiceId {
    match op {
        WriteOp::DeleteGroup { target, .. } => target,
        WriteOp::InsertRow(row) => &row.target,
    }
}

impl DocumentStore for MemoryStore {
    fn invoice(&self, id: &InvoiceId) -> AppResult<Option<Invoice>> {
        Ok(self.lock().data.invoices.get(id).cloned())
    }

    fn charge_voucher(&self, id: &VoucherId) -> AppResult<Option<ChargeVoucher>> {
        Ok(self.lock().data.vouchers.get(id).cloned())
    }

    fn vouchers_referencing(&self, invoice: &InvoiceId) -> AppResult<Vec<VoucherId>> {
        Ok(self
            .lock()
            .data
            .vouchers
            .values()
            .filter(|voucher| voucher.references(invoice))
            .map(|voucher| voucher.id.clone())
            .collect())
    }

    fn invoices_with_original(&self, invoice: &InvoiceId) -> AppResult<Vec<InvoiceId>> {
        Ok(self
            .lock()
            .data
            .invoices
            .values()
            .filter(|candidate| candidate.original_invoice.as_ref() == Some(invoice))
            .map(|candidate| candidate.id.clone())
            .collect())
    }

    fn invoices_with_charge_origin(&self, origin: &ChargeRowRef) -> AppResult<Vec<InvoiceId>> {
        Ok(self
            .lock()
            .data
            .invoices
            .values()
            .filter(|invoice| {
                invoice
                    .items
                    .iter()
                    .any(|item| item.charge_origin.as_ref() == Some(origin))
            })
            .map(|invoice| invoice.id.clone())
            .collect())
    }

    fn company_currency(&self, company: &CompanyId) -> AppResult<Option<CurrencyCode>> {
        Ok(self.lock().data.company_currencies.get(company).cloned())
    }

    fn allocation_rows(&self, target: &InvoiceId) -> AppResult<Vec<AllocationRow>> {
        Ok(self
            .lock()
            .data
            .allocation_rows
            .get(target)
            .cloned()
            .unwrap_or_default())
    }

    fn apply(&self, batch: WriteBatch) -> AppResult<()> {
        let mut state = self.lock();

        let targets: BTreeSet<InvoiceId> = batch.ops().iter().map(touched_target).cloned().collect();
        if let Some(target) = targets.iter().find(|t| state.failing_writes.contains(*t)) {
            return Err(AppError::Persistence(format!(
                "Write to invoice {target} rejected"
            )));
        }

        // Work on copies so a failing operation leaves every group untouched.
        let mut staged: BTreeMap<InvoiceId, Vec<AllocationRow>> = targets
            .iter()
            .map(|t| {
                let rows = state.data.allocation_rows.get(t).cloned().unwrap_or_default();
                (t.clone(), rows)
            })
            .collect();

        for op in batch.into_ops() {
            match op {
                WriteOp::DeleteGroup { target, source } => {
                    if let Some(rows) = staged.get_mut(&target) {
                        rows.retain(|row| row.source != source);
                    }
                }
                WriteOp::InsertRow(row) => {
                    if !state.data.invoices.contains_key(&row.target) {
                        return Err(AppError::NotFound(format!("Invoice {}", row.target)));
                    }
                    if let Some(rows) = staged.get_mut(&row.target) {
                        if rows.iter().any(|existing| existing.id == row.id) {
                            return Err(AppError::Conflict(format!(
                                "Allocation row {} already exists",
                                row.id
                            )));
                        }
                        rows.push(row);
                    }
                }
            }
        }

        for (target, rows) in staged {
            debug!(target = %target, rows = rows.len(), "Committing allocation rows");
            if rows.is_empty() {
                state.data.allocation_rows.remove(&target);
            } else {
                state.data.allocation_rows.insert(target, rows);
            }
        }
        Ok(())
    }

    fn set_allocation_totals(&self, target: &InvoiceId, totals: AllocationTotals) -> AppResult<()> {
        let mut state = self.lock();
        let invoice = state
            .data
            .invoices
            .get_mut(target)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {target}")))?;
        invoice.totals = totals;
        Ok(())
    }

    fn link_charge_row(&self, origin: &ChargeRowRef, invoice: &InvoiceId) -> AppResult<()> {
        let mut state = self.lock();
        let voucher = state
            .data
            .vouchers
            .get_mut(&origin.voucher)
            .ok_or_else(|| AppError::NotFound(format!("Charge voucher {}", origin.voucher)))?;
        let row = voucher
            .charges
            .iter_mut()
            .find(|row| row.idx == origin.idx)
            .ok_or_else(|| {
                AppError::NotFound(format!("Row {} of charge voucher {}", origin.idx, origin.voucher))
            })?;
        row.secondary_invoice = Some(invoice.clone());
        Ok(())
    }
}

impl InvoiceLifecycle for MemoryStore {
    fn create(&self, draft: SecondaryInvoiceDraft) -> AppResult<InvoiceId> {
        if draft.lines.is_empty() {
            return Err(AppError::Validation(
                "An invoice needs at least one line".to_string(),
            ));
        }
        if draft.conversion_rate <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Conversion rate must be positive, got {}",
                draft.conversion_rate
            )));
        }

        let mut state = self.lock();
        let id = loop {
            state.next_invoice += 1;
            let candidate = InvoiceId::new(format!("ACC-PINV-{:05}", state.next_invoice));
            if !state.data.invoices.contains_key(&candidate) {
                break candidate;
            }
        };

        let items = draft
            .lines
            .into_iter()
            .map(|line| {
                let amount = line.qty * line.rate;
                InvoiceItem {
                    item_code: Some(line.item_code),
                    item_name: None,
                    qty: line.qty,
                    rate: line.rate,
                    amount,
                    base_net_amount: (amount * draft.conversion_rate).round_dp_with_strategy(
                        BASE_AMOUNT_PRECISION,
                        RoundingStrategy::MidpointNearestEven,
                    ),
                    item_tax_rate: None,
                    charge_origin: Some(line.charge_origin),
                }
            })
            .collect();

        let invoice = Invoice {
            id: id.clone(),
            company: draft.company,
            supplier: Some(draft.supplier),
            currency: draft.currency,
            conversion_rate: draft.conversion_rate,
            posting_date: draft.posting_date,
            status: DocStatus::Draft,
            items,
            taxes: Vec::new(),
            original_invoice: Some(draft.original_invoice),
            totals: AllocationTotals::default(),
        };
        state.data.invoices.insert(id.clone(), invoice);
        debug!(invoice = %id, "Invoice created");
        Ok(id)
    }

    fn submit(&self, id: &InvoiceId) -> AppResult<()> {
        let mut state = self.lock();
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            return Err(AppError::ExternalService(format!(
                "Posting invoice {id} failed"
            )));
        }
        let invoice = state
            .data
            .invoices
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {id}")))?;
        if !invoice.status.is_draft() {
            return Err(AppError::Validation(format!("Invoice {id} is not a draft")));
        }
        invoice.status = DocStatus::Submitted;
        Ok(())
    }

    fn cancel(&self, id: &InvoiceId) -> AppResult<()> {
        let mut state = self.lock();
        if state.failing_cancels.contains(id) {
            return Err(AppError::ExternalService(format!(
                "Cancelling invoice {id} failed"
            )));
        }
        let invoice = state
            .data
            .invoices
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {id}")))?;
        if !invoice.status.is_live() {
            return Err(AppError::Validation(format!("Invoice {id} is already cancelled")));
        }
        invoice.status = DocStatus::Cancelled;
        Ok(())
    }
}
