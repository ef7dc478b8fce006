//! Mock document store and record builders for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use landed_shared::types::{CompanyId, CurrencyCode, InvoiceId, ItemCode, VoucherId};
use landed_shared::{AppError, AppResult};
use rust_decimal::Decimal;

use crate::document::{
    AllocationCandidate, AllocationRow, AllocationTotals, ChargeRowRef, ChargeVoucher, DocStatus,
    Invoice, ReceiptDocumentType, ReceiptLink,
};
use crate::ports::{DocumentStore, WriteBatch, WriteOp};

#[derive(Default)]
struct MockData {
    invoices: BTreeMap<InvoiceId, Invoice>,
    vouchers: BTreeMap<VoucherId, ChargeVoucher>,
    dangling_vouchers: Vec<VoucherId>,
    rows: BTreeMap<InvoiceId, Vec<AllocationRow>>,
    fail_apply: bool,
}

/// Mock store for testing.
#[derive(Default)]
pub(crate) struct MockStore {
    data: Mutex<MockData>,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_invoice(&self, invoice: Invoice) {
        self.data
            .lock()
            .unwrap()
            .invoices
            .insert(invoice.id.clone(), invoice);
    }

    pub(crate) fn add_voucher(&self, voucher: ChargeVoucher) {
        self.data
            .lock()
            .unwrap()
            .vouchers
            .insert(voucher.id.clone(), voucher);
    }

    /// A voucher id reported as referencing every invoice but never stored.
    pub(crate) fn add_dangling_voucher(&self, id: &str) {
        self.data
            .lock()
            .unwrap()
            .dangling_vouchers
            .push(VoucherId::from(id));
    }

    pub(crate) fn fail_apply(&self, fail: bool) {
        self.data.lock().unwrap().fail_apply = fail;
    }

    pub(crate) fn rows(&self, target: &str) -> Vec<AllocationRow> {
        self.data
            .lock()
            .unwrap()
            .rows
            .get(&InvoiceId::from(target))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn totals(&self, target: &str) -> AllocationTotals {
        self.data.lock().unwrap().invoices[&InvoiceId::from(target)].totals
    }
}

impl DocumentStore for MockStore {
    fn invoice(&self, id: &InvoiceId) -> AppResult<Option<Invoice>> {
        Ok(self.data.lock().unwrap().invoices.get(id).cloned())
    }

    fn charge_voucher(&self, id: &VoucherId) -> AppResult<Option<ChargeVoucher>> {
        Ok(self.data.lock().unwrap().vouchers.get(id).cloned())
    }

    fn vouchers_referencing(&self, invoice: &InvoiceId) -> AppResult<Vec<VoucherId>> {
        let data = self.data.lock().unwrap();
        let mut ids: Vec<VoucherId> = data
            .vouchers
            .values()
            .filter(|v| v.references(invoice))
            .map(|v| v.id.clone())
            .collect();
        ids.extend(data.dangling_vouchers.iter().cloned());
        Ok(ids)
    }

    fn invoices_with_original(&self, invoice: &InvoiceId) -> AppResult<Vec<InvoiceId>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .invoices
            .values()
            .filter(|i| i.original_invoice.as_ref() == Some(invoice))
            .map(|i| i.id.clone())
            .collect())
    }

    fn invoices_with_charge_origin(&self, origin: &ChargeRowRef) -> AppResult<Vec<InvoiceId>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .invoices
            .values()
            .filter(|i| i.items.iter().any(|item| item.charge_origin.as_ref() == Some(origin)))
            .map(|i| i.id.clone())
            .collect())
    }

    fn company_currency(&self, _company: &CompanyId) -> AppResult<Option<CurrencyCode>> {
        Ok(Some(CurrencyCode::from("SAR")))
    }

    fn allocation_rows(&self, target: &InvoiceId) -> AppResult<Vec<AllocationRow>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .rows
            .get(target)
            .cloned()
            .unwrap_or_default())
    }

    fn apply(&self, batch: WriteBatch) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if data.fail_apply {
            return Err(AppError::Persistence("connection reset".to_string()));
        }
        for op in batch.into_ops() {
            match op {
                WriteOp::DeleteGroup { target, source } => {
                    if let Some(rows) = data.rows.get_mut(&target) {
                        rows.retain(|row| row.source != source);
                    }
                }
                WriteOp::InsertRow(row) => {
                    data.rows.entry(row.target.clone()).or_default().push(row);
                }
            }
        }
        Ok(())
    }

    fn set_allocation_totals(&self, target: &InvoiceId, totals: AllocationTotals) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let invoice = data
            .invoices
            .get_mut(target)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {target}")))?;
        invoice.totals = totals;
        Ok(())
    }

    fn link_charge_row(&self, origin: &ChargeRowRef, invoice: &InvoiceId) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if let Some(row) = data
            .vouchers
            .get_mut(&origin.voucher)
            .and_then(|v| v.charges.iter_mut().find(|row| row.idx == origin.idx))
        {
            row.secondary_invoice = Some(invoice.clone());
        }
        Ok(())
    }
}

pub(crate) fn invoice(id: &str, status: DocStatus) -> Invoice {
    Invoice {
        id: InvoiceId::from(id),
        company: CompanyId::from("Aljamil"),
        supplier: None,
        currency: CurrencyCode::from("SAR"),
        conversion_rate: Decimal::ONE,
        posting_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        status,
        items: Vec::new(),
        taxes: Vec::new(),
        original_invoice: None,
        totals: AllocationTotals::default(),
    }
}

pub(crate) fn cost_invoice(id: &str, original: &str, status: DocStatus) -> Invoice {
    Invoice {
        original_invoice: Some(InvoiceId::from(original)),
        ..invoice(id, status)
    }
}

pub(crate) fn voucher(id: &str, status: DocStatus, targets: &[&str]) -> ChargeVoucher {
    ChargeVoucher {
        id: VoucherId::from(id),
        company: CompanyId::from("Aljamil"),
        posting_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        status,
        charges: Vec::new(),
        receipts: targets
            .iter()
            .map(|target| ReceiptLink {
                document_type: ReceiptDocumentType::Invoice,
                document: (*target).to_string(),
                amount: Decimal::ONE_HUNDRED,
            })
            .collect(),
    }
}

pub(crate) fn candidate(item: &str, base: Decimal, tax: Decimal) -> AllocationCandidate {
    AllocationCandidate {
        service_item: ItemCode::from(item),
        base_amount: base,
        base_tax_amount: tax,
        amount: base,
        currency: CurrencyCode::from("SAR"),
    }
}
