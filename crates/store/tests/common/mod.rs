//! Shared fixture for the reconciliation integration tests.
//!
//! A `World` owns an in-memory store and the static collaborators; the
//! reconciler borrows them. Company "Aljamil" keeps its books in SAR.

#![allow(dead_code)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

use chrono::NaiveDate;
use landed_core::document::{
    AllocationRow, ChargeRow, ChargeVoucher, DocStatus, Invoice, InvoiceItem, ReceiptDocumentType,
    ReceiptLink, SourceRef,
};
use landed_core::{Collaborators, Reconciler};
use landed_shared::ReconcileConfig;
use landed_shared::types::{CompanyId, CurrencyCode, InvoiceId, ItemCode, SupplierId, VoucherId};
use landed_store::{ExchangeRate, ItemwiseTaxDetail, MemoryStore, StaticParties, StaticRates};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const COMPANY: &str = "Aljamil";
pub const BASE: &str = "SAR";

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

pub fn inv(id: &str) -> InvoiceId {
    InvoiceId::from(id)
}

pub fn voucher_source(id: &str) -> SourceRef {
    SourceRef::ChargeVoucher(VoucherId::from(id))
}

pub fn invoice_source(id: &str) -> SourceRef {
    SourceRef::Invoice(InvoiceId::from(id))
}

pub struct World {
    pub store: MemoryStore,
    pub rates: StaticRates,
    pub parties: StaticParties,
    pub taxes: ItemwiseTaxDetail,
    pub config: ReconcileConfig,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(ReconcileConfig::default())
    }

    pub fn with_config(config: ReconcileConfig) -> Self {
        let store = MemoryStore::new();
        store.set_company_currency(CompanyId::from(COMPANY), CurrencyCode::from(BASE));
        let rates = StaticRates::new()
            .with_rate(ExchangeRate::new("USD", BASE, dec!(3.75), date(1)))
            .unwrap();
        let parties = StaticParties::new()
            .with_supplier_account("SUP-1", COMPANY, "Freight Payable - AJ")
            .with_supplier_account("SUP-2", COMPANY, "Customs Payable - AJ")
            .with_supplier_account("SUP-USD", COMPANY, "Foreign Payable - AJ");
        Self {
            store,
            rates,
            parties,
            taxes: ItemwiseTaxDetail,
            config,
        }
    }

    pub fn with_parties(mut self, parties: StaticParties) -> Self {
        self.parties = parties;
        self
    }

    pub fn with_rates(mut self, rates: StaticRates) -> Self {
        self.rates = rates;
        self
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(
            Collaborators {
                store: &self.store,
                lifecycle: &self.store,
                taxes: &self.taxes,
                rates: &self.rates,
                parties: &self.parties,
            },
            self.config.clone(),
        )
    }

    pub fn invoice(&self, id: &str) -> Invoice {
        self.store.snapshot().invoices[&inv(id)].clone()
    }

    pub fn voucher(&self, id: &str) -> ChargeVoucher {
        self.store.snapshot().vouchers[&VoucherId::from(id)].clone()
    }

    pub fn rows(&self, target: &str) -> Vec<AllocationRow> {
        self.store
            .snapshot()
            .allocation_rows
            .get(&inv(target))
            .cloned()
            .unwrap_or_default()
    }

    pub fn rows_from(&self, target: &str, source: &SourceRef) -> Vec<AllocationRow> {
        self.rows(target)
            .into_iter()
            .filter(|row| &row.source == source)
            .collect()
    }

    pub fn set_invoice_status(&self, id: &str, status: DocStatus) {
        self.store
            .update_invoice(&inv(id), |invoice| invoice.status = status)
            .unwrap();
    }

    pub fn set_voucher_status(&self, id: &str, status: DocStatus) {
        self.store
            .update_voucher(&VoucherId::from(id), |voucher| voucher.status = status)
            .unwrap();
    }
}

/// A draft goods invoice with a single stock line.
pub fn draft_invoice(id: &str) -> Invoice {
    Invoice {
        id: inv(id),
        company: CompanyId::from(COMPANY),
        supplier: Some(SupplierId::from("GOODS-SUP")),
        currency: CurrencyCode::from(BASE),
        conversion_rate: Decimal::ONE,
        posting_date: date(1),
        status: DocStatus::Draft,
        items: vec![line("STOCK-1", dec!(1000))],
        taxes: Vec::new(),
        original_invoice: None,
        totals: Default::default(),
    }
}

/// A submitted cost invoice pointing at `original`.
pub fn cost_invoice(id: &str, original: &str, lines: Vec<InvoiceItem>) -> Invoice {
    Invoice {
        id: inv(id),
        supplier: Some(SupplierId::from("SUP-1")),
        status: DocStatus::Submitted,
        items: lines,
        original_invoice: Some(inv(original)),
        ..draft_invoice(id)
    }
}

/// A base currency invoice line.
pub fn line(item: &str, amount: Decimal) -> InvoiceItem {
    InvoiceItem {
        item_code: Some(ItemCode::from(item)),
        item_name: None,
        qty: Decimal::ONE,
        rate: amount,
        amount,
        base_net_amount: amount,
        item_tax_rate: None,
        charge_origin: None,
    }
}

/// A submitted voucher linked to the given invoices with their receipt amounts.
pub fn voucher(id: &str, receipts: &[(&str, Decimal)], charges: Vec<ChargeRow>) -> ChargeVoucher {
    ChargeVoucher {
        id: VoucherId::from(id),
        company: CompanyId::from(COMPANY),
        posting_date: date(2),
        status: DocStatus::Submitted,
        charges,
        receipts: receipts
            .iter()
            .map(|(document, amount)| ReceiptLink {
                document_type: ReceiptDocumentType::Invoice,
                document: (*document).to_string(),
                amount: *amount,
            })
            .collect(),
    }
}

/// A charge carried by the voucher itself, in base currency.
pub fn own_charge(idx: u32, item: &str, amount: Decimal) -> ChargeRow {
    ChargeRow {
        idx,
        description: format!("{item} charge"),
        service_item: Some(ItemCode::from(item)),
        amount,
        base_amount: amount,
        currency: None,
        externally_funded: false,
        supplier: None,
        secondary_invoice: None,
    }
}

/// A charge billed to `supplier`, in base currency.
pub fn funded_charge(idx: u32, item: &str, supplier: &str, amount: Decimal) -> ChargeRow {
    ChargeRow {
        externally_funded: true,
        supplier: Some(SupplierId::from(supplier)),
        ..own_charge(idx, item, amount)
    }
}

/// A charge billed to `supplier` in a foreign currency.
pub fn foreign_charge(
    idx: u32,
    item: &str,
    supplier: &str,
    currency: &str,
    amount: Decimal,
    base_amount: Decimal,
) -> ChargeRow {
    ChargeRow {
        currency: Some(CurrencyCode::from(currency)),
        base_amount,
        ..funded_charge(idx, item, supplier, amount)
    }
}
