//! Charge (landed cost) voucher records.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use landed_shared::types::{CompanyId, CurrencyCode, InvoiceId, ItemCode, SupplierId, VoucherId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::invoice::DocStatus;
use crate::error::ReconcileError;

/// A voucher carrying extra costs (freight, customs, ...) for one or more receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeVoucher {
    /// Voucher name.
    pub id: VoucherId,
    /// Owning company.
    pub company: CompanyId,
    /// Posting date.
    pub posting_date: NaiveDate,
    /// Lifecycle status.
    pub status: DocStatus,
    /// Charge rows.
    pub charges: Vec<ChargeRow>,
    /// Receipts the charges apply to.
    pub receipts: Vec<ReceiptLink>,
}

/// Document type a receipt link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptDocumentType {
    /// Purchase invoice.
    Invoice,
    /// Purchase receipt (not reconciled by this engine).
    PurchaseReceipt,
}

/// Link from a voucher to a receipt document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLink {
    /// Linked document type.
    pub document_type: ReceiptDocumentType,
    /// Linked document name.
    pub document: String,
    /// Grand total of the linked receipt, used to apportion charges.
    pub amount: Decimal,
}

/// One line of extra cost on a voucher.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChargeRow {
    /// 1-based row number.
    pub idx: u32,
    /// Free-text description.
    pub description: String,
    /// Service item that carries the cost.
    pub service_item: Option<ItemCode>,
    /// Amount in transaction currency.
    pub amount: Decimal,
    /// Amount in base currency.
    pub base_amount: Decimal,
    /// Transaction currency, when it differs from the company's.
    pub currency: Option<CurrencyCode>,
    /// Whether an external supplier bills this cost.
    pub externally_funded: bool,
    /// Billing supplier for externally funded rows.
    pub supplier: Option<SupplierId>,
    /// Secondary invoice created for this row.
    pub secondary_invoice: Option<InvoiceId>,
}

/// Reference to a specific charge row of a voucher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChargeRowRef {
    /// Owning voucher.
    pub voucher: VoucherId,
    /// Row number within the voucher.
    pub idx: u32,
}

impl ChargeRow {
    /// Returns the service item if it is set and not blank.
    #[must_use]
    pub fn item(&self) -> Option<&ItemCode> {
        self.service_item.as_ref().filter(|item| !item.is_blank())
    }

    /// Returns the supplier if it is set and not blank.
    #[must_use]
    pub fn billing_supplier(&self) -> Option<&SupplierId> {
        self.supplier.as_ref().filter(|supplier| !supplier.is_blank())
    }

    /// Transaction currency, falling back to the company's base currency.
    #[must_use]
    pub fn currency_or<'a>(&'a self, base_currency: &'a CurrencyCode) -> &'a CurrencyCode {
        self.currency
            .as_ref()
            .filter(|currency| !currency.is_blank())
            .unwrap_or(base_currency)
    }

    /// Reference to this row within `voucher`.
    #[must_use]
    pub fn row_ref(&self, voucher: &VoucherId) -> ChargeRowRef {
        ChargeRowRef {
            voucher: voucher.clone(),
            idx: self.idx,
        }
    }
}

impl ChargeVoucher {
    /// Invoice targets with their apportioning weights, in link order.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::DuplicateReceiptLink` if the same invoice is
    /// linked more than once.
    pub fn invoice_targets(&self) -> Result<Vec<(InvoiceId, Decimal)>, ReconcileError> {
        let mut seen = BTreeSet::new();
        let mut targets = Vec::new();
        for link in self
            .receipts
            .iter()
            .filter(|link| link.document_type == ReceiptDocumentType::Invoice)
        {
            let invoice = InvoiceId::new(link.document.clone());
            if !seen.insert(invoice.clone()) {
                return Err(ReconcileError::DuplicateReceiptLink {
                    voucher: self.id.clone(),
                    invoice,
                });
            }
            targets.push((invoice, link.amount));
        }
        Ok(targets)
    }

    /// Distinct invoice targets in link order, tolerating duplicates.
    #[must_use]
    pub fn invoice_target_ids(&self) -> Vec<InvoiceId> {
        let mut seen = BTreeSet::new();
        self.receipts
            .iter()
            .filter(|link| link.document_type == ReceiptDocumentType::Invoice)
            .map(|link| InvoiceId::new(link.document.clone()))
            .filter(|invoice| seen.insert(invoice.clone()))
            .collect()
    }

    /// Returns true if any receipt link references `invoice` as an invoice.
    #[must_use]
    pub fn references(&self, invoice: &InvoiceId) -> bool {
        self.receipts.iter().any(|link| {
            link.document_type == ReceiptDocumentType::Invoice && link.document == invoice.as_str()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn voucher(receipts: Vec<ReceiptLink>) -> ChargeVoucher {
        ChargeVoucher {
            id: VoucherId::from("LCV-1"),
            company: CompanyId::from("Aljamil"),
            posting_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            status: DocStatus::Submitted,
            charges: vec![],
            receipts,
        }
    }

    fn link(document_type: ReceiptDocumentType, document: &str, amount: Decimal) -> ReceiptLink {
        ReceiptLink {
            document_type,
            document: document.to_string(),
            amount,
        }
    }

    #[test]
    fn test_invoice_targets_skip_purchase_receipts() {
        let voucher = voucher(vec![
            link(ReceiptDocumentType::PurchaseReceipt, "PR-1", dec!(10)),
            link(ReceiptDocumentType::Invoice, "PINV-1", dec!(500)),
        ]);
        let targets = voucher.invoice_targets().unwrap();
        assert_eq!(targets, vec![(InvoiceId::from("PINV-1"), dec!(500))]);
    }

    #[test]
    fn test_duplicate_invoice_link_is_rejected() {
        let voucher = voucher(vec![
            link(ReceiptDocumentType::Invoice, "PINV-1", dec!(500)),
            link(ReceiptDocumentType::Invoice, "PINV-1", dec!(500)),
        ]);
        let err = voucher.invoice_targets().unwrap_err();
        assert!(matches!(err, ReconcileError::DuplicateReceiptLink { .. }));
        assert_eq!(voucher.invoice_target_ids(), vec![InvoiceId::from("PINV-1")]);
    }

    #[test]
    fn test_references() {
        let voucher = voucher(vec![link(ReceiptDocumentType::Invoice, "PINV-1", dec!(1))]);
        assert!(voucher.references(&InvoiceId::from("PINV-1")));
        assert!(!voucher.references(&InvoiceId::from("PINV-2")));
    }

    #[test]
    fn test_currency_falls_back_to_base() {
        let base = CurrencyCode::from("SAR");
        let row = ChargeRow::default();
        assert_eq!(row.currency_or(&base).as_str(), "SAR");

        let row = ChargeRow {
            currency: Some(CurrencyCode::from("USD")),
            ..ChargeRow::default()
        };
        assert_eq!(row.currency_or(&base).as_str(), "USD");
    }
}
