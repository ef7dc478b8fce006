//! Purchase invoice records.

use chrono::NaiveDate;
use landed_shared::types::{AccountId, CompanyId, CurrencyCode, InvoiceId, ItemCode, SupplierId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::allocation::AllocationTotals;
use super::voucher::ChargeRowRef;

/// Document lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    /// Document is being drafted and can be modified.
    #[default]
    Draft,
    /// Document has been submitted (immutable apart from derived fields).
    Submitted,
    /// Document has been cancelled.
    Cancelled,
}

impl DocStatus {
    /// Returns true if child rows may still be inserted.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if the document counts as a source of allocations.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted)
    }

    /// Returns true unless the document has been cancelled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// A purchase invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice name.
    pub id: InvoiceId,
    /// Owning company.
    pub company: CompanyId,
    /// Billing supplier, if any.
    pub supplier: Option<SupplierId>,
    /// Transaction currency.
    pub currency: CurrencyCode,
    /// Transaction to base currency conversion rate.
    pub conversion_rate: Decimal,
    /// Posting date.
    pub posting_date: NaiveDate,
    /// Lifecycle status.
    pub status: DocStatus,
    /// Line items.
    pub items: Vec<InvoiceItem>,
    /// Tax and charge rows.
    pub taxes: Vec<TaxRow>,
    /// Invoice whose cost this invoice covers (set on secondary invoices).
    pub original_invoice: Option<InvoiceId>,
    /// Derived allocation totals.
    #[serde(default)]
    pub totals: AllocationTotals,
}

/// A line item on an invoice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Item code.
    pub item_code: Option<ItemCode>,
    /// Item name.
    pub item_name: Option<String>,
    /// Quantity.
    pub qty: Decimal,
    /// Unit rate in transaction currency.
    pub rate: Decimal,
    /// Net amount in transaction currency.
    pub amount: Decimal,
    /// Net amount in base currency.
    pub base_net_amount: Decimal,
    /// JSON object mapping tax component to percentage.
    pub item_tax_rate: Option<String>,
    /// Charge row this line bills, on secondary invoices.
    pub charge_origin: Option<ChargeRowRef>,
}

impl InvoiceItem {
    /// Returns the item code if it is set and not blank.
    #[must_use]
    pub fn code(&self) -> Option<&ItemCode> {
        self.item_code.as_ref().filter(|code| !code.is_blank())
    }

    /// Key used by the itemised tax breakdown: item code, else item name.
    #[must_use]
    pub fn tax_key(&self) -> Option<&str> {
        self.code().map(ItemCode::as_str).or_else(|| {
            self.item_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
        })
    }
}

/// A tax or charge row on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRow {
    /// Ledger account the tax posts to.
    pub account_head: AccountId,
    /// Tax component description.
    pub description: String,
    /// Per-item tax breakdown as stored by the ERP (JSON).
    pub item_wise_tax_detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_status_predicates() {
        assert!(DocStatus::Draft.is_draft());
        assert!(!DocStatus::Submitted.is_draft());
        assert!(DocStatus::Submitted.is_submitted());
        assert!(!DocStatus::Cancelled.is_submitted());
        assert!(DocStatus::Draft.is_live());
        assert!(DocStatus::Submitted.is_live());
        assert!(!DocStatus::Cancelled.is_live());
    }

    #[test]
    fn test_item_code_ignores_blank() {
        let item = InvoiceItem {
            item_code: Some(ItemCode::from("  ")),
            ..InvoiceItem::default()
        };
        assert!(item.code().is_none());
    }

    #[test]
    fn test_tax_key_falls_back_to_item_name() {
        let item = InvoiceItem {
            item_code: None,
            item_name: Some("Sea freight".to_string()),
            ..InvoiceItem::default()
        };
        assert_eq!(item.tax_key(), Some("Sea freight"));

        let item = InvoiceItem {
            item_code: Some(ItemCode::from("SVC01")),
            item_name: Some("Sea freight".to_string()),
            ..InvoiceItem::default()
        };
        assert_eq!(item.tax_key(), Some("SVC01"));
    }
}
