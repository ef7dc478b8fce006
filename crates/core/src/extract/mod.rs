//! Computing the allocation rows a source document contributes.
//!
//! Extraction is pure apart from the itemised-tax lookup: nothing is
//! persisted here. Rows are produced per charge row or per invoice line and
//! are never aggregated by cost item.

pub mod invoice;
pub mod tax;
pub mod voucher;

use std::collections::BTreeSet;

use landed_shared::ReconcileConfig;
use landed_shared::types::{AccountId, CurrencyCode};

use crate::document::{AllocationCandidate, ChargeVoucher, Invoice};
use crate::error::ReconcileError;
use crate::ports::TaxService;

pub use voucher::is_own_charge;

/// Extraction settings supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Tax accounts left out of the itemised tax lookup.
    pub excluded_tax_accounts: BTreeSet<AccountId>,
}

impl From<&ReconcileConfig> for ExtractOptions {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            excluded_tax_accounts: config.excluded_tax_accounts.clone(),
        }
    }
}

/// Candidate rows of one source plus the non-fatal problems met on the way.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Candidate rows in source order.
    pub rows: Vec<AllocationCandidate>,
    /// Computation problems that defaulted a tax amount to zero.
    pub warnings: Vec<ReconcileError>,
}

/// A source document ready for extraction.
#[derive(Debug, Clone, Copy)]
pub enum SourceDocument<'d> {
    /// A voucher with its company's base currency.
    ChargeVoucher(&'d ChargeVoucher, &'d CurrencyCode),
    /// A cost invoice.
    Invoice(&'d Invoice),
}

/// Extracts candidate allocation rows from source documents.
pub struct AllocationExtractor<'a> {
    taxes: &'a dyn TaxService,
    options: ExtractOptions,
}

impl<'a> AllocationExtractor<'a> {
    /// Creates an extractor.
    #[must_use]
    pub fn new(taxes: &'a dyn TaxService, options: ExtractOptions) -> Self {
        Self { taxes, options }
    }

    /// Returns the extraction options.
    #[must_use]
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extracts from either kind of source.
    #[must_use]
    pub fn extract(&self, source: SourceDocument<'_>) -> Extraction {
        match source {
            SourceDocument::ChargeVoucher(voucher, base_currency) => Extraction {
                rows: self.from_voucher(voucher, base_currency),
                warnings: Vec::new(),
            },
            SourceDocument::Invoice(invoice) => self.from_invoice(invoice),
        }
    }

    /// Rows carried by the voucher's own (not externally funded) charges.
    #[must_use]
    pub fn from_voucher(
        &self,
        voucher: &ChargeVoucher,
        base_currency: &CurrencyCode,
    ) -> Vec<AllocationCandidate> {
        voucher::voucher_candidates(voucher, base_currency)
    }

    /// Rows carried by an invoice's line items, with their base tax.
    #[must_use]
    pub fn from_invoice(&self, invoice: &Invoice) -> Extraction {
        invoice::invoice_candidates(invoice, self.taxes, &self.options)
    }
}
