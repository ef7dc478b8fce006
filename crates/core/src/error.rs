//! Reconciliation error types.
//!
//! Every extraction, materialization and persistence step returns
//! `ReconcileResult`. The orchestrator collects failed steps into a
//! `RunReport` instead of aborting the whole run.

use chrono::NaiveDate;
use landed_shared::AppError;
use landed_shared::types::{CompanyId, CurrencyCode, InvoiceId, SupplierId, VoucherId};
use thiserror::Error;

use crate::apportion::ApportionError;
use crate::document::SourceRef;

/// Result type alias using `ReconcileError`.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Broad classification of a failure, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid document field.
    Validation,
    /// Referenced document missing.
    NotFound,
    /// Tax or exchange-rate computation failed.
    Computation,
    /// Store write failed.
    Persistence,
    /// Conflicting document configuration.
    Conflict,
}

/// Errors that can occur while reconciling allocations.
#[derive(Debug, Error)]
pub enum ReconcileError {
    // ========== Lookup Errors ==========
    /// Invoice not found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Charge voucher not found.
    #[error("Charge voucher not found: {0}")]
    VoucherNotFound(VoucherId),

    // ========== State Errors ==========
    /// Source document is not submitted.
    #[error("{0} is not submitted")]
    SourceNotSubmitted(SourceRef),

    /// Target invoice no longer accepts new allocation rows.
    #[error("Invoice {0} is not a draft; new allocation rows cannot be inserted")]
    TargetNotDraft(InvoiceId),

    /// Invoice is not a cost invoice of another invoice.
    #[error("Invoice {0} has no original invoice")]
    NoOriginalInvoice(InvoiceId),

    // ========== Validation Errors ==========
    /// The same invoice is linked more than once by a voucher.
    #[error("Charge voucher {voucher} links invoice {invoice} more than once")]
    DuplicateReceiptLink {
        /// The voucher.
        voucher: VoucherId,
        /// The invoice linked twice.
        invoice: InvoiceId,
    },

    /// A required field is missing on an externally funded charge row.
    #[error("Row {idx}: {field} is required when the charge is billed by a supplier")]
    MissingChargeField {
        /// Charge row number.
        idx: u32,
        /// Missing field name.
        field: &'static str,
    },

    /// Supplier has no payable account.
    #[error("Supplier account not found for supplier {supplier} in company {company}")]
    PayableAccountMissing {
        /// The supplier.
        supplier: SupplierId,
        /// The company.
        company: CompanyId,
    },

    /// Company has no base currency configured.
    #[error("No base currency configured for company {0}")]
    CompanyCurrencyMissing(CompanyId),

    // ========== Computation Errors ==========
    /// No exchange rate found for the currency pair on the given date.
    #[error("No exchange rate found for {from} to {to} on {date}")]
    NoExchangeRate {
        /// Source currency code.
        from: CurrencyCode,
        /// Target currency code.
        to: CurrencyCode,
        /// Date for which the rate was requested.
        date: NaiveDate,
    },

    /// An item's tax-rate map could not be parsed.
    #[error("Malformed item tax rate on {item}: {reason}")]
    MalformedTaxRate {
        /// Item key.
        item: String,
        /// Parser message.
        reason: String,
    },

    /// Decimal arithmetic on stored amounts overflowed.
    #[error("Arithmetic overflow while {0}")]
    Overflow(String),

    /// Charges could not be apportioned across targets.
    #[error(transparent)]
    Apportion(#[from] ApportionError),

    // ========== Collaborator Errors ==========
    /// A collaborator call failed.
    #[error("{context}: {error}")]
    Collaborator {
        /// What the engine was doing.
        context: String,
        /// The collaborator's error.
        #[source]
        error: AppError,
    },
}

impl ReconcileError {
    /// Wraps a collaborator error with context.
    pub fn collaborator(context: impl Into<String>, error: AppError) -> Self {
        Self::Collaborator {
            context: context.into(),
            error,
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvoiceNotFound(_) | Self::VoucherNotFound(_) => ErrorKind::NotFound,
            Self::SourceNotSubmitted(_)
            | Self::TargetNotDraft(_)
            | Self::NoOriginalInvoice(_)
            | Self::MissingChargeField { .. }
            | Self::PayableAccountMissing { .. }
            | Self::CompanyCurrencyMissing(_) => ErrorKind::Validation,
            Self::DuplicateReceiptLink { .. } => ErrorKind::Conflict,
            Self::NoExchangeRate { .. }
            | Self::MalformedTaxRate { .. }
            | Self::Overflow(_)
            | Self::Apportion(_) => ErrorKind::Computation,
            Self::Collaborator { error, .. } => match error {
                AppError::NotFound(_) => ErrorKind::NotFound,
                AppError::Validation(_) => ErrorKind::Validation,
                AppError::Computation(_) | AppError::ExternalService(_) => ErrorKind::Computation,
                AppError::Conflict(_) => ErrorKind::Conflict,
                AppError::Persistence(_) | AppError::Internal(_) => ErrorKind::Persistence,
            },
        }
    }

    /// Returns the error code for reports.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            Self::VoucherNotFound(_) => "VOUCHER_NOT_FOUND",
            Self::SourceNotSubmitted(_) => "SOURCE_NOT_SUBMITTED",
            Self::TargetNotDraft(_) => "TARGET_NOT_DRAFT",
            Self::NoOriginalInvoice(_) => "NO_ORIGINAL_INVOICE",
            Self::DuplicateReceiptLink { .. } => "DUPLICATE_RECEIPT_LINK",
            Self::MissingChargeField { .. } => "MISSING_CHARGE_FIELD",
            Self::PayableAccountMissing { .. } => "PAYABLE_ACCOUNT_MISSING",
            Self::CompanyCurrencyMissing(_) => "COMPANY_CURRENCY_MISSING",
            Self::NoExchangeRate { .. } => "NO_EXCHANGE_RATE",
            Self::MalformedTaxRate { .. } => "MALFORMED_TAX_RATE",
            Self::Overflow(_) => "ARITHMETIC_OVERFLOW",
            Self::Apportion(_) => "APPORTION_FAILED",
            Self::Collaborator { error, .. } => error.error_code(),
        }
    }

    /// Returns true if re-running the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Collaborator { error, .. } => error.is_retryable(),
            _ => false,
        }
    }
}
