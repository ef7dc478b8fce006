//! Typed ERP records the reconciliation engine reads and writes.
//!
//! - `invoice` - purchase invoices, their line items and tax rows
//! - `voucher` - charge vouchers, charge rows and receipt links
//! - `allocation` - the derived allocation ledger and its totals

pub mod allocation;
pub mod invoice;
pub mod voucher;

pub use allocation::{AllocationCandidate, AllocationRow, AllocationTotals, SourceKind, SourceRef};
pub use invoice::{DocStatus, Invoice, InvoiceItem, TaxRow};
pub use voucher::{ChargeRow, ChargeRowRef, ChargeVoucher, ReceiptDocumentType, ReceiptLink};
