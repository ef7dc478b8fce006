//! Core reconciliation logic for Landed.
//!
//! This crate maintains the allocated-cost ledger of purchase invoices with
//! ZERO storage dependencies. Documents are read and written through the
//! collaborator traits in `ports`.
//!
//! # Modules
//!
//! - `document` - Typed invoice, voucher and allocation records
//! - `locator` - Finding the sources linked to a target invoice
//! - `extract` - Computing the rows a source contributes
//! - `apportion` - Splitting charges across several targets
//! - `ledger` - Atomic per-source group replacement
//! - `totals` - Derived allocation totals
//! - `materialize` - Secondary invoices for supplier-billed charges
//! - `reconcile` - Orchestration of lifecycle events and refreshes

pub mod apportion;
pub mod document;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod locator;
pub mod materialize;
pub mod ports;
pub mod reconcile;
pub mod totals;

#[cfg(test)]
mod apportion_props;
#[cfg(test)]
mod testing;

pub use error::{ErrorKind, ReconcileError, ReconcileResult};
pub use reconcile::{Collaborators, Reconciler, RefreshOutcome, RunReport};
