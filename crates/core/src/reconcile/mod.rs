//! Reconciliation orchestration and run reporting.

mod report;
mod service;

pub use report::{Failure, FailureScope, RefreshOutcome, RunReport};
pub use service::{Collaborators, Reconciler};
