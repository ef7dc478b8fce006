//! In-process collaborators for the Landed reconciliation engine.
//!
//! - `memory` - Document store and invoice lifecycle held in memory
//! - `rates` - Dated exchange rate table
//! - `parties` - Supplier payable accounts
//! - `tax` - Itemised tax read from stored per-item breakdowns

pub mod memory;
pub mod parties;
pub mod rates;
pub mod tax;

pub use memory::{MemoryStore, Snapshot};
pub use parties::StaticParties;
pub use rates::{ExchangeRate, RateError, StaticRates};
pub use tax::ItemwiseTaxDetail;
