//! Append-only sale ledger.
//!
//! One [`SaleRecord`] is written for every settled line item, whether it sold
//! or failed. Unit price and quantity are snapshotted at write time; product
//! display fields are joined at read time by the caller.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::InMemorySaleLedger;
pub use postgres::PostgresSaleLedger;
pub use record::{FailureReason, SaleLine, SaleRecord, SaleStatus};
pub use store::SaleLedger;
