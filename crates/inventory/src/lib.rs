//! Inventory store for the settlement engine.
//!
//! Holds the authoritative available quantity of every product and exposes
//! a single atomic conditional decrement, [`InventoryStore::try_reserve`].
//! Two implementations are provided: an in-memory store for tests and
//! single-process deployments, and a PostgreSQL store.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod product;
pub mod store;

pub use error::{InventoryError, Result};
pub use memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use product::{NewProduct, Product, ProductSummary, normalize_name};
pub use store::{InventoryStore, Reservation};
