//! Shared types for the settlement engine crates.

pub mod money;
pub mod quantity;
pub mod types;

pub use money::Money;
pub use quantity::{InvalidQuantity, Quantity};
pub use types::{BuyerId, CheckoutId, IdentifierCheck, ProductId, SaleId};
