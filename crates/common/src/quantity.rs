use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected quantity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("quantity must be a positive integer, got {0}")]
pub struct InvalidQuantity(pub i64);

/// Strictly positive number of units requested for one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Validates a raw requested quantity. Zero, negatives and values above
    /// `u32::MAX` are rejected.
    pub fn new(raw: i64) -> Result<Self, InvalidQuantity> {
        match u32::try_from(raw) {
            Ok(value) if value > 0 => Ok(Self(value)),
            _ => Err(InvalidQuantity(raw)),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = InvalidQuantity;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
