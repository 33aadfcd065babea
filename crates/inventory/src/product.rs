use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::{InventoryError, Result};

/// A catalog product together with its available stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub unit_price: Money,
    /// Units available for sale. Never negative.
    pub quantity: u32,
    pub category: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Returns the display fields joined into ledger listings.
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            unit_price: self.unit_price,
            image: self.image.clone(),
        }
    }

    /// Returns true if this product's name matches `name` exactly, ignoring case
    /// and surrounding whitespace.
    pub fn name_matches(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }
}

/// Read-time projection of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub unit_price: Money,
    pub image: String,
}

/// Padding stripped from names before comparison. Kept in step with the
/// `btrim(name, E' \t\r\n')` used by the PostgreSQL store.
pub const NAME_PADDING: [char; 4] = [' ', '\t', '\r', '\n'];

/// Canonical form used for exact case-insensitive name lookups.
pub fn normalize_name(name: &str) -> String {
    name.trim_matches(NAME_PADDING).to_lowercase()
}

/// A product as submitted by the catalog collaborator.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: Option<ProductId>,
    pub name: String,
    pub description: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub category: String,
    pub image: String,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, unit_price: Money, quantity: u32) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            unit_price,
            quantity,
            category: String::new(),
            image: String::new(),
        }
    }

    /// Pins the product id instead of generating one.
    pub fn with_id(mut self, id: ProductId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Checks catalog-side invariants before the product is stored.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(InventoryError::InvalidProduct(
                "name must not be blank".to_string(),
            ));
        }
        if self.unit_price.is_negative() {
            return Err(InventoryError::InvalidProduct(format!(
                "price must not be negative, got {}",
                self.unit_price
            )));
        }
        Ok(())
    }

    pub(crate) fn into_product(self, created_at: DateTime<Utc>) -> Product {
        Product {
            id: self.id.unwrap_or_default(),
            name: self.name,
            description: self.description,
            unit_price: self.unit_price,
            quantity: self.quantity,
            category: self.category,
            image: self.image,
            created_at,
        }
    }
}
