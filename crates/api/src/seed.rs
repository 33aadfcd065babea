//! Startup catalog seeding from a JSON file.

use std::path::Path;

use common::Money;
use inventory::{InventoryError, InventoryStore, NewProduct};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),
}

/// One catalog entry in the seed file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

/// Creates every product whose name is not in the catalog yet. Existing
/// products are left untouched.
pub async fn seed_catalog<I>(store: &I, products: Vec<SeedProduct>) -> Result<SeedReport, SeedError>
where
    I: InventoryStore + ?Sized,
{
    let mut report = SeedReport::default();
    for entry in products {
        if store.find_by_name(&entry.name).await?.is_some() {
            report.skipped += 1;
            continue;
        }
        let product = NewProduct::new(entry.name, Money::from_cents(entry.price_cents), entry.quantity)
            .description(entry.description)
            .category(entry.category)
            .image(entry.image);
        store.insert(product).await?;
        report.created += 1;
    }
    Ok(report)
}

/// Reads a seed file and applies it.
pub async fn seed_from_file<I>(store: &I, path: impl AsRef<Path>) -> Result<SeedReport, SeedError>
where
    I: InventoryStore + ?Sized,
{
    let raw = tokio::fs::read(path).await?;
    let products: Vec<SeedProduct> = serde_json::from_slice(&raw)?;
    seed_catalog(store, products).await
}
