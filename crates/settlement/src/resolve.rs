//! Maps a client product reference to a catalog product.

use common::{IdentifierCheck, ProductId};
use inventory::{InventoryStore, Product};

use crate::request::ProductRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Product),
    Unresolved,
}

impl Resolution {
    pub fn product(&self) -> Option<&Product> {
        match self {
            Resolution::Resolved(product) => Some(product),
            Resolution::Unresolved => None,
        }
    }
}

/// Resolves a reference by identifier first, then by exact name.
///
/// A malformed identifier is never sent to storage; it falls through to the
/// name lookup the same way an unknown identifier does.
pub async fn resolve<I>(store: &I, product_ref: &ProductRef) -> inventory::Result<Resolution>
where
    I: InventoryStore + ?Sized,
{
    if let Some(raw) = product_ref.id() {
        match ProductId::parse(raw) {
            IdentifierCheck::Valid(id) => {
                if let Some(product) = store.get(id).await? {
                    return Ok(Resolution::Resolved(product));
                }
            }
            IdentifierCheck::Invalid => {
                tracing::debug!(identifier = raw, "malformed product identifier");
            }
        }
    }

    if let Some(name) = product_ref.name()
        && let Some(product) = store.find_by_name(name).await?
    {
        return Ok(Resolution::Resolved(product));
    }

    Ok(Resolution::Unresolved)
}
