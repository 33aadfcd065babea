//! Checkout settlement endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{BuyerId, CheckoutId, Money};
use inventory::{InventoryStore, ProductSummary};
use ledger::SaleLedger;
use serde::{Deserialize, Serialize};
use settlement::{
    CheckoutRequest, CheckoutResult, ItemOutcome, LineItem, ProductRef, SettlementError,
};

use crate::error::ApiError;
use crate::routes::buyer_from;
use crate::routes::sales::SaleResponse;
use crate::state::AppState;

// -- Request types --

/// Checkout body. Field names are camelCase; the alias keys older clients
/// send are accepted too. Every amount is in cents.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub items: Vec<CheckoutItemBody>,
    pub total_cents: Option<i64>,
    #[serde(rename = "total")]
    pub legacy_total: Option<i64>,
    pub shipping_cost_cents: Option<i64>,
    #[serde(rename = "shippingCost")]
    pub legacy_shipping_cost: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutItemBody {
    #[serde(rename = "productId")]
    pub product_id: Option<String>,
    #[serde(rename = "_id")]
    pub underscore_id: Option<String>,
    #[serde(rename = "productoId")]
    pub producto_id: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub nombre: Option<String>,
    #[serde(alias = "cantidad", alias = "qty")]
    pub quantity: Option<i64>,
    #[serde(rename = "unitPriceCents", alias = "precioFinalGuardado")]
    pub unit_price_cents: Option<i64>,
    pub precio: Option<i64>,
    pub price: Option<i64>,
}

impl CheckoutItemBody {
    fn product_ref(&self) -> ProductRef {
        ProductRef::from_keys(
            [
                self.product_id.as_deref(),
                self.underscore_id.as_deref(),
                self.producto_id.as_deref(),
                self.id.as_deref(),
            ],
            [self.name.as_deref(), self.nombre.as_deref()],
        )
    }

    fn into_line_item(self, index: usize) -> Result<LineItem, SettlementError> {
        LineItem::from_raw(
            index,
            self.product_ref(),
            self.quantity.unwrap_or(1),
            self.unit_price_cents.or(self.precio).or(self.price),
        )
    }
}

impl CheckoutBody {
    pub fn into_request(self, buyer: BuyerId) -> Result<CheckoutRequest, SettlementError> {
        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| item.into_line_item(index))
            .collect::<Result<Vec<_>, _>>()?;

        CheckoutRequest::new(
            buyer,
            items,
            Money::from_cents(self.total_cents.or(self.legacy_total).unwrap_or(0)),
            Money::from_cents(
                self.shipping_cost_cents
                    .or(self.legacy_shipping_cost)
                    .unwrap_or(0),
            ),
        )
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub unit_price_cents: i64,
    pub image: String,
}

impl From<&ProductSummary> for ProductResponse {
    fn from(p: &ProductSummary) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            description: p.description.clone(),
            unit_price_cents: p.unit_price.cents(),
            image: p.image.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub sale_id: Option<String>,
    pub product: Option<ProductResponse>,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub status: String,
    pub reason: Option<String>,
}

impl From<&ItemOutcome> for ItemResponse {
    fn from(item: &ItemOutcome) -> Self {
        Self {
            sale_id: item.sale_id.map(|id| id.to_string()),
            product: item.product.as_ref().map(ProductResponse::from),
            quantity: item.quantity.get(),
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total.cents(),
            status: item.status.to_string(),
            reason: item.reason.map(|r| r.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_id: String,
    pub approved: bool,
    pub items: Vec<ItemResponse>,
    pub total_cents: i64,
    pub shipping_cost_cents: i64,
    pub computed_total_cents: i64,
}

impl From<&CheckoutResult> for CheckoutResponse {
    fn from(result: &CheckoutResult) -> Self {
        Self {
            checkout_id: result.checkout_id.to_string(),
            approved: result.approved,
            items: result.items.iter().map(ItemResponse::from).collect(),
            total_cents: result.declared_total.cents(),
            shipping_cost_cents: result.shipping_cost.cents(),
            computed_total_cents: result.computed_total.cents(),
        }
    }
}

// -- Handlers --

/// POST /checkout: settle a checkout, one outcome per item.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create<I, L>(
    State(state): State<Arc<AppState<I, L>>>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError>
where
    I: InventoryStore + Clone + 'static,
    L: SaleLedger + Clone + 'static,
{
    let buyer = buyer_from(&headers).unwrap_or_else(BuyerId::anonymous);
    let request = body.into_request(buyer)?;

    let result = state.orchestrator.settle(request).await;

    Ok(Json(CheckoutResponse::from(&result)))
}

/// GET /checkout/:id: the sales recorded for one checkout attempt.
#[tracing::instrument(skip(state))]
pub async fn get<I, L>(
    State(state): State<Arc<AppState<I, L>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SaleResponse>>, ApiError>
where
    I: InventoryStore + Clone + 'static,
    L: SaleLedger + Clone + 'static,
{
    let checkout_id = parse_checkout_id(&id)?;
    let views = state.history.for_checkout(checkout_id).await?;
    if views.is_empty() {
        return Err(ApiError::NotFound(format!("Checkout {id} not found")));
    }

    Ok(Json(views.iter().map(SaleResponse::from).collect()))
}

fn parse_checkout_id(id: &str) -> Result<CheckoutId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(CheckoutId::from_uuid(uuid))
}
