//! Sales history and direct sale endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::BuyerId;
use inventory::InventoryStore;
use ledger::SaleLedger;
use serde::{Deserialize, Serialize};
use settlement::{DirectSaleReceipt, DirectSaleRequest, SaleView};

use crate::error::ApiError;
use crate::routes::checkout::ProductResponse;
use crate::routes::{BUYER_HEADER, buyer_from};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectSaleBody {
    #[serde(alias = "productoId")]
    pub product_id: Option<String>,
    #[serde(alias = "cantidad")]
    pub quantity: Option<i64>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub id: String,
    pub checkout_id: Option<String>,
    pub product_id: Option<String>,
    pub product: Option<ProductResponse>,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub buyer: String,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: String,
}

impl From<&SaleView> for SaleResponse {
    fn from(view: &SaleView) -> Self {
        let record = &view.record;
        Self {
            id: record.id().to_string(),
            checkout_id: record.checkout_id().map(|id| id.to_string()),
            product_id: record.product_id().map(|id| id.to_string()),
            product: view.product.as_ref().map(ProductResponse::from),
            quantity: record.quantity().get(),
            unit_price_cents: record.unit_price().cents(),
            line_total_cents: record.line_total().cents(),
            buyer: record.buyer().to_string(),
            status: record.status().to_string(),
            reason: record.reason().map(|r| r.to_string()),
            created_at: record.created_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DirectSaleResponse {
    pub sale_id: Option<String>,
    pub product: ProductResponse,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub remaining_quantity: u32,
    pub created_at: String,
}

impl From<&DirectSaleReceipt> for DirectSaleResponse {
    fn from(receipt: &DirectSaleReceipt) -> Self {
        Self {
            sale_id: receipt.sale_id.map(|id| id.to_string()),
            product: ProductResponse::from(&receipt.product),
            quantity: receipt.quantity.get(),
            unit_price_cents: receipt.unit_price.cents(),
            total_cents: receipt.total.cents(),
            remaining_quantity: receipt.remaining_quantity,
            created_at: receipt.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// GET /sales/mine: the calling buyer's sales, newest first.
#[tracing::instrument(skip(state, headers))]
pub async fn mine<I, L>(
    State(state): State<Arc<AppState<I, L>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SaleResponse>>, ApiError>
where
    I: InventoryStore + Clone + 'static,
    L: SaleLedger + Clone + 'static,
{
    let buyer = buyer_from(&headers)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {BUYER_HEADER} header")))?;

    let views = state.history.for_buyer(&buyer).await?;
    Ok(Json(views.iter().map(SaleResponse::from).collect()))
}

/// GET /sales: the most recent sales across all buyers.
#[tracing::instrument(skip(state))]
pub async fn recent<I, L>(
    State(state): State<Arc<AppState<I, L>>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<SaleResponse>>, ApiError>
where
    I: InventoryStore + Clone + 'static,
    L: SaleLedger + Clone + 'static,
{
    let views = state.history.recent(query.limit).await?;
    Ok(Json(views.iter().map(SaleResponse::from).collect()))
}

/// POST /sales: sell a single product outside any checkout.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create<I, L>(
    State(state): State<Arc<AppState<I, L>>>,
    headers: HeaderMap,
    Json(body): Json<DirectSaleBody>,
) -> Result<(StatusCode, Json<DirectSaleResponse>), ApiError>
where
    I: InventoryStore + Clone + 'static,
    L: SaleLedger + Clone + 'static,
{
    let request = DirectSaleRequest {
        buyer: buyer_from(&headers).unwrap_or_else(BuyerId::anonymous),
        product_id: body.product_id.unwrap_or_default(),
        quantity: body.quantity.unwrap_or(0),
    };

    let receipt = state.orchestrator.sell(request).await?;

    Ok((StatusCode::CREATED, Json(DirectSaleResponse::from(&receipt))))
}
