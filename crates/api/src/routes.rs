pub mod checkout;
pub mod health;
pub mod metrics;
pub mod sales;

use axum::http::HeaderMap;
use common::BuyerId;

/// Header carrying the authenticated buyer identity.
pub const BUYER_HEADER: &str = "x-buyer-id";

/// Reads the buyer identity, if the request carries a non-blank one.
pub fn buyer_from(headers: &HeaderMap) -> Option<BuyerId> {
    headers
        .get(BUYER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(BuyerId::new)
}
