use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::ledger;
use crate::util::extract_request_meta;

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    /// License key identifying the purchasing account.
    pub key: String,
    pub package_id: String,
    pub months: i64,
}

#[derive(Debug, Serialize)]
pub struct BuyResponse {
    pub success: bool,
    pub order_id: String,
    pub amount: i64,
    pub expires_at: i64,
    pub new_balance: i64,
}

/// POST /api/buy - purchase a package from the account balance. Upgrades
/// accumulate remaining time and carry the device binding forward; every
/// mutation commits atomically or not at all.
pub async fn buy_package(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BuyRequest>,
) -> Result<Json<BuyResponse>> {
    let mut conn = state.db.get()?;

    let account = queries::get_account_by_license_key(&conn, &request.key)?
        .ok_or_else(|| AppError::NotFound("License key not found".into()))?;

    let meta = extract_request_meta(&headers);
    let outcome = ledger::purchase(
        &mut conn,
        &account.id,
        &request.package_id,
        request.months,
        &meta,
    )?;

    let expires_at = outcome
        .order
        .expires_at
        .ok_or_else(|| AppError::Internal("completed order has no expiry".into()))?;

    Ok(Json(BuyResponse {
        success: true,
        order_id: outcome.order.id,
        amount: outcome.order.amount,
        expires_at,
        new_balance: outcome.new_balance,
    }))
}
