use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::ledger;
use crate::util::extract_request_meta;

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub account_id: String,
    pub package_id: String,
    pub months: i64,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub success: bool,
    pub order_id: String,
    pub expires_at: i64,
}

/// POST /admin/orders - manually grant an entitlement. Same accumulation
/// and binding-transfer arithmetic as a purchase, no balance debit.
pub async fn grant_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GrantRequest>,
) -> Result<Json<GrantResponse>> {
    let mut conn = state.db.get()?;

    queries::get_account_by_id(&conn, &request.account_id)?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    let meta = extract_request_meta(&headers);
    let outcome = ledger::grant(
        &mut conn,
        &request.account_id,
        &request.package_id,
        request.months,
        &meta,
    )?;

    let expires_at = outcome
        .order
        .expires_at
        .ok_or_else(|| AppError::Internal("completed order has no expiry".into()))?;

    Ok(Json(GrantResponse {
        success: true,
        order_id: outcome.order.id,
        expires_at,
    }))
}
