use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::binding;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::ledger;
use crate::util::extract_request_meta;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub key: String,
    #[serde(default)]
    pub product_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    /// Lifetime resets remaining after this one.
    pub resets_remaining: i32,
}

/// POST /api/reset - owner-initiated hardware binding reset, limited to
/// 5 lifetime resets with a 30-day cooldown between them.
pub async fn reset_hwid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetResponse>> {
    let conn = state.db.get()?;

    let account = queries::get_account_by_license_key(&conn, &request.key)?
        .ok_or_else(|| AppError::NotFound("License key not found".into()))?;

    let order = ledger::resolve_active_order(&conn, &account.id, request.product_id.as_deref())?
        .ok_or_else(|| AppError::NotFound("No active entitlement".into()))?;

    binding::reset_device(&conn, &order, Utc::now().timestamp())?;

    let meta = extract_request_meta(&headers);
    queries::create_audit_record(
        &conn,
        &account.id,
        "RESET_HWID",
        0,
        account.balance,
        Some(&order.id),
        &meta,
    )?;

    Ok(Json(ResetResponse {
        success: true,
        message: "Hardware binding reset".to_string(),
        resets_remaining: binding::MAX_RESETS - (order.reset_count + 1),
    }))
}
