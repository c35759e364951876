use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::CreateAccount;
use crate::util::extract_request_meta;

#[derive(Debug, Serialize)]
pub struct AccountCreated {
    pub id: String,
    pub license_key: String,
    pub name: String,
    pub balance: i64,
}

/// POST /admin/accounts - create an account with a fresh license key.
pub async fn create_account(
    State(state): State<AppState>,
    Json(input): Json<CreateAccount>,
) -> Result<Json<AccountCreated>> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }

    let conn = state.db.get()?;
    let account = queries::create_account(&conn, &input)?;

    Ok(Json(AccountCreated {
        id: account.id,
        license_key: account.license_key,
        name: account.name,
        balance: account.balance,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account_id: String,
    pub amount: i64,
    /// External transaction reference, recorded in the audit log.
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub success: bool,
    pub new_balance: i64,
}

/// POST /admin/deposits - credit an account balance with an audit record.
pub async fn credit_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DepositRequest>,
) -> Result<Json<DepositResponse>> {
    if request.amount <= 0 {
        return Err(AppError::BadRequest("amount must be positive".into()));
    }

    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    queries::get_account_by_id(&tx, &request.account_id)?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    let new_balance = queries::credit_balance(&tx, &request.account_id, request.amount)?;

    let meta = extract_request_meta(&headers);
    queries::create_audit_record(
        &tx,
        &request.account_id,
        "DEPOSIT",
        request.amount,
        new_balance,
        request.reference.as_deref(),
        &meta,
    )?;

    tx.commit()?;

    Ok(Json(DepositResponse {
        success: true,
        new_balance,
    }))
}
