use std::collections::BTreeMap;

use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::json;

use rusqlite::Connection;

use crate::binding;
use crate::crypto::{self, MasterKey};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::ledger;
use crate::models::OrderStatus;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// License key identifying the account.
    pub key: String,
    /// Hardware id of the calling device.
    pub hwid: String,
    /// Optional product to verify against; defaults to the
    /// latest-expiring active entitlement.
    #[serde(default)]
    pub product_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    /// Signed fields. The signature covers the canonical serialization of
    /// exactly this object.
    pub data: serde_json::Value,
    /// Base64 signature verifiable with the server's public key.
    pub signature: String,
}

/// POST /api/verify - check the caller's entitlement, bind the device on
/// first use, and deliver the account's symmetric key under a signed
/// payload.
pub async fn verify_license(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    if request.hwid.trim().is_empty() {
        return Err(AppError::BadRequest("hwid is required".into()));
    }

    let conn = state.db.get()?;

    let account = queries::get_account_by_license_key(&conn, &request.key)?
        .ok_or_else(|| AppError::NotFound("License key not found".into()))?;

    let order =
        match ledger::resolve_active_order(&conn, &account.id, request.product_id.as_deref())? {
            Some(order) => order,
            None => {
                // Resolution already marked stale rows expired; tell a
                // lapsed entitlement apart from one that never existed.
                let latest =
                    queries::get_latest_order(&conn, &account.id, request.product_id.as_deref())?;
                let message = match latest {
                    Some(last) if last.status == OrderStatus::Expired => "Entitlement expired",
                    _ => "No active entitlement",
                };
                return Err(AppError::Forbidden(message.into()));
            }
        };

    // Device check happens outside any ledger transaction: a first-use
    // bind is final once committed, even if the caller disconnects.
    let bound_hwid = binding::verify_device(&conn, &order, request.hwid.trim())?;

    // Recover the account secret, minting or re-issuing as needed. A blob
    // that no longer opens is replaced rather than failing the request -
    // the secret is server-derived and replaceable.
    let secret = match &account.secret_key_enc {
        Some(envelope) => match state.master_key.open(envelope) {
            Some(plain) => plain,
            None => {
                tracing::warn!(
                    account_id = %account.id,
                    "stored secret failed to decrypt, re-issuing"
                );
                reissue_secret(&conn, &state.master_key, &account.id)?
            }
        },
        None => reissue_secret(&conn, &state.master_key, &account.id)?,
    };

    let client_key = crypto::encrypt_secret_for_client(&state.signing, &secret);

    let expires_at = order
        .expires_at
        .ok_or_else(|| AppError::Internal("active order has no expiry".into()))?;

    let mut data = BTreeMap::new();
    data.insert("status".to_string(), json!("active"));
    data.insert("product_id".to_string(), json!(order.product_id));
    data.insert("expires_at".to_string(), json!(expires_at));
    data.insert("hwid".to_string(), json!(bound_hwid));
    data.insert("client_key".to_string(), json!(client_key));

    let signature = crypto::sign_payload(&state.signing, &data)?;

    Ok(Json(VerifyResponse {
        success: true,
        data: serde_json::to_value(&data)?,
        signature,
    }))
}

fn reissue_secret(conn: &Connection, master_key: &MasterKey, account_id: &str) -> Result<String> {
    let secret = crypto::mint_account_secret();
    let envelope = master_key.seal(&secret);
    queries::set_account_secret(conn, account_id, &envelope)?;
    Ok(secret)
}
