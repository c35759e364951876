use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::db::AppState;
use crate::util::extract_bearer_token;

/// Require the configured admin bearer token. Comparison is constant-time
/// so the token cannot be probed byte by byte.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer_token(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let matches: bool = token
        .as_bytes()
        .ct_eq(state.admin_token.as_bytes())
        .into();
    if !matches {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
