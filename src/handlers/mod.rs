pub mod admin;
pub mod public;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::AppState;

pub fn app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/accounts", post(admin::accounts::create_account))
        .route("/admin/deposits", post(admin::accounts::credit_deposit))
        .route("/admin/orders", post(admin::orders::grant_order))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::admin_auth,
        ));

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/verify", post(public::verify::verify_license))
        .route("/api/reset", post(public::reset::reset_hwid))
        .route("/api/buy", post(public::buy::buy_package))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
