//! Shared test harness: on-disk database (pooled connections must see the
//! same data), generated signing keys, and seeding helpers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use rusqlite::params;
use tempfile::TempDir;
use tower::ServiceExt;

use modgate::crypto::{MasterKey, SigningKeys};
use modgate::db::{self, AppState, queries};
use modgate::handlers;
use modgate::models::{Account, CreateAccount, CreatePackage, CreateProduct, DiscountTable, Package, Product};

pub const TEST_MASTER_SECRET: &str = "test-master-secret-0123456789";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

pub struct TestHarness {
    pub state: AppState,
    // Held so the database and key files outlive the harness.
    _dir: TempDir,
}

pub fn setup() -> TestHarness {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");

    let pool = db::open_pool(db_path.to_str().unwrap()).unwrap();
    db::init_schema(&pool.get().unwrap()).unwrap();

    let signing = SigningKeys::load_or_generate(dir.path()).unwrap();

    let state = AppState {
        db: pool,
        master_key: MasterKey::from_secret(TEST_MASTER_SECRET),
        signing: Arc::new(signing),
        admin_token: TEST_ADMIN_TOKEN.to_string(),
    };

    TestHarness { state, _dir: dir }
}

pub fn seed_account(state: &AppState, name: &str, balance: i64) -> Account {
    let conn = state.db.get().unwrap();
    let account = queries::create_account(
        &conn,
        &CreateAccount {
            name: name.to_string(),
        },
    )
    .unwrap();
    if balance > 0 {
        queries::credit_balance(&conn, &account.id, balance).unwrap();
    }
    queries::get_account_by_id(&conn, &account.id).unwrap().unwrap()
}

pub fn seed_product_and_package(
    state: &AppState,
    base_price: i64,
    discounts: Option<DiscountTable>,
) -> (Product, Package) {
    let conn = state.db.get().unwrap();
    let product = queries::create_product(
        &conn,
        &CreateProduct {
            name: "Automation Suite".to_string(),
            discount_config: discounts,
        },
    )
    .unwrap();
    let package = queries::create_package(
        &conn,
        &CreatePackage {
            product_id: product.id.clone(),
            name: "Pro".to_string(),
            base_price,
            max_seats: 0,
        },
    )
    .unwrap();
    (product, package)
}

/// Force an order's expiry for accumulation and expiration tests.
pub fn set_order_expiry(state: &AppState, order_id: &str, expires_at: i64) {
    let conn = state.db.get().unwrap();
    conn.execute(
        "UPDATE orders SET expires_at = ?1 WHERE id = ?2",
        params![expires_at, order_id],
    )
    .unwrap();
}

/// Backdate an order's last reset, standing in for a real 30-day wait.
pub fn set_order_last_reset(state: &AppState, order_id: &str, last_reset_at: i64) {
    let conn = state.db.get().unwrap();
    conn.execute(
        "UPDATE orders SET last_reset_at = ?1 WHERE id = ?2",
        params![last_reset_at, order_id],
    )
    .unwrap();
}

/// POST a JSON body through the full router and decode the JSON response.
pub async fn post_json(
    state: &AppState,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(state, uri, body, None).await
}

/// Same as [`post_json`] with an `Authorization: Bearer` header.
pub async fn post_json_bearer(
    state: &AppState,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> (StatusCode, serde_json::Value) {
    send(state, uri, body, Some(token)).await
}

async fn send(
    state: &AppState,
    uri: &str,
    body: serde_json::Value,
    bearer: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let app = handlers::app(state.clone());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
