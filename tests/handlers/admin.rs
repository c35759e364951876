use axum::http::StatusCode;
use serde_json::json;

use modgate::db::queries;

use crate::common::{self, TEST_ADMIN_TOKEN};

#[tokio::test]
async fn admin_routes_reject_missing_and_wrong_tokens() {
    let h = common::setup();

    let (status, _) =
        common::post_json(&h.state, "/admin/accounts", json!({"name": "intruder"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = common::post_json_bearer(
        &h.state,
        "/admin/accounts",
        json!({"name": "intruder"}),
        "wrong-token",
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing was created either way.
    let conn = h.state.db.get().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn create_account_issues_a_license_key() {
    let h = common::setup();

    let (status, body) = common::post_json_bearer(
        &h.state,
        "/admin/accounts",
        json!({"name": "new customer"}),
        TEST_ADMIN_TOKEN,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("new customer"));
    assert_eq!(body["balance"], json!(0));

    let key = body["license_key"].as_str().unwrap();
    let parts: Vec<&str> = key.split('-').collect();
    assert_eq!(parts.len(), 4);
    assert!(parts.iter().all(|p| p.len() == 4));

    let conn = h.state.db.get().unwrap();
    assert!(queries::get_account_by_license_key(&conn, key).unwrap().is_some());
}

#[tokio::test]
async fn blank_account_name_is_rejected() {
    let h = common::setup();

    let (status, _) = common::post_json_bearer(
        &h.state,
        "/admin/accounts",
        json!({"name": "  "}),
        TEST_ADMIN_TOKEN,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deposit_credits_the_balance_and_audits() {
    let h = common::setup();
    let account = common::seed_account(&h.state, "saver", 1_000);

    let (status, body) = common::post_json_bearer(
        &h.state,
        "/admin/deposits",
        json!({"account_id": account.id, "amount": 25_000, "reference": "wire-42"}),
        TEST_ADMIN_TOKEN,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], json!(26_000));

    let conn = h.state.db.get().unwrap();
    let audit = queries::list_audit_records_for_account(&conn, &account.id).unwrap();
    assert_eq!(audit[0].action, "DEPOSIT");
    assert_eq!(audit[0].balance_change, 25_000);
    assert_eq!(audit[0].new_balance, 26_000);
    assert_eq!(audit[0].reference.as_deref(), Some("wire-42"));
}

#[tokio::test]
async fn non_positive_deposits_are_rejected() {
    let h = common::setup();
    let account = common::seed_account(&h.state, "saver", 1_000);

    for amount in [0, -500] {
        let (status, _) = common::post_json_bearer(
            &h.state,
            "/admin/deposits",
            json!({"account_id": account.id, "amount": amount}),
            TEST_ADMIN_TOKEN,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let conn = h.state.db.get().unwrap();
    let refreshed = queries::get_account_by_id(&conn, &account.id).unwrap().unwrap();
    assert_eq!(refreshed.balance, 1_000);
}

#[tokio::test]
async fn deposit_to_unknown_account_is_not_found() {
    let h = common::setup();

    let (status, _) = common::post_json_bearer(
        &h.state,
        "/admin/deposits",
        json!({"account_id": "no-such-account", "amount": 1_000}),
        TEST_ADMIN_TOKEN,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn granted_entitlement_verifies_without_any_purchase() {
    let h = common::setup();
    let account = common::seed_account(&h.state, "comped", 0);
    let (_, package) = common::seed_product_and_package(&h.state, 10_000, None);

    let (status, body) = common::post_json_bearer(
        &h.state,
        "/admin/orders",
        json!({"account_id": account.id, "package_id": package.id, "months": 3}),
        TEST_ADMIN_TOKEN,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(body["expires_at"].is_i64());

    // No money moved.
    let conn = h.state.db.get().unwrap();
    let refreshed = queries::get_account_by_id(&conn, &account.id).unwrap().unwrap();
    assert_eq!(refreshed.balance, 0);
    drop(conn);

    // The grant is a real entitlement as far as Verify is concerned.
    let (status, body) = common::post_json(
        &h.state,
        "/api/verify",
        json!({"key": account.license_key, "hwid": "HWID-A"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("active"));
}
