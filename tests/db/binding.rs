use chrono::Utc;
use rusqlite::params;

use modgate::binding::{self, MAX_RESETS, RESET_COOLDOWN_DAYS};
use modgate::db::queries;
use modgate::error::AppError;
use modgate::ledger;
use modgate::models::{Order, RequestMeta};

use crate::common::{self, TestHarness};

const DAY: i64 = 86_400;

fn meta() -> RequestMeta {
    RequestMeta {
        ip_address: Some("127.0.0.1".to_string()),
        user_agent: Some("binding-tests".to_string()),
    }
}

fn seed_order(h: &TestHarness) -> Order {
    let account = common::seed_account(&h.state, "device-owner", 100_000);
    let (_, package) = common::seed_product_and_package(&h.state, 10_000, None);
    let mut conn = h.state.db.get().unwrap();
    ledger::purchase(&mut conn, &account.id, &package.id, 1, &meta())
        .unwrap()
        .order
}

fn reload(h: &TestHarness, order_id: &str) -> Order {
    let conn = h.state.db.get().unwrap();
    queries::get_order_by_id(&conn, order_id).unwrap().unwrap()
}

#[test]
fn first_verify_binds_and_persists() {
    let h = common::setup();
    let order = seed_order(&h);

    let conn = h.state.db.get().unwrap();
    let bound = binding::verify_device(&conn, &order, "HWID-A").unwrap();
    assert_eq!(bound, "HWID-A");
    drop(conn);

    assert_eq!(reload(&h, &order.id).hwid.as_deref(), Some("HWID-A"));
}

#[test]
fn bound_entitlement_rejects_other_hardware_but_keeps_passing_its_own() {
    let h = common::setup();
    let order = seed_order(&h);

    let conn = h.state.db.get().unwrap();
    binding::verify_device(&conn, &order, "HWID-A").unwrap();

    let order = reload(&h, &order.id);
    let err = binding::verify_device(&conn, &order, "HWID-B").unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // The failed attempt changed nothing; the bound device still verifies.
    let order = reload(&h, &order.id);
    assert_eq!(order.hwid.as_deref(), Some("HWID-A"));
    assert_eq!(binding::verify_device(&conn, &order, "HWID-A").unwrap(), "HWID-A");
}

#[test]
fn bind_race_loser_sees_mismatch() {
    let h = common::setup();
    let order = seed_order(&h);

    // Both callers read the order unbound; the first to write wins.
    let conn = h.state.db.get().unwrap();
    binding::verify_device(&conn, &order, "HWID-A").unwrap();
    let err = binding::verify_device(&conn, &order, "HWID-B").unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(reload(&h, &order.id).hwid.as_deref(), Some("HWID-A"));
}

#[test]
fn bind_race_loser_with_same_hwid_passes() {
    let h = common::setup();
    let order = seed_order(&h);

    let conn = h.state.db.get().unwrap();
    binding::verify_device(&conn, &order, "HWID-A").unwrap();
    // Stale read, same hardware: the CAS fails but the re-read matches.
    assert_eq!(binding::verify_device(&conn, &order, "HWID-A").unwrap(), "HWID-A");
}

#[test]
fn reset_unbinds_and_allows_a_new_device() {
    let h = common::setup();
    let order = seed_order(&h);

    let conn = h.state.db.get().unwrap();
    binding::verify_device(&conn, &order, "HWID-A").unwrap();

    let order = reload(&h, &order.id);
    binding::reset_device(&conn, &order, Utc::now().timestamp()).unwrap();

    let order = reload(&h, &order.id);
    assert!(order.hwid.is_none());
    assert_eq!(order.reset_count, 1);
    assert!(order.last_reset_at.is_some());

    assert_eq!(binding::verify_device(&conn, &order, "HWID-B").unwrap(), "HWID-B");
}

#[test]
fn reset_inside_cooldown_is_refused_with_remaining_days() {
    let h = common::setup();
    let order = seed_order(&h);

    let conn = h.state.db.get().unwrap();
    binding::verify_device(&conn, &order, "HWID-A").unwrap();

    let order = reload(&h, &order.id);
    let now = Utc::now().timestamp();
    binding::reset_device(&conn, &order, now).unwrap();

    // Ten days later: twenty days of cooldown remain.
    let order = reload(&h, &order.id);
    let err = binding::reset_device(&conn, &order, now + 10 * DAY).unwrap_err();
    match err {
        AppError::Forbidden(msg) => assert!(msg.contains("20 day(s)"), "{msg}"),
        other => panic!("expected Forbidden, got {other:?}"),
    }

    // Refusal left the counter and binding state alone.
    let order = reload(&h, &order.id);
    assert_eq!(order.reset_count, 1);
    assert!(order.hwid.is_none());
}

#[test]
fn stale_snapshot_reset_cannot_push_the_counter_past_the_limit() {
    let h = common::setup();
    let order = seed_order(&h);
    let conn = h.state.db.get().unwrap();
    binding::verify_device(&conn, &order, "HWID-A").unwrap();
    conn.execute(
        "UPDATE orders SET reset_count = ?1 WHERE id = ?2",
        params![MAX_RESETS - 1, order.id],
    )
    .unwrap();

    // Two callers read the same row; both snapshots show one reset left.
    let snapshot = reload(&h, &order.id);
    let now = Utc::now().timestamp();
    binding::reset_device(&conn, &snapshot, now).unwrap();
    let err = binding::reset_device(&conn, &snapshot, now).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{err:?}");

    // Only the winner counted.
    let current = reload(&h, &order.id);
    assert_eq!(current.reset_count, MAX_RESETS);
}

#[test]
fn sixth_reset_hits_the_lifetime_limit() {
    let h = common::setup();
    let order = seed_order(&h);
    let conn = h.state.db.get().unwrap();

    for i in 0..MAX_RESETS {
        let order = reload(&h, &order.id);
        binding::verify_device(&conn, &order, &format!("HWID-{i}")).unwrap();
        let order = reload(&h, &order.id);
        binding::reset_device(&conn, &order, Utc::now().timestamp()).unwrap();
        // Stand in for the 30-day wait before the next reset.
        common::set_order_last_reset(
            &h.state,
            &order.id,
            Utc::now().timestamp() - (RESET_COOLDOWN_DAYS + 1) * DAY,
        );
    }

    let order = reload(&h, &order.id);
    assert_eq!(order.reset_count, MAX_RESETS);
    let err = binding::reset_device(&conn, &order, Utc::now().timestamp()).unwrap_err();
    match err {
        AppError::Forbidden(msg) => assert!(msg.contains("limit"), "{msg}"),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}
