use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    ACCOUNT_COLS, AUDIT_COLS, ORDER_COLS, PACKAGE_COLS, PRODUCT_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a license key in the familiar format: XXXX-XXXX-XXXX-XXXX.
/// Ambiguous characters (0/O, 1/I) are excluded.
pub fn generate_license_key() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: Vec<char> = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789".chars().collect();

    let mut part = || -> String {
        (0..4)
            .map(|_| chars[rng.gen_range(0..chars.len())])
            .collect()
    };

    format!("{}-{}-{}-{}", part(), part(), part(), part())
}

// ============ Accounts ============

pub fn create_account(conn: &Connection, input: &CreateAccount) -> Result<Account> {
    let id = gen_id();
    let license_key = generate_license_key();
    let now = now();

    conn.execute(
        "INSERT INTO accounts (id, license_key, name, balance, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5)",
        params![&id, &license_key, &input.name, now, now],
    )?;

    Ok(Account {
        id,
        license_key,
        name: input.name.clone(),
        balance: 0,
        secret_key_enc: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_account_by_id(conn: &Connection, id: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        [id],
    )
}

pub fn get_account_by_license_key(conn: &Connection, key: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE license_key = ?1", ACCOUNT_COLS),
        [key],
    )
}

/// Replace an account's encrypted secret blob wholesale.
pub fn set_account_secret(conn: &Connection, id: &str, secret_key_enc: &str) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET secret_key_enc = ?1, updated_at = ?2 WHERE id = ?3",
        params![secret_key_enc, now(), id],
    )?;
    Ok(())
}

/// Conditionally debit an account. Returns false when the balance is
/// insufficient at commit time - the guard against two concurrent
/// purchases both spending the same funds.
pub fn debit_balance_if_sufficient(conn: &Connection, id: &str, amount: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE accounts SET balance = balance - ?1, updated_at = ?2
         WHERE id = ?3 AND balance >= ?1",
        params![amount, now(), id],
    )?;
    Ok(updated == 1)
}

/// Credit a deposit. Returns the new balance.
pub fn credit_balance(conn: &Connection, id: &str, amount: i64) -> Result<i64> {
    conn.execute(
        "UPDATE accounts SET balance = balance + ?1, updated_at = ?2 WHERE id = ?3",
        params![amount, now(), id],
    )?;
    let balance = conn.query_row(
        "SELECT balance FROM accounts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(balance)
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    let id = gen_id();
    let now = now();
    let table = input.discount_config.unwrap_or_default();
    table.validate()?;
    let discount_config = serde_json::to_string(&table)?;

    conn.execute(
        "INSERT INTO products (id, name, status, discount_config, created_at)
         VALUES (?1, ?2, 'active', ?3, ?4)",
        params![&id, &input.name, &discount_config, now],
    )?;

    Ok(Product {
        id,
        name: input.name.clone(),
        status: ProductStatus::Active,
        discount_config,
        created_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        [id],
    )
}

// ============ Packages ============

pub fn create_package(conn: &Connection, input: &CreatePackage) -> Result<Package> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO packages (id, product_id, name, base_price, max_seats, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            &id,
            &input.product_id,
            &input.name,
            input.base_price,
            input.max_seats,
            now
        ],
    )?;

    Ok(Package {
        id,
        product_id: input.product_id.clone(),
        name: input.name.clone(),
        base_price: input.base_price,
        max_seats: input.max_seats,
        created_at: now,
    })
}

pub fn get_package_by_id(conn: &Connection, id: &str) -> Result<Option<Package>> {
    query_one(
        conn,
        &format!("SELECT {} FROM packages WHERE id = ?1", PACKAGE_COLS),
        [id],
    )
}

// ============ Orders ============

#[derive(Debug)]
pub struct InsertOrder<'a> {
    pub account_id: &'a str,
    pub product_id: &'a str,
    pub package_id: &'a str,
    pub package_name: &'a str,
    pub product_name: &'a str,
    pub amount: i64,
    pub duration_days: i64,
    pub expires_at: i64,
    pub hwid: Option<&'a str>,
    pub reset_count: i32,
    pub last_reset_at: Option<i64>,
}

pub fn insert_completed_order(conn: &Connection, input: &InsertOrder<'_>) -> Result<Order> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO orders (id, account_id, product_id, package_id, package_name, product_name,
                             amount, duration_days, status, expires_at, hwid, reset_count,
                             last_reset_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'completed', ?9, ?10, ?11, ?12, ?13)",
        params![
            &id,
            input.account_id,
            input.product_id,
            input.package_id,
            input.package_name,
            input.product_name,
            input.amount,
            input.duration_days,
            input.expires_at,
            input.hwid,
            input.reset_count,
            input.last_reset_at,
            now
        ],
    )?;

    Ok(Order {
        id,
        account_id: input.account_id.to_string(),
        product_id: input.product_id.to_string(),
        package_id: input.package_id.to_string(),
        package_name: input.package_name.to_string(),
        product_name: input.product_name.to_string(),
        amount: input.amount,
        duration_days: input.duration_days,
        status: OrderStatus::Completed,
        expires_at: Some(input.expires_at),
        hwid: input.hwid.map(String::from),
        reset_count: input.reset_count,
        last_reset_at: input.last_reset_at,
        created_at: now,
    })
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        [id],
    )
}

/// Mark completed orders whose expiry has passed as expired. Expiry is
/// observed lazily: this runs before any active-entitlement resolution.
pub fn expire_stale_orders(conn: &Connection, account_id: &str) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE orders SET status = 'expired'
         WHERE account_id = ?1 AND status = 'completed'
           AND expires_at IS NOT NULL AND expires_at <= ?2",
        params![account_id, now()],
    )?;
    Ok(updated)
}

/// The active entitlement for (account, product): the completed order with
/// the latest expiry still in the future. Cancelled/expired rows never
/// qualify.
pub fn get_active_order(
    conn: &Connection,
    account_id: &str,
    product_id: &str,
) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders
             WHERE account_id = ?1 AND product_id = ?2 AND status = 'completed'
               AND expires_at IS NOT NULL AND expires_at > ?3
             ORDER BY expires_at DESC LIMIT 1",
            ORDER_COLS
        ),
        params![account_id, product_id, now()],
    )
}

/// Latest-expiring active entitlement across all products, for Verify
/// requests that do not name a product.
pub fn get_latest_active_order(conn: &Connection, account_id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders
             WHERE account_id = ?1 AND status = 'completed'
               AND expires_at IS NOT NULL AND expires_at > ?2
             ORDER BY expires_at DESC LIMIT 1",
            ORDER_COLS
        ),
        params![account_id, now()],
    )
}

/// Cancel a superseded order. Conditional on it still being completed so a
/// concurrent upgrade cannot cancel twice.
pub fn cancel_order(conn: &Connection, id: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE orders SET status = 'cancelled' WHERE id = ?1 AND status = 'completed'",
        params![id],
    )?;
    Ok(updated == 1)
}

/// First-use device bind, compare-and-swap on the hwid still being NULL.
/// Returns false when another writer bound first; the caller must re-read
/// and re-compare.
pub fn bind_hwid_if_unbound(conn: &Connection, order_id: &str, hwid: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE orders SET hwid = ?1 WHERE id = ?2 AND hwid IS NULL",
        params![hwid, order_id],
    )?;
    Ok(updated == 1)
}

/// Clear the bound hwid, bump the lifetime reset counter, stamp the reset
/// time. Conditional on the counter being unchanged since the caller read
/// it; returns false when a concurrent reset got there first.
pub fn clear_hwid_for_reset(
    conn: &Connection,
    order_id: &str,
    expected_resets: i32,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE orders SET hwid = NULL, reset_count = reset_count + 1, last_reset_at = ?1
         WHERE id = ?2 AND reset_count = ?3",
        params![now(), order_id, expected_resets],
    )?;
    Ok(updated == 1)
}

/// Most recent order for the account (optionally narrowed to one product),
/// regardless of status. Distinguishes "entitlement expired" from "never
/// had one" when no active order resolves.
pub fn get_latest_order(
    conn: &Connection,
    account_id: &str,
    product_id: Option<&str>,
) -> Result<Option<Order>> {
    match product_id {
        Some(pid) => query_one(
            conn,
            &format!(
                "SELECT {} FROM orders WHERE account_id = ?1 AND product_id = ?2
                 ORDER BY created_at DESC LIMIT 1",
                ORDER_COLS
            ),
            params![account_id, pid],
        ),
        None => query_one(
            conn,
            &format!(
                "SELECT {} FROM orders WHERE account_id = ?1
                 ORDER BY created_at DESC LIMIT 1",
                ORDER_COLS
            ),
            params![account_id],
        ),
    }
}

pub fn list_orders_for_account(conn: &Connection, account_id: &str) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE account_id = ?1 ORDER BY created_at DESC",
            ORDER_COLS
        ),
        [account_id],
    )
}

// ============ Audit Logs ============

pub fn create_audit_record(
    conn: &Connection,
    account_id: &str,
    action: &str,
    balance_change: i64,
    new_balance: i64,
    reference: Option<&str>,
    meta: &RequestMeta,
) -> Result<AuditRecord> {
    let id = gen_id();
    let timestamp = now();

    conn.execute(
        "INSERT INTO audit_logs (id, account_id, action, balance_change, new_balance,
                                 reference, ip_address, user_agent, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            account_id,
            action,
            balance_change,
            new_balance,
            reference,
            &meta.ip_address,
            &meta.user_agent,
            timestamp
        ],
    )?;

    Ok(AuditRecord {
        id,
        account_id: account_id.to_string(),
        action: action.to_string(),
        balance_change,
        new_balance,
        reference: reference.map(String::from),
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
        timestamp,
    })
}

pub fn list_audit_records_for_account(
    conn: &Connection,
    account_id: &str,
) -> Result<Vec<AuditRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM audit_logs WHERE account_id = ?1 ORDER BY timestamp DESC",
            AUDIT_COLS
        ),
        [account_id],
    )
}
