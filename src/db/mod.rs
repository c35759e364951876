pub mod from_row;
pub mod queries;

use std::sync::Arc;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::crypto::{MasterKey, SigningKeys};
use crate::error::Result;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Shared application state. Cheap to clone; the signing identity is a
/// read-only handle initialized once at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub master_key: MasterKey,
    pub signing: Arc<SigningKeys>,
    pub admin_token: String,
}

/// Open a connection pool against the given database path. Every pooled
/// connection gets WAL mode, foreign keys, and a busy timeout so short
/// write transactions queue instead of erroring out.
pub fn open_pool(path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });
    let pool = r2d2::Pool::builder().build(manager)?;
    Ok(pool)
}

/// Create the schema if it does not exist yet.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            license_key TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0,
            secret_key_enc TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            discount_config TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS packages (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL REFERENCES products(id),
            name TEXT NOT NULL,
            base_price INTEGER NOT NULL,
            max_seats INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            product_id TEXT NOT NULL,
            package_id TEXT NOT NULL,
            package_name TEXT NOT NULL,
            product_name TEXT NOT NULL,
            amount INTEGER NOT NULL,
            duration_days INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'completed',
            expires_at INTEGER,
            hwid TEXT,
            reset_count INTEGER NOT NULL DEFAULT 0,
            last_reset_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_account_product
            ON orders(account_id, product_id, status);

        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            action TEXT NOT NULL,
            balance_change INTEGER NOT NULL DEFAULT 0,
            new_balance INTEGER NOT NULL DEFAULT 0,
            reference TEXT,
            ip_address TEXT,
            user_agent TEXT,
            timestamp INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_account
            ON audit_logs(account_id, timestamp);",
    )?;
    Ok(())
}
