//! Row mapping helpers shared by the query layer.
//!
//! Each model implements `FromRow` against a fixed column list constant so
//! SELECT statements and mappers cannot drift apart.

use rusqlite::{Connection, Params, Row};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, T::from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub const ACCOUNT_COLS: &str =
    "id, license_key, name, balance, secret_key_enc, created_at, updated_at";

impl FromRow for Account {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            license_key: row.get(1)?,
            name: row.get(2)?,
            balance: row.get(3)?,
            secret_key_enc: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

pub const PRODUCT_COLS: &str = "id, name, status, discount_config, created_at";

impl FromRow for Product {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            status: parse_enum(row, 2)?,
            discount_config: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

pub const PACKAGE_COLS: &str = "id, product_id, name, base_price, max_seats, created_at";

impl FromRow for Package {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            product_id: row.get(1)?,
            name: row.get(2)?,
            base_price: row.get(3)?,
            max_seats: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

pub const ORDER_COLS: &str = "id, account_id, product_id, package_id, package_name, product_name, \
     amount, duration_days, status, expires_at, hwid, reset_count, last_reset_at, created_at";

impl FromRow for Order {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            product_id: row.get(2)?,
            package_id: row.get(3)?,
            package_name: row.get(4)?,
            product_name: row.get(5)?,
            amount: row.get(6)?,
            duration_days: row.get(7)?,
            status: parse_enum(row, 8)?,
            expires_at: row.get(9)?,
            hwid: row.get(10)?,
            reset_count: row.get(11)?,
            last_reset_at: row.get(12)?,
            created_at: row.get(13)?,
        })
    }
}

pub const AUDIT_COLS: &str = "id, account_id, action, balance_change, new_balance, reference, \
     ip_address, user_agent, timestamp";

impl FromRow for AuditRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            action: row.get(2)?,
            balance_change: row.get(3)?,
            new_balance: row.get(4)?,
            reference: row.get(5)?,
            ip_address: row.get(6)?,
            user_agent: row.get(7)?,
            timestamp: row.get(8)?,
        })
    }
}

fn parse_enum<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized enum value: {raw}").into(),
        )
    })
}
