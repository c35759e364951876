//! Entitlement ledger: purchase and grant arithmetic, and the atomic
//! transaction that ties balance, entitlement, and audit mutations
//! together.
//!
//! "Active entitlement" for (account, product) means the completed order
//! with the latest expiry still in the future. A purchase against an
//! account that already holds one is an upgrade: the remaining time
//! carries forward, the old order is cancelled, and the device binding
//! (hwid plus reset history) transfers verbatim - all inside the same
//! transaction as the balance debit and the audit write.

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries::{self, InsertOrder};
use crate::error::{AppError, Result};
use crate::models::{DiscountTable, Order, ProductStatus, RequestMeta};

pub const ALLOWED_MONTHS: [i64; 4] = [1, 3, 6, 12];

const SECONDS_PER_DAY: i64 = 86_400;
const DAYS_PER_MONTH: i64 = 30;

#[derive(Debug)]
pub struct PurchaseOutcome {
    pub order: Order,
    pub new_balance: i64,
}

/// Total price for `months` of a package: base price times months, minus
/// the product's tier discount rounded to the nearest unit.
pub fn price_for(base_price: i64, months: i64, discounts: &DiscountTable) -> i64 {
    let subtotal = base_price * months;
    let percent = i64::from(discounts.percent_for(months));
    let discount = (subtotal * percent + 50) / 100;
    subtotal - discount
}

/// Purchase `months` of `package_id` from the account's balance.
///
/// Validation failures (unknown package, bad duration, insufficient
/// balance) reject before any mutation. The mutations - old-order
/// cancellation, balance debit, new-order insert, audit write - commit
/// together or not at all.
pub fn purchase(
    conn: &mut Connection,
    account_id: &str,
    package_id: &str,
    months: i64,
    meta: &RequestMeta,
) -> Result<PurchaseOutcome> {
    execute_order(conn, account_id, package_id, months, meta, true)
}

/// Administrator grant: same arithmetic as a purchase but no balance
/// check or debit. Still atomic across old-cancel/new-create/audit-write.
pub fn grant(
    conn: &mut Connection,
    account_id: &str,
    package_id: &str,
    months: i64,
    meta: &RequestMeta,
) -> Result<PurchaseOutcome> {
    execute_order(conn, account_id, package_id, months, meta, false)
}

fn execute_order(
    conn: &mut Connection,
    account_id: &str,
    package_id: &str,
    months: i64,
    meta: &RequestMeta,
    charge_balance: bool,
) -> Result<PurchaseOutcome> {
    if !ALLOWED_MONTHS.contains(&months) {
        return Err(AppError::BadRequest(
            "Duration must be 1, 3, 6, or 12 months".into(),
        ));
    }

    // BEGIN IMMEDIATE takes the write lock up front so two concurrent
    // purchases serialize instead of both reading the same stale balance.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let account = queries::get_account_by_id(&tx, account_id)?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
    let package = queries::get_package_by_id(&tx, package_id)?
        .ok_or_else(|| AppError::NotFound("Package not found".into()))?;
    let product = queries::get_product_by_id(&tx, &package.product_id)?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    if product.status != ProductStatus::Active {
        return Err(AppError::Forbidden("Product is not available".into()));
    }

    let discounts = DiscountTable::parse(&product.discount_config)?;
    let total = price_for(package.base_price, months, &discounts);

    if charge_balance && account.balance < total {
        return Err(AppError::Forbidden("Insufficient balance".into()));
    }

    let now = Utc::now().timestamp();
    let duration_days = months * DAYS_PER_MONTH;

    queries::expire_stale_orders(&tx, account_id)?;
    let active = queries::get_active_order(&tx, account_id, &package.product_id)?;

    // Remaining time on the superseded order carries forward, and the
    // device lock transfers verbatim.
    let (expires_at, inherited_hwid, reset_count, last_reset_at) = match &active {
        Some(old) => {
            let old_expiry = old.expires_at.unwrap_or(now);
            let remaining = (old_expiry - now).max(0);
            if let Some(old_pkg) = queries::get_package_by_id(&tx, &old.package_id)? {
                if package.base_price < old_pkg.base_price {
                    tracing::warn!(
                        account_id,
                        old_order = %old.id,
                        "purchase replaces a higher-priced package (downgrade)"
                    );
                }
            }
            (
                now + duration_days * SECONDS_PER_DAY + remaining,
                old.hwid.clone(),
                old.reset_count,
                old.last_reset_at,
            )
        }
        None => (now + duration_days * SECONDS_PER_DAY, None, 0, None),
    };

    if let Some(old) = &active {
        if !queries::cancel_order(&tx, &old.id)? {
            return Err(AppError::Internal(
                "active order changed during purchase".into(),
            ));
        }
    }

    let new_balance = if charge_balance {
        if !queries::debit_balance_if_sufficient(&tx, account_id, total)? {
            return Err(AppError::Forbidden("Insufficient balance".into()));
        }
        account.balance - total
    } else {
        account.balance
    };

    let seat_info = if package.max_seats == 0 {
        "Unlimited seats".to_string()
    } else {
        format!("{} seats", package.max_seats)
    };
    let package_name = format!("{} - {} ({})", product.name, package.name, seat_info);

    let order = queries::insert_completed_order(
        &tx,
        &InsertOrder {
            account_id,
            product_id: &package.product_id,
            package_id: &package.id,
            package_name: &package_name,
            product_name: &product.name,
            amount: total,
            duration_days,
            expires_at,
            hwid: inherited_hwid.as_deref(),
            reset_count,
            last_reset_at,
        },
    )?;

    let (action, balance_change) = if charge_balance {
        if active.is_some() {
            ("UPGRADE_PACKAGE", -total)
        } else {
            ("BUY_PACKAGE", -total)
        }
    } else {
        ("GRANT_PACKAGE", 0)
    };
    queries::create_audit_record(
        &tx,
        account_id,
        action,
        balance_change,
        new_balance,
        Some(&order.id),
        meta,
    )?;

    tx.commit()?;

    tracing::info!(
        account_id,
        order_id = %order.id,
        amount = total,
        action,
        "order completed"
    );

    Ok(PurchaseOutcome { order, new_balance })
}

/// Resolve the entitlement a Verify call runs against: the active order
/// for the named product, or the latest-expiring active order when no
/// product is named. Marks stale completed orders expired first, so
/// "expired" is observed lazily but deterministically.
pub fn resolve_active_order(
    conn: &Connection,
    account_id: &str,
    product_id: Option<&str>,
) -> Result<Option<Order>> {
    queries::expire_stale_orders(conn, account_id)?;
    match product_id {
        Some(pid) => queries::get_active_order(conn, account_id, pid),
        None => queries::get_latest_active_order(conn, account_id),
    }
}
