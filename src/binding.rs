//! Device binding state machine.
//!
//! Each entitlement is either unbound (hwid NULL) or bound to exactly one
//! hardware id. The first Verify binds; a matching Verify passes; a
//! mismatched one is rejected without revealing the stored hwid. Only an
//! explicit reset returns the entitlement to unbound, subject to a
//! lifetime limit and a cooldown.
//!
//! The transition rules are pure functions over the stored state so they
//! can be tested without storage; the storage-backed entry points apply
//! them with compare-and-swap updates so two concurrent Verify calls
//! against an unbound entitlement cannot both bind different hardware ids.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::Order;

pub const MAX_RESETS: i32 = 5;
pub const RESET_COOLDOWN_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

/// Outcome of presenting a hardware id against the stored binding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOutcome {
    /// Entitlement was unbound; bind to the presented hwid.
    Bind,
    /// Presented hwid matches the bound one; no transition.
    Match,
    /// Presented hwid differs from the bound one; reject, no transition.
    Mismatch,
}

/// Pure transition function for a presented hwid.
pub fn check(bound: Option<&str>, presented: &str) -> BindingOutcome {
    match bound {
        None => BindingOutcome::Bind,
        Some(current) if current == presented => BindingOutcome::Match,
        Some(_) => BindingOutcome::Mismatch,
    }
}

/// Whether a reset is currently permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDecision {
    Allowed,
    LimitReached,
    CooldownActive { remaining_days: i64 },
}

/// Pure reset policy: the lifetime limit is checked before the cooldown,
/// so a maxed-out entitlement reports "limit reached" regardless of how
/// recently the last reset happened.
pub fn evaluate_reset(reset_count: i32, last_reset_at: Option<i64>, now: i64) -> ResetDecision {
    if reset_count >= MAX_RESETS {
        return ResetDecision::LimitReached;
    }

    if let Some(last) = last_reset_at {
        let cooldown_ends = last + RESET_COOLDOWN_DAYS * SECONDS_PER_DAY;
        if now < cooldown_ends {
            // Round up so "29.1 days left" reports 30, not 29.
            let remaining_days = (cooldown_ends - now + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
            return ResetDecision::CooldownActive { remaining_days };
        }
    }

    ResetDecision::Allowed
}

/// Check or establish the device binding for an entitlement. Returns the
/// hwid the entitlement is bound to after the call.
///
/// The first-use bind is a compare-and-swap on the hwid still being NULL;
/// a second concurrent writer loses the race, re-reads, and observes the
/// winner's bind as a mismatch. The bind is a persisted side effect of a
/// successful device check - it is final once committed, even if the
/// caller disconnects before seeing the response.
pub fn verify_device(conn: &Connection, order: &Order, presented: &str) -> Result<String> {
    match check(order.hwid.as_deref(), presented) {
        BindingOutcome::Match => Ok(presented.to_string()),
        BindingOutcome::Mismatch => Err(AppError::Forbidden("Hardware mismatch".into())),
        BindingOutcome::Bind => {
            if queries::bind_hwid_if_unbound(conn, &order.id, presented)? {
                tracing::info!(order_id = %order.id, "bound entitlement to hardware id");
                return Ok(presented.to_string());
            }
            // Lost the bind race; the row now holds the winner's hwid.
            let current = queries::get_order_by_id(conn, &order.id)?
                .ok_or_else(|| AppError::Internal("order vanished during bind".into()))?;
            match check(current.hwid.as_deref(), presented) {
                BindingOutcome::Match => Ok(presented.to_string()),
                _ => Err(AppError::Forbidden("Hardware mismatch".into())),
            }
        }
    }
}

/// Explicit owner/administrator reset: clears the binding if neither the
/// lifetime limit nor the cooldown forbids it.
///
/// The clear is a compare-and-swap on the counter being unchanged since the
/// caller's read, so two concurrent resets cannot both count and push the
/// lifetime total past the limit. The loser re-reads and reports the policy
/// decision for the fresh state.
pub fn reset_device(conn: &Connection, order: &Order, now: i64) -> Result<()> {
    match evaluate_reset(order.reset_count, order.last_reset_at, now) {
        ResetDecision::Allowed => {}
        refused => return Err(refusal(refused)),
    }

    if queries::clear_hwid_for_reset(conn, &order.id, order.reset_count)? {
        tracing::info!(order_id = %order.id, "hardware binding reset");
        return Ok(());
    }

    // Lost a race against a concurrent reset; the counter moved underneath
    // us and the cooldown it stamped now applies.
    let current = queries::get_order_by_id(conn, &order.id)?
        .ok_or_else(|| AppError::Internal("order vanished during reset".into()))?;
    Err(refusal(evaluate_reset(
        current.reset_count,
        current.last_reset_at,
        now,
    )))
}

fn refusal(decision: ResetDecision) -> AppError {
    match decision {
        ResetDecision::LimitReached => AppError::Forbidden(format!(
            "Reset limit reached ({MAX_RESETS} lifetime resets)"
        )),
        ResetDecision::CooldownActive { remaining_days } => AppError::Forbidden(format!(
            "Reset cooldown active: {remaining_days} day(s) remaining"
        )),
        ResetDecision::Allowed => AppError::Internal("reset state changed during reset".into()),
    }
}
