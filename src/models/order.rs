use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Expired,
}

/// One purchased (or granted) right to use one product. At most one order
/// per (account, product) may be completed with an expiry in the future;
/// upgrades cancel the old row in the same transaction that creates the
/// new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub account_id: String,
    pub product_id: String,
    pub package_id: String,
    /// Name snapshots survive later catalog edits.
    pub package_name: String,
    pub product_name: String,
    /// Amount actually charged, after discount.
    pub amount: i64,
    /// Purchased duration in days (not total remaining validity).
    pub duration_days: i64,
    pub status: OrderStatus,
    pub expires_at: Option<i64>,
    /// Bound hardware id. Set once on first Verify, cleared only by an
    /// explicit reset, carried forward verbatim on upgrade.
    pub hwid: Option<String>,
    pub reset_count: i32,
    pub last_reset_at: Option<i64>,
    pub created_at: i64,
}
