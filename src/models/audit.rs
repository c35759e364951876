use serde::{Deserialize, Serialize};

/// Append-only audit fact. Written once, never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub account_id: String,
    pub action: String,
    /// Monetary delta applied by the action (0 for non-monetary actions).
    pub balance_change: i64,
    /// Balance after the action.
    pub new_balance: i64,
    /// Free-form reference, e.g. an order or transaction id.
    pub reference: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: i64,
}

/// Request metadata carried into audit writes.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
