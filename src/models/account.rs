use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Unique license identifier presented by clients on Verify.
    pub license_key: String,
    pub name: String,
    /// Monetary balance in the smallest currency unit. Mutated only through
    /// ledger-recorded transactions.
    pub balance: i64,
    /// Envelope-encrypted symmetric secret. Created lazily on the first
    /// entitlement check, replaced wholesale on re-issue or rotation.
    #[serde(skip_serializing)]
    pub secret_key_enc: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccount {
    pub name: String,
}
