//! Master secret rotation.
//!
//! Offline maintenance batch: every stored account envelope is opened under
//! the old master secret and re-sealed under the new one. Each account is
//! processed under its own short transaction so Verify traffic is never
//! blocked for the duration of the batch. Accounts whose envelope fails to
//! open under the old secret are reported for manual re-issuance, never
//! silently dropped.

use rusqlite::params;

use super::MasterKey;
use crate::db::DbPool;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct RotationReport {
    pub rotated: usize,
    /// Account ids whose envelope could not be opened under the old secret.
    pub failed: Vec<String>,
    /// Accounts whose blob changed underneath us mid-rotation (re-sealed by
    /// a concurrent Verify); safe to skip, they already hold a fresh secret.
    pub skipped: usize,
}

/// Re-seal every account secret under `new`. One short transaction per
/// account; the write is conditional on the blob being unchanged since it
/// was read, so a concurrent re-issue is never clobbered.
pub fn rotate_master_secret(
    pool: &DbPool,
    old: &MasterKey,
    new: &MasterKey,
) -> Result<RotationReport> {
    let conn = pool.get()?;

    let targets: Vec<(String, String)> = {
        let mut stmt = conn.prepare(
            "SELECT id, secret_key_enc FROM accounts WHERE secret_key_enc IS NOT NULL",
        )?;
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    let mut report = RotationReport::default();

    for (account_id, envelope) in targets {
        let Some(plain) = old.open(&envelope) else {
            tracing::error!(account_id, "envelope failed to open under old master secret");
            report.failed.push(account_id);
            continue;
        };

        let resealed = new.seal(&plain);
        let updated = conn.execute(
            "UPDATE accounts SET secret_key_enc = ?1 WHERE id = ?2 AND secret_key_enc = ?3",
            params![resealed, account_id, envelope],
        )?;

        if updated == 1 {
            report.rotated += 1;
        } else {
            tracing::warn!(account_id, "envelope changed during rotation, skipped");
            report.skipped += 1;
        }
    }

    Ok(report)
}
