//! Signing keypair persistence and per-account secret minting.
//!
//! The server's Ed25519 keypair is generated once and persisted to the key
//! directory; every restart reuses the same identity. Clients pair against
//! the public half out of band, so losing or corrupting the private half
//! invalidates every deployed client - load failures are fatal at startup.

use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{AppError, Result};

const PRIVATE_KEY_FILE: &str = "signing.key";
const PUBLIC_KEY_FILE: &str = "signing.pub";

/// Process-wide signing identity. Initialized exactly once at startup and
/// never mutated afterward; the offline rotation procedure replaces the key
/// files between restarts.
#[derive(Debug)]
pub struct SigningKeys {
    signing: SigningKey,
    verifying: VerifyingKey,
}

impl SigningKeys {
    /// Load the persisted keypair, or generate and persist a fresh one on
    /// first run. Idempotent: subsequent calls are pure reads.
    ///
    /// Returns an error if existing key material is unreadable, malformed,
    /// or the two halves do not match; the caller must treat that as fatal.
    pub fn load_or_generate(dir: impl AsRef<Path>) -> Result<Self> {
        let private_path = dir.as_ref().join(PRIVATE_KEY_FILE);
        let public_path = dir.as_ref().join(PUBLIC_KEY_FILE);

        if private_path.exists() || public_path.exists() {
            return Self::load(&private_path, &public_path);
        }

        let signing = SigningKey::generate(&mut OsRng);
        let verifying = signing.verifying_key();

        fs::write(&private_path, hex::encode(signing.to_bytes()))
            .map_err(|e| AppError::Internal(format!("failed to persist private key: {e}")))?;
        fs::write(&public_path, hex::encode(verifying.to_bytes()))
            .map_err(|e| AppError::Internal(format!("failed to persist public key: {e}")))?;

        tracing::info!(path = %private_path.display(), "generated new signing keypair");

        Ok(Self { signing, verifying })
    }

    fn load(private_path: &PathBuf, public_path: &PathBuf) -> Result<Self> {
        let signing_bytes = read_key_file(private_path)?;
        let verifying_bytes = read_key_file(public_path)?;

        let signing = SigningKey::from_bytes(&signing_bytes);
        let verifying = VerifyingKey::from_bytes(&verifying_bytes)
            .map_err(|e| AppError::Internal(format!("malformed public key: {e}")))?;

        if signing.verifying_key() != verifying {
            return Err(AppError::Internal(
                "persisted public key does not match private key".into(),
            ));
        }

        Ok(Self { signing, verifying })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying
    }
}

fn read_key_file(path: &PathBuf) -> Result<[u8; 32]> {
    let contents = fs::read_to_string(path)
        .map_err(|e| AppError::Internal(format!("unreadable key file {}: {e}", path.display())))?;
    let bytes = hex::decode(contents.trim())
        .map_err(|e| AppError::Internal(format!("malformed key file {}: {e}", path.display())))?;
    bytes.try_into().map_err(|_| {
        AppError::Internal(format!("key file {} has wrong length", path.display()))
    })
}

/// Mint a fresh 256-bit symmetric secret for an account that has none yet.
/// Hex-encoded so it survives text storage and transport unharmed.
pub fn mint_account_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
