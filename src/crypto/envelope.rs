//! Envelope encryption of per-account secrets.
//!
//! Each account's symmetric secret is stored sealed under a key derived
//! from the deployment's master secret, which never touches the database.
//! Blob format is `hex(nonce):hex(ciphertext)` - self-describing enough to
//! split without a length prefix, and the nonce is fresh per seal so the
//! same plaintext never produces the same blob twice.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

const NONCE_LEN: usize = 12;
const HKDF_INFO: &[u8] = b"modgate-envelope-v1";

/// Envelope key derived from the configured master secret.
#[derive(Clone)]
pub struct MasterKey {
    key: [u8; 32],
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey").finish_non_exhaustive()
    }
}

impl MasterKey {
    /// Derive the 256-bit envelope key from the master secret via
    /// HKDF-SHA256.
    pub fn from_secret(secret: &str) -> Self {
        let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key)
            .expect("32 bytes is a valid HKDF output length");
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    /// Seal a plaintext secret into a storable envelope. Never produces the
    /// same output twice for the same input.
    pub fn seal(&self, plain: &str) -> String {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plain.as_bytes())
            .expect("AES-GCM encryption is infallible for in-memory buffers");

        format!("{}:{}", hex::encode(nonce_bytes), hex::encode(ciphertext))
    }

    /// Open an envelope sealed by `seal`. Returns `None` on any malformed
    /// input or decryption failure - the caller uses that as the signal to
    /// re-issue the account secret rather than abort.
    pub fn open(&self, envelope: &str) -> Option<String> {
        let (nonce_hex, ct_hex) = envelope.split_once(':')?;

        let nonce_bytes = hex::decode(nonce_hex).ok()?;
        if nonce_bytes.len() != NONCE_LEN {
            return None;
        }
        let ciphertext = hex::decode(ct_hex).ok()?;

        let plain = self
            .cipher()
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .ok()?;

        String::from_utf8(plain).ok()
    }
}
