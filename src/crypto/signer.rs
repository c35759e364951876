//! Outbound payload signing and client key delivery.
//!
//! Verification responses are signed over a canonical serialization so the
//! client can check, with the paired public key, that the payload left this
//! server unmodified. Canonicalization rule: field names sorted
//! lexicographically, compact JSON encoding. Identical payload implies
//! identical bytes implies verifiable signature, regardless of the order
//! fields were inserted in.

use std::collections::BTreeMap;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use super::SigningKeys;
use crate::error::{AppError, Result};

const DELIVERY_NONCE_LEN: usize = 12;
const DELIVERY_INFO: &[u8] = b"modgate-client-key-delivery-v1";

/// Serialize a payload deterministically. `BTreeMap` iteration order is the
/// lexicographic key order, so two semantically identical payloads always
/// produce the same bytes.
fn canonicalize(payload: &BTreeMap<String, serde_json::Value>) -> Result<String> {
    Ok(serde_json::to_string(payload)?)
}

/// Sign a payload of scalar fields. Returns the base64 signature over the
/// canonical serialization.
pub fn sign_payload(
    keys: &SigningKeys,
    payload: &BTreeMap<String, serde_json::Value>,
) -> Result<String> {
    let canonical = canonicalize(payload)?;
    let signature = keys.signing_key().sign(canonical.as_bytes());
    Ok(BASE64.encode(signature.to_bytes()))
}

/// Check a signature produced by `sign_payload`. Signature verification is
/// a client-side concern in production; this mirrors what the client does
/// and backs the handler tests.
pub fn verify_payload(
    public_key: &VerifyingKey,
    payload: &BTreeMap<String, serde_json::Value>,
    signature_b64: &str,
) -> Result<bool> {
    let canonical = canonicalize(payload)?;
    let sig_bytes = BASE64
        .decode(signature_b64)
        .map_err(|e| AppError::Internal(format!("malformed signature encoding: {e}")))?;
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| AppError::Internal("signature has wrong length".into()))?;
    let signature = Signature::from_bytes(&sig_bytes);
    Ok(public_key.verify(canonical.as_bytes(), &signature).is_ok())
}

/// Key for the client delivery channel, derived from the server's public
/// key. Anyone holding the paired public key can derive the same key.
fn delivery_cipher(public_key: &VerifyingKey) -> Aes256Gcm {
    let hk = Hkdf::<Sha256>::new(None, public_key.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(DELIVERY_INFO, &mut key)
        .expect("32 bytes is a valid HKDF output length");
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
}

/// Encrypt an account secret for delivery to the client, retrievable only
/// by a party holding the server's public key. Output is
/// base64(nonce || ciphertext).
///
/// This is not a general-purpose confidentiality primitive: the paired
/// public key is distributed to every legitimate client, so the scheme
/// deters casual extraction of the secret in transit and at rest on the
/// wire, nothing stronger. It reuses the signing keypair so clients only
/// pair one key.
pub fn encrypt_secret_for_client(keys: &SigningKeys, secret: &str) -> String {
    let mut nonce_bytes = [0u8; DELIVERY_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = delivery_cipher(keys.public_key())
        .encrypt(Nonce::from_slice(&nonce_bytes), secret.as_bytes())
        .expect("AES-GCM encryption is infallible for in-memory buffers");

    let mut blob = Vec::with_capacity(DELIVERY_NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    BASE64.encode(blob)
}

/// Recover a delivered secret using the server's public key. This is what
/// the client runs; the server only needs it for tests and diagnostics.
pub fn decrypt_secret_with_public_key(public_key: &VerifyingKey, blob: &str) -> Option<String> {
    let bytes = BASE64.decode(blob).ok()?;
    if bytes.len() <= DELIVERY_NONCE_LEN {
        return None;
    }
    let (nonce, ciphertext) = bytes.split_at(DELIVERY_NONCE_LEN);
    let plain = delivery_cipher(public_key)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .ok()?;
    String::from_utf8(plain).ok()
}
