mod envelope;
mod rotation;
mod signer;
mod vault;

pub use envelope::MasterKey;
pub use rotation::{RotationReport, rotate_master_secret};
pub use signer::{
    decrypt_secret_with_public_key, encrypt_secret_for_client, sign_payload, verify_payload,
};
pub use vault::{SigningKeys, mint_account_secret};
