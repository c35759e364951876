use std::fs;

use tempfile::TempDir;

use modgate::crypto::SigningKeys;

#[test]
fn generates_and_persists_keypair_on_first_run() {
    let dir = TempDir::new().unwrap();
    let keys = SigningKeys::load_or_generate(dir.path()).unwrap();

    assert!(dir.path().join("signing.key").exists());
    assert!(dir.path().join("signing.pub").exists());

    // A second load returns the same identity.
    let reloaded = SigningKeys::load_or_generate(dir.path()).unwrap();
    assert_eq!(keys.public_key(), reloaded.public_key());
}

#[test]
fn corrupt_private_key_is_fatal() {
    let dir = TempDir::new().unwrap();
    SigningKeys::load_or_generate(dir.path()).unwrap();

    fs::write(dir.path().join("signing.key"), "not hex at all").unwrap();
    assert!(SigningKeys::load_or_generate(dir.path()).is_err());
}

#[test]
fn missing_public_half_is_fatal() {
    let dir = TempDir::new().unwrap();
    SigningKeys::load_or_generate(dir.path()).unwrap();

    fs::remove_file(dir.path().join("signing.pub")).unwrap();
    assert!(SigningKeys::load_or_generate(dir.path()).is_err());
}

#[test]
fn mismatched_halves_are_fatal() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    SigningKeys::load_or_generate(dir_a.path()).unwrap();
    SigningKeys::load_or_generate(dir_b.path()).unwrap();

    // Swap in the other deployment's public key.
    let other_pub = fs::read(dir_b.path().join("signing.pub")).unwrap();
    fs::write(dir_a.path().join("signing.pub"), other_pub).unwrap();
    assert!(SigningKeys::load_or_generate(dir_a.path()).is_err());
}
