//! At-rest cipher for the App signing key
//!
//! AES-256-GCM under a key derived as `SHA-256(passphrase)`. The output is
//! `base64(iv || ciphertext || tag)` with a fresh 12-byte IV per call.
//!
//! The passphrase ships with the client build, so this protects persisted
//! session storage from casual inspection only. Anyone holding the build can
//! derive the key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// IV length in bytes (96 bits, the GCM standard nonce size)
pub const IV_LEN: usize = 12;

/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

fn cipher_for(passphrase: &str) -> Result<Aes256Gcm> {
    let key = Sha256::digest(passphrase.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(|e| Error::Encryption(format!("key setup: {e}")))
}

/// Encrypt `plaintext` under `passphrase`.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String> {
    let cipher = cipher_for(passphrase)?;

    let mut iv = [0u8; IV_LEN];
    rand::rng().fill(&mut iv);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| Error::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(IV_LEN + sealed.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&sealed);
    Ok(STANDARD.encode(blob))
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Any failure (bad base64, truncation, wrong passphrase, tampering, or
/// non-UTF-8 plaintext) yields `Error::Decryption` and no plaintext.
pub fn decrypt(blob: &str, passphrase: &str) -> Result<String> {
    let raw = STANDARD
        .decode(blob.trim())
        .map_err(|e| Error::Decryption(format!("invalid base64: {e}")))?;

    if raw.len() < IV_LEN + TAG_LEN {
        return Err(Error::Decryption(format!(
            "blob too short: {} bytes",
            raw.len()
        )));
    }

    let (iv, sealed) = raw.split_at(IV_LEN);
    let cipher = cipher_for(passphrase).map_err(|e| Error::Decryption(e.to_string()))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), sealed)
        .map_err(|_| Error::Decryption("authentication tag mismatch".into()))?;

    String::from_utf8(plaintext).map_err(|_| Error::Decryption("plaintext is not UTF-8".into()))
}
