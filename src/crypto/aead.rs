/// AES-256-GCM as used by FMD: 12-byte IV, 16-byte tag appended to the
/// ciphertext, no associated data.
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::crypto::sensitive::AesKey;
use crate::error::{FmdError, Result};

pub const IV_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
pub const TAG_LEN: usize = 16;

pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt under a fresh random IV. Returns (iv, ciphertext_with_tag).
pub fn encrypt(key: &AesKey, plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| FmdError::Decryption(format!("Invalid AES key: {e}")))?;

    let iv = generate_iv();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| FmdError::Decryption("AES-GCM encryption failed".into()))?;

    Ok((iv, ciphertext))
}

pub fn decrypt(key: &AesKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_LEN {
        return Err(FmdError::Decryption(format!(
            "AES-GCM IV must be {IV_LEN} bytes, got {}",
            iv.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| FmdError::Decryption(format!("Invalid AES key: {e}")))?;

    // aes-gcm's error is opaque; a tag mismatch is the only failure here.
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| FmdError::Decryption("AES-GCM authentication tag mismatch".into()))
}
