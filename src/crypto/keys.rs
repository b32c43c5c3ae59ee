/// The account's RSA private key and its password-wrapped storage format.
///
/// Wrapped format (base64 on the wire):
/// [salt(16B) | iv(12B) | AES-256-GCM(pem_or_der) + tag]
use std::fmt;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::config::KdfParams;
use crate::crypto::sensitive::KeyMaterial;
use crate::crypto::{aead, encoding, kdf};
use crate::error::{FmdError, Result};

/// Header length in front of the wrapped key ciphertext.
pub const WRAPPED_HEADER_LEN: usize = kdf::KEY_WRAP_SALT_LEN + aead::IV_LEN;

/// Header plus an empty ciphertext's GCM tag.
pub const MIN_WRAPPED_LEN: usize = WRAPPED_HEADER_LEN + aead::TAG_LEN;

/// RSA private key recovered at login. Lives in memory only.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    /// Parse key bytes, trying PEM first and DER second.
    ///
    /// PKCS#8 is what the FMD web client produces; PKCS#1 is accepted too.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if let Ok(text) = std::str::from_utf8(bytes) {
            if text.contains("-----BEGIN") {
                return Self::from_pem(text);
            }
        }
        Self::from_der(bytes)
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map(Self::from)
            .map_err(|e| FmdError::InvalidKey(format!("Unrecognised PEM private key: {e}")))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        RsaPrivateKey::from_pkcs8_der(der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(der))
            .map(Self::from)
            .map_err(|e| FmdError::InvalidKey(format!("Unrecognised DER private key: {e}")))
    }

    /// Modulus size in bytes. This is also the width of the RSA slot in blobs.
    pub fn modulus_len(&self) -> usize {
        self.inner.size()
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(inner: RsaPrivateKey) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &(self.modulus_len() * 8))
            .finish_non_exhaustive()
    }
}

/// Decrypt the server-stored key blob back to PEM/DER bytes.
pub fn unwrap_private_key(
    wrapped_b64: &str,
    password: &str,
    params: &KdfParams,
) -> Result<KeyMaterial> {
    let wrapped = encoding::decode_lenient(wrapped_b64)
        .map_err(|e| FmdError::InvalidKey(format!("Wrapped key is not base64: {e}")))?;

    if wrapped.len() < MIN_WRAPPED_LEN {
        return Err(FmdError::InvalidKey(format!(
            "Wrapped key too short: {} bytes",
            wrapped.len()
        )));
    }

    let (salt, rest) = wrapped.split_at(kdf::KEY_WRAP_SALT_LEN);
    let (iv, ciphertext) = rest.split_at(aead::IV_LEN);

    let wrap_key = kdf::key_wrap_key(password, salt, params)?;
    let key_bytes = aead::decrypt(&wrap_key, iv, ciphertext)?;

    Ok(KeyMaterial::new(key_bytes))
}

/// Unwrap and parse in one step.
pub fn recover_private_key(
    wrapped_b64: &str,
    password: &str,
    params: &KdfParams,
) -> Result<PrivateKey> {
    let key_bytes = unwrap_private_key(wrapped_b64, password, params)?;
    PrivateKey::from_bytes(key_bytes.expose())
}

/// Wrap key bytes under a password, producing the base64 blob the server stores.
pub fn wrap_private_key(key_bytes: &[u8], password: &str, params: &KdfParams) -> Result<String> {
    let salt = kdf::generate_salt();
    let wrap_key = kdf::key_wrap_key(password, &salt, params)?;
    let (iv, ciphertext) = aead::encrypt(&wrap_key, key_bytes)?;

    let mut out = Vec::with_capacity(WRAPPED_HEADER_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);

    Ok(encoding::encode_padded(&out))
}
