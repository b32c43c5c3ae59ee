/// Argon2id derivations for FMD login and private-key unwrapping.
///
/// Both derivations hash `context || password`; the two context strings keep
/// the login credential and the key-wrap secret independent.
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::config::KdfParams;
use crate::crypto::encoding;
use crate::crypto::sensitive::AesKey;
use crate::error::{FmdError, Result};

pub const CONTEXT_LOGIN: &str = "context:loginAuthentication";
pub const CONTEXT_KEY_WRAP: &str = "context:asymmetricKeyWrap";

/// Salt length used inside the wrapped private key blob.
pub const KEY_WRAP_SALT_LEN: usize = 16;

pub fn generate_salt() -> [u8; KEY_WRAP_SALT_LEN] {
    let mut salt = [0u8; KEY_WRAP_SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

fn argon2id(params: &KdfParams, secret: &[u8], salt: &[u8]) -> Result<Vec<u8>> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(params.output_len),
    )
    .map_err(|e| FmdError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = vec![0u8; params.output_len];
    argon2
        .hash_password_into(secret, salt, &mut output)
        .map_err(|e| FmdError::KeyDerivation(e.to_string()))?;

    Ok(output)
}

fn with_context(context: &str, password: &str) -> zeroize::Zeroizing<Vec<u8>> {
    let mut secret = Vec::with_capacity(context.len() + password.len());
    secret.extend_from_slice(context.as_bytes());
    secret.extend_from_slice(password.as_bytes());
    zeroize::Zeroizing::new(secret)
}

/// Build the PHC string the server verifies at `/api/v1/requestAccess`.
///
/// `salt_b64` is embedded exactly as the server sent it; only the hash part
/// is produced here (standard base64, padding stripped).
pub fn login_hash(password: &str, salt_b64: &str, params: &KdfParams) -> Result<String> {
    let salt = encoding::decode_lenient(salt_b64)
        .map_err(|e| FmdError::KeyDerivation(format!("Invalid server salt: {e}")))?;
    let secret = with_context(CONTEXT_LOGIN, password);
    let hash = argon2id(params, &secret, &salt)?;

    Ok(format!(
        "$argon2id$v=19$m={},t={},p={}${}${}",
        params.memory_kib,
        params.iterations,
        params.parallelism,
        salt_b64,
        encoding::encode_unpadded(&hash)
    ))
}

/// Derive the AES-256 key that wraps the account's RSA private key.
pub fn key_wrap_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<AesKey> {
    if params.output_len != 32 {
        return Err(FmdError::KeyDerivation(format!(
            "Key wrap needs a 32-byte output, configured {}",
            params.output_len
        )));
    }
    let secret = with_context(CONTEXT_KEY_WRAP, password);
    let mut output = argon2id(params, &secret, salt)?;
    let key = AesKey::from_slice(&output)
        .ok_or_else(|| FmdError::KeyDerivation("Argon2id output is not 32 bytes".into()));
    zeroize::Zeroize::zeroize(&mut output);
    key
}

/// Reduced cost profile for tests (fast but insecure).
#[cfg(test)]
pub(crate) fn test_params() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
        output_len: 32,
    }
}
