/// Hybrid blob format used for locations and pictures.
///
/// Format (base64 on the wire, padding optional):
/// [RSA-OAEP(session_key) (modulus bytes, 384 for RSA-3072) | iv(12B) | AES-256-GCM ciphertext + tag]
///
/// Each blob carries its own session key, used exactly once.
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;

use crate::crypto::keys::PrivateKey;
use crate::crypto::sensitive::AesKey;
use crate::crypto::{aead, encoding};
use crate::error::{FmdError, Result};

/// RSA slot width of the deployed protocol (RSA-3072).
pub const RSA_KEY_SIZE_BYTES: usize = 384;

/// Smallest decodable blob for the deployed key size.
pub const MIN_BLOB_LEN: usize = RSA_KEY_SIZE_BYTES + aead::IV_LEN;

/// A blob split into its three parts.
pub struct BlobFrame<'a> {
    pub wrapped_key: &'a [u8],
    pub iv: &'a [u8],
    pub ciphertext: &'a [u8],
}

impl<'a> BlobFrame<'a> {
    /// Split raw blob bytes for a key whose modulus is `slot_len` bytes.
    pub fn parse(data: &'a [u8], slot_len: usize) -> Result<Self> {
        let minimum = slot_len + aead::IV_LEN;
        if data.len() < minimum {
            return Err(FmdError::BlobTooSmall {
                actual: data.len(),
                minimum,
            });
        }

        let (wrapped_key, rest) = data.split_at(slot_len);
        let (iv, ciphertext) = rest.split_at(aead::IV_LEN);

        Ok(Self {
            wrapped_key,
            iv,
            ciphertext,
        })
    }
}

/// Decrypt a base64 blob with the account's private key.
///
/// Returns the plaintext verbatim; interpreting it (location JSON, picture
/// payload) is up to the caller.
pub fn decrypt(blob_b64: &str, private_key: &PrivateKey) -> Result<Vec<u8>> {
    let data = encoding::decode_lenient(blob_b64)?;
    decrypt_bytes(&data, private_key)
}

pub fn decrypt_bytes(data: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>> {
    let frame = BlobFrame::parse(data, private_key.modulus_len())?;

    let session_key_bytes = private_key
        .rsa()
        .decrypt(Oaep::new::<Sha256>(), frame.wrapped_key)
        .map_err(|e| FmdError::Decryption(format!("RSA-OAEP session key unwrap failed: {e}")))?;

    let session_key = AesKey::from_slice(&session_key_bytes).ok_or_else(|| {
        FmdError::Decryption(format!(
            "Session key is {} bytes, expected {}",
            session_key_bytes.len(),
            aead::KEY_LEN
        ))
    })?;

    aead::decrypt(&session_key, frame.iv, frame.ciphertext)
}

/// Produce a blob the way the device does: fresh session key, OAEP-wrapped
/// for `public_key`, payload under AES-256-GCM. Returned base64 is padded.
pub fn seal(plaintext: &[u8], public_key: &RsaPublicKey) -> Result<String> {
    let session_key = AesKey::random();
    let (iv, ciphertext) = aead::encrypt(&session_key, plaintext)?;

    let wrapped_key = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), session_key.expose())
        .map_err(|e| FmdError::Decryption(format!("RSA-OAEP session key wrap failed: {e}")))?;

    let mut out = Vec::with_capacity(public_key.size() + aead::IV_LEN + ciphertext.len());
    out.extend_from_slice(&wrapped_key);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);

    Ok(encoding::encode_padded(&out))
}
