/// RSA-PSS command signatures (SHA-256, MGF1-SHA256, 32-byte salt).
///
/// Only the UTF-8 command text is signed. The timestamp and token travel
/// beside it unsigned; replay protection is left to the server.
use rand::rngs::OsRng;
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding as _, Verifier};
use rsa::RsaPublicKey;
use sha2::Sha256;

use crate::config::SignatureEncoding;
use crate::crypto::encoding;
use crate::crypto::keys::PrivateKey;
use crate::error::{FmdError, Result};

pub const PSS_SALT_LEN: usize = 32;

/// Raw PSS signature over the command bytes (modulus-sized, 384 for RSA-3072).
pub fn sign_raw(command: &str, private_key: &PrivateKey) -> Vec<u8> {
    let signing_key =
        BlindedSigningKey::<Sha256>::new_with_salt_len(private_key.rsa().clone(), PSS_SALT_LEN);
    signing_key
        .sign_with_rng(&mut OsRng, command.as_bytes())
        .to_vec()
}

/// Sign and base64-encode for the `CmdSig` field.
pub fn sign(command: &str, private_key: &PrivateKey, encoding: SignatureEncoding) -> String {
    let raw = sign_raw(command, private_key);
    match encoding {
        SignatureEncoding::Unpadded => encoding::encode_unpadded(&raw),
        SignatureEncoding::Padded => encoding::encode_padded(&raw),
    }
}

/// Verify a `CmdSig` value (padded or not) against the command text.
pub fn verify(command: &str, signature_b64: &str, public_key: &RsaPublicKey) -> Result<()> {
    let raw = encoding::decode_lenient(signature_b64)
        .map_err(|e| FmdError::Signing(format!("Signature is not base64: {e}")))?;
    let signature = Signature::try_from(raw.as_slice())
        .map_err(|e| FmdError::Signing(format!("Malformed signature: {e}")))?;

    VerifyingKey::<Sha256>::new_with_salt_len(public_key.clone(), PSS_SALT_LEN)
        .verify(command.as_bytes(), &signature)
        .map_err(|_| FmdError::Signing("Signature verification failed".into()))
}
