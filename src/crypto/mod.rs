/// Cryptographic building blocks of the FMD protocol.
///
/// - `kdf`: Argon2id login hash and key-wrap key
/// - `keys`: RSA private key parsing and password wrapping
/// - `blob`: hybrid RSA-OAEP + AES-GCM blob decryption
/// - `sign`: RSA-PSS command signatures
pub mod aead;
pub mod blob;
pub mod encoding;
pub mod kdf;
pub mod keys;
pub mod sensitive;
pub mod sign;
