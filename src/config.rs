/// Client configuration and credentials.
use std::fmt;
use std::time::Duration;

use zeroize::Zeroizing;

/// Default server-side session lifetime requested at login (seconds).
pub const DEFAULT_SESSION_DURATION: u64 = 3600;

/// Argon2id cost parameters shared by login hashing and key unwrapping.
///
/// The FMD server pins m=131072 KiB, t=1, p=4. Lower profiles are only
/// useful against test servers that were set up with the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub output_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 131_072,
            iterations: 1,
            parallelism: 4,
            output_len: 32,
        }
    }
}

/// How the `CmdSig` field is base64-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureEncoding {
    /// Trailing `=` stripped. This is what the reference web client sends.
    #[default]
    Unpadded,
    Padded,
}

/// Configuration for connecting to an FMD server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. "https://fmd.example.com". Stored without trailing slash.
    pub server_url: String,
    /// Requested token lifetime in seconds.
    pub session_duration: u64,
    pub kdf: KdfParams,
    pub signature_encoding: SignatureEncoding,
    /// Overall request timeout. `None` keeps the HTTP client default.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            session_duration: DEFAULT_SESSION_DURATION,
            kdf: KdfParams::default(),
            signature_encoding: SignatureEncoding::default(),
            request_timeout: None,
        }
    }

    pub fn with_session_duration(mut self, seconds: u64) -> Self {
        self.session_duration = seconds;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_signature_encoding(mut self, encoding: SignatureEncoding) -> Self {
        self.signature_encoding = encoding;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Account id and password. Kept only so a 401 can trigger a fresh login.
#[derive(Clone)]
pub struct Credentials {
    pub account_id: String,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(account_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ClientConfig::new("https://fmd.example.com//");
        assert_eq!(config.server_url, "https://fmd.example.com");
        assert_eq!(config.session_duration, DEFAULT_SESSION_DURATION);
        assert_eq!(config.signature_encoding, SignatureEncoding::Unpadded);
    }

    #[test]
    fn test_default_kdf_matches_server() {
        let kdf = KdfParams::default();
        assert_eq!(
            (kdf.memory_kib, kdf.iterations, kdf.parallelism, kdf.output_len),
            (131_072, 1, 4, 32)
        );
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "correct-horse");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("correct-horse"));
        assert_eq!(creds.password(), "correct-horse");
    }
}
