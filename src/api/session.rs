/// Login: salt → Argon2id login hash → access token → wrapped private key.
///
/// The password never leaves the client. The server checks a hash derived
/// under the login context, and the private key is unwrapped locally with a
/// key derived under a separate context and salt.
use std::fmt;

use reqwest::{Method, StatusCode};
use tracing::info;
use zeroize::Zeroizing;

use super::transport::{read_data, Transport};
use super::{endpoints, Payload};
use crate::config::{Credentials, KdfParams};
use crate::crypto::keys::{self, PrivateKey};
use crate::crypto::{encoding, kdf};
use crate::error::{FmdError, Result};

/// Bearer token plus the recovered private key.
pub struct Session {
    pub access_token: String,
    pub private_key: PrivateKey,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("private_key", &self.private_key)
            .finish()
    }
}

pub struct Authenticator<'a> {
    transport: &'a dyn Transport,
    kdf: KdfParams,
}

impl<'a> Authenticator<'a> {
    pub fn new(transport: &'a dyn Transport, kdf: KdfParams) -> Self {
        Self { transport, kdf }
    }

    /// Run the full login and key recovery workflow.
    pub async fn authenticate(&self, credentials: &Credentials, session_duration: u64) -> Result<Session> {
        let account_id = credentials.account_id.as_str();

        info!(account_id, "[1] Requesting salt");
        let salt = self
            .call(endpoints::SALT, Payload::new(account_id, ""))
            .await?;
        encoding::decode_lenient(&salt)
            .map_err(|e| FmdError::protocol(endpoints::SALT, format!("salt is not base64: {e}")))?;

        info!("[2] Hashing password with salt");
        let password = Zeroizing::new(credentials.password().to_string());
        let login_hash = {
            let password = password.clone();
            let params = self.kdf;
            run_blocking(move || kdf::login_hash(&password, &salt, &params)).await?
        };

        info!("[3] Requesting access token");
        let access_token = self
            .call(
                endpoints::REQUEST_ACCESS,
                Payload::new(account_id, login_hash).with("SessionDurationSeconds", session_duration),
            )
            .await?;

        info!("[3a] Retrieving encrypted private key");
        let wrapped_key = self
            .call(endpoints::KEY, Payload::new(access_token.as_str(), "unused"))
            .await?;
        check_wrapped_key(&wrapped_key)?;

        info!("[3b] Decrypting private key");
        let params = self.kdf;
        let private_key =
            run_blocking(move || keys::recover_private_key(&wrapped_key, &password, &params)).await?;

        Ok(Session {
            access_token,
            private_key,
        })
    }

    /// One login step. 401/403 here means the credentials were rejected, and
    /// an empty `Data` is as bad as a missing one.
    async fn call(&self, endpoint: &str, payload: Payload) -> Result<String> {
        let response = self.transport.send(Method::POST, endpoint, &payload).await?;
        let status = response.status;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FmdError::Authentication(format!(
                "{endpoint} rejected credentials (HTTP {status})"
            )));
        }
        if !status.is_success() {
            return Err(FmdError::operation(endpoint, format!("HTTP {status}")));
        }

        let data = read_data(endpoint, response, true).await?;
        if data.trim().is_empty() {
            return Err(FmdError::protocol(endpoint, "empty Data"));
        }
        Ok(data.trim().to_string())
    }
}

/// The wrapped key must decode and hold at least salt, IV and tag.
fn check_wrapped_key(wrapped_b64: &str) -> Result<()> {
    let wrapped = encoding::decode_lenient(wrapped_b64)
        .map_err(|e| FmdError::protocol(endpoints::KEY, format!("wrapped key is not base64: {e}")))?;
    if wrapped.len() < keys::MIN_WRAPPED_LEN {
        return Err(FmdError::protocol(
            endpoints::KEY,
            format!(
                "wrapped key is {} bytes, expected at least {}",
                wrapped.len(),
                keys::MIN_WRAPPED_LEN
            ),
        ));
    }
    Ok(())
}

/// Argon2id at 128 MiB takes long enough to stall an executor thread.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FmdError::KeyDerivation(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::api::transport::RawResponse;
    use crate::crypto::kdf::test_params;
    use crate::crypto::keys::{fixtures, wrap_private_key};

    const SALT: &str = "c2FsdHNhbHRzYWx0c2FsdA==";

    /// Answers the three login endpoints; records every request.
    struct LoginServer {
        salt: String,
        wrapped_key: String,
        token_status: StatusCode,
        requests: Mutex<Vec<(String, Payload)>>,
    }

    impl LoginServer {
        fn new(token_status: StatusCode) -> Self {
            Self {
                salt: SALT.to_string(),
                wrapped_key: wrap_private_key(fixtures::PRIMARY_PEM.as_bytes(), "correct-horse", &test_params())
                    .unwrap(),
                token_status,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    fn json_data(data: &str) -> RawResponse {
        let body = serde_json::json!({ "Data": data }).to_string();
        RawResponse::from_bytes(StatusCode::OK, Some("application/json"), body)
    }

    #[async_trait]
    impl Transport for LoginServer {
        async fn send(&self, _method: Method, endpoint: &str, payload: &Payload) -> Result<RawResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((endpoint.to_string(), payload.clone()));
            Ok(match endpoint {
                endpoints::SALT => json_data(&self.salt),
                endpoints::REQUEST_ACCESS if self.token_status.is_success() => json_data("token-1"),
                endpoints::REQUEST_ACCESS => RawResponse::from_bytes(self.token_status, None, ""),
                endpoints::KEY => json_data(&self.wrapped_key),
                _ => RawResponse::from_bytes(StatusCode::NOT_FOUND, None, ""),
            })
        }
    }

    #[tokio::test]
    async fn test_authenticate_recovers_key_and_token() {
        let server = LoginServer::new(StatusCode::OK);
        let creds = Credentials::new("alice", "correct-horse");

        let session = Authenticator::new(&server, test_params())
            .authenticate(&creds, 900)
            .await
            .unwrap();

        assert_eq!(session.access_token, "token-1");
        assert_eq!(session.private_key.public_key(), fixtures::primary().public_key());

        let requests = server.requests.lock().unwrap();
        let paths: Vec<&str> = requests.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(paths, [endpoints::SALT, endpoints::REQUEST_ACCESS, endpoints::KEY]);

        let (_, salt_req) = &requests[0];
        assert_eq!((salt_req.idt.as_str(), salt_req.data.as_str()), ("alice", ""));

        let (_, access_req) = &requests[1];
        assert_eq!(access_req.idt, "alice");
        assert!(access_req.data.starts_with("$argon2id$v=19$m=1024,t=1,p=1$c2FsdHNhbHRzYWx0c2FsdA==$"));
        assert_eq!(access_req.extra["SessionDurationSeconds"], 900);

        let (_, key_req) = &requests[2];
        assert_eq!((key_req.idt.as_str(), key_req.data.as_str()), ("token-1", "unused"));
    }

    #[tokio::test]
    async fn test_rejected_login_is_authentication_error() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let server = LoginServer::new(status);
            let creds = Credentials::new("alice", "wrong");
            let err = Authenticator::new(&server, test_params())
                .authenticate(&creds, 3600)
                .await
                .unwrap_err();
            assert!(matches!(err, FmdError::Authentication(_)), "{status}: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_server_error_is_operation_error() {
        let server = LoginServer::new(StatusCode::INTERNAL_SERVER_ERROR);
        let err = Authenticator::new(&server, test_params())
            .authenticate(&Credentials::new("alice", "correct-horse"), 3600)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_wrong_unwrap_password_fails_decryption() {
        // Server accepts the login but the key was wrapped under another password.
        let server = LoginServer::new(StatusCode::OK);
        let err = Authenticator::new(&server, test_params())
            .authenticate(&Credentials::new("alice", "not-the-wrap-password"), 3600)
            .await
            .unwrap_err();
        assert!(matches!(err, FmdError::Decryption(_)));
    }

    #[tokio::test]
    async fn test_malformed_salt_is_protocol_error() {
        let mut server = LoginServer::new(StatusCode::OK);
        server.salt = "***".to_string();
        let err = Authenticator::new(&server, test_params())
            .authenticate(&Credentials::new("alice", "correct-horse"), 3600)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, FmdError::Protocol { endpoint, .. } if endpoint == endpoints::SALT),
            "{err:?}"
        );

        // No login hash was computed or sent.
        let requests = server.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_wrapped_key_is_protocol_error() {
        let truncated = encoding::encode_padded(&[0u8; keys::MIN_WRAPPED_LEN - 1]);
        for wrapped_key in ["not base64!".to_string(), truncated] {
            let mut server = LoginServer::new(StatusCode::OK);
            server.wrapped_key = wrapped_key;
            let err = Authenticator::new(&server, test_params())
                .authenticate(&Credentials::new("alice", "correct-horse"), 3600)
                .await
                .unwrap_err();
            assert!(
                matches!(&err, FmdError::Protocol { endpoint, .. } if endpoint == endpoints::KEY),
                "{err:?}"
            );
        }
    }
}
