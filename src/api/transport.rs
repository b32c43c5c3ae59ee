/// HTTP seam between the client and an FMD server.
///
/// `Transport` only moves bytes and reports status; status handling, the 401
/// retry and body interpretation live in the client so they behave the same
/// over any transport.
use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::Payload;
use crate::config::ClientConfig;
use crate::error::{FmdError, Result};

/// A boxed async reader over a response body.
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send>>;

/// Status, declared content type and a streaming body.
pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: BoxAsyncRead,
}

impl RawResponse {
    /// Build a response around an in-memory body.
    pub fn from_bytes(status: StatusCode, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: Box::pin(std::io::Cursor::new(body.into())),
        }
    }

    pub async fn bytes(mut self, endpoint: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body
            .read_to_end(&mut buf)
            .await
            .map_err(|e| FmdError::operation(endpoint, e))?;
        Ok(buf)
    }

    pub async fn text(self, endpoint: &str) -> Result<String> {
        let bytes = self.bytes(endpoint).await?;
        String::from_utf8(bytes)
            .map_err(|e| FmdError::protocol(endpoint, format!("body is not UTF-8: {e}")))
    }

    fn declares_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` as a JSON body to `endpoint`. Only network-level
    /// failures are errors; any HTTP status is returned as a response.
    async fn send(&self, method: Method, endpoint: &str, payload: &Payload) -> Result<RawResponse>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FmdError::operation(&config.server_url, e))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, method: Method, endpoint: &str, payload: &Payload) -> Result<RawResponse> {
        let resp = self
            .client
            .request(method, format!("{}{endpoint}", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint, error = %e, "API request failed");
                FmdError::operation(endpoint, e)
            })?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(
            endpoint,
            status = status.as_u16(),
            content_type = content_type.as_deref().unwrap_or(""),
            content_length = resp.content_length(),
            "Response received"
        );

        let stream = resp.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
        let body = tokio_util::io::StreamReader::new(stream);

        Ok(RawResponse {
            status,
            content_type,
            body: Box::pin(body),
        })
    }
}

/// Extract the payload of a successful response.
///
/// With `expect_json` and a JSON content type the body must be an object with
/// a `Data` field. The server sometimes labels JSON as text or octet-stream, so
/// for other content types a `Data` envelope is used if present and the raw
/// text is returned otherwise.
pub async fn read_data(endpoint: &str, response: RawResponse, expect_json: bool) -> Result<String> {
    let declared_json = response.declares_json();
    let text = response.text(endpoint).await?;

    if text.is_empty() {
        warn!(endpoint, "Server returned an empty response body");
    }

    if !expect_json {
        return Ok(text);
    }

    if declared_json {
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| FmdError::protocol(endpoint, format!("invalid JSON: {e}")))?;
        return extract_data(endpoint, &value);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(value) if value.get("Data").is_some() => extract_data(endpoint, &value),
        _ => {
            debug!(endpoint, length = text.len(), "Non-JSON response, using body text");
            Ok(text)
        }
    }
}

fn extract_data(endpoint: &str, value: &Value) -> Result<String> {
    match value.get("Data") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(FmdError::protocol(endpoint, "missing Data field")),
        Some(other) => Ok(other.to_string()),
    }
}
