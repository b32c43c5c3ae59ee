/// Session-holding FMD client.
///
/// State: Unauthenticated → Authenticated (re-entered on every 401-driven
/// re-login) → Failed once the server rejects the stored credentials.
///
/// Mutating calls take `&mut self`, so one client serves one caller at a
/// time. Share it behind a mutex if several tasks need it.
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use super::command::{CameraFacing, Command, LocationProvider, RingerMode};
use super::location::Location;
use super::session::{Authenticator, Session};
use super::transport::{read_data, HttpTransport, RawResponse, Transport};
use super::{endpoints, Payload};
use crate::config::{ClientConfig, Credentials};
use crate::crypto::keys::PrivateKey;
use crate::crypto::{blob, sign};
use crate::error::{FmdError, Result};

const EXPORT_CHUNK: usize = 8192;

/// Observable client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    /// Credentials were rejected. New credentials are needed.
    Failed,
}

enum State {
    Unauthenticated,
    Authenticated(Session),
    Failed,
}

/// Which location blobs to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationQuery {
    /// `None` fetches every stored location, oldest first.
    pub count: Option<usize>,
    /// Walk past empty blobs looking for real data.
    pub skip_empty: bool,
    /// How many indices to try when skipping empties.
    pub max_attempts: usize,
}

impl LocationQuery {
    pub fn all() -> Self {
        Self {
            count: None,
            ..Self::default()
        }
    }

    pub fn latest(count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }
}

impl Default for LocationQuery {
    fn default() -> Self {
        Self {
            count: Some(1),
            skip_empty: true,
            max_attempts: 10,
        }
    }
}

pub struct FmdClient {
    transport: Box<dyn Transport>,
    config: ClientConfig,
    credentials: Option<Credentials>,
    state: State,
}

impl FmdClient {
    /// Client over HTTP. Call `login` before anything else.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            config,
            credentials: None,
            state: State::Unauthenticated,
        }
    }

    /// Build an HTTP client and log in.
    pub async fn connect(config: ClientConfig, credentials: Credentials) -> Result<Self> {
        let mut client = Self::new(config)?;
        client.login(credentials).await?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        match self.state {
            State::Unauthenticated => SessionState::Unauthenticated,
            State::Authenticated(_) => SessionState::Authenticated,
            State::Failed => SessionState::Failed,
        }
    }

    /// Store credentials and authenticate with them.
    pub async fn login(&mut self, credentials: Credentials) -> Result<()> {
        self.credentials = Some(credentials);
        self.establish_session().await
    }

    /// Re-run the login workflow with the stored credentials.
    ///
    /// On success the token and private key are replaced. A rejection moves
    /// the client to `Failed`, which only `login` with new credentials leaves;
    /// transient errors leave the state untouched.
    pub async fn authenticate(&mut self) -> Result<()> {
        if matches!(self.state, State::Failed) {
            return Err(FmdError::NotAuthenticated);
        }
        self.establish_session().await
    }

    async fn establish_session(&mut self) -> Result<()> {
        let credentials = self.credentials.as_ref().ok_or(FmdError::NotAuthenticated)?;

        let result = Authenticator::new(self.transport.as_ref(), self.config.kdf)
            .authenticate(credentials, self.config.session_duration)
            .await;

        match result {
            Ok(session) => {
                info!(account_id = %credentials.account_id, "Authenticated");
                self.state = State::Authenticated(session);
                Ok(())
            }
            Err(e @ FmdError::Authentication(_)) => {
                error!(error = %e, "Server rejected credentials");
                self.state = State::Failed;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn session(&self) -> Result<&Session> {
        match &self.state {
            State::Authenticated(session) => Ok(session),
            _ => Err(FmdError::NotAuthenticated),
        }
    }

    pub fn access_token(&self) -> Result<&str> {
        Ok(self.session()?.access_token.as_str())
    }

    pub fn private_key(&self) -> Result<&PrivateKey> {
        Ok(&self.session()?.private_key)
    }

    /// Send a request, re-authenticating and retrying once on 401.
    ///
    /// Any other non-success status is an `Operation` error, as is a second
    /// 401 after a fresh login.
    async fn send_authorized(&mut self, method: Method, endpoint: &str, mut payload: Payload) -> Result<RawResponse> {
        let mut reauthenticated = false;
        loop {
            let response = self.transport.send(method.clone(), endpoint, &payload).await?;
            let status = response.status;

            if status == StatusCode::UNAUTHORIZED && !reauthenticated && self.credentials.is_some() {
                info!(endpoint, "Received 401 Unauthorized, re-authenticating");
                self.authenticate().await?;
                payload.idt = self.access_token()?.to_string();
                reauthenticated = true;
                continue;
            }

            if !status.is_success() {
                let body = response.text(endpoint).await.unwrap_or_default();
                let snippet: String = body.chars().take(200).collect();
                error!(endpoint, status = status.as_u16(), "API request failed");
                return Err(FmdError::operation(endpoint, format!("HTTP {status}: {snippet}")));
            }

            return Ok(response);
        }
    }

    /// Authenticated request returning the `Data` field (or body text; see
    /// `read_data` for the content-type rules).
    pub async fn request(&mut self, method: Method, endpoint: &str, payload: Payload, expect_json: bool) -> Result<String> {
        let response = self.send_authorized(method, endpoint, payload).await?;
        read_data(endpoint, response, expect_json).await
    }

    /// Authenticated request returning the whole JSON body.
    pub async fn request_json(&mut self, method: Method, endpoint: &str, payload: Payload) -> Result<Value> {
        let response = self.send_authorized(method, endpoint, payload).await?;
        let text = response.text(endpoint).await?;
        serde_json::from_str(&text).map_err(|e| FmdError::protocol(endpoint, format!("invalid JSON: {e}")))
    }

    fn token_payload(&self, data: impl Into<String>) -> Result<Payload> {
        Ok(Payload::new(self.access_token()?, data))
    }

    pub fn decrypt_blob(&self, blob_b64: &str) -> Result<Vec<u8>> {
        blob::decrypt(blob_b64, self.private_key()?)
    }

    pub fn decrypt_location(&self, blob_b64: &str) -> Result<Location> {
        Location::from_json(&self.decrypt_blob(blob_b64)?)
    }

    /// `CmdSig` value for `command`, encoded per the configured padding rule.
    pub fn sign_command(&self, command: &str) -> Result<String> {
        Ok(sign::sign(command, self.private_key()?, self.config.signature_encoding))
    }

    /// Number of location records stored on the server.
    pub async fn location_count(&mut self) -> Result<usize> {
        let payload = self.token_payload("unused")?;
        let size = self
            .request(Method::POST, endpoints::LOCATION_DATA_SIZE, payload, true)
            .await?;
        size.trim()
            .parse()
            .map_err(|e| FmdError::protocol(endpoints::LOCATION_DATA_SIZE, format!("not a count: {size:?} ({e})")))
    }

    /// Raw blob at `index`. Empty when the device stored nothing there.
    pub async fn location_at(&mut self, index: usize) -> Result<String> {
        let payload = self.token_payload(index.to_string())?;
        self.request(Method::POST, endpoints::LOCATION, payload, true).await
    }

    /// Fetch location blobs, newest first unless `query.count` is `None`.
    pub async fn locations(&mut self, query: &LocationQuery) -> Result<Vec<String>> {
        let size = self.location_count().await?;
        debug!(size, "Server reports stored locations");
        if size == 0 {
            info!("No locations found to download");
            return Ok(Vec::new());
        }

        let Some(count) = query.count else {
            info!(size, "Downloading all locations");
            let mut locations = Vec::with_capacity(size);
            for index in 0..size {
                locations.push(self.location_at(index).await?);
            }
            return Ok(locations);
        };

        let wanted = count.min(size);
        let indices: Vec<usize> = if query.skip_empty {
            (0..size).rev().take(query.max_attempts).collect()
        } else {
            (size - wanted..size).rev().collect()
        };
        info!(size, wanted, "Downloading most recent locations");

        let mut locations = Vec::with_capacity(wanted);
        for index in indices {
            if locations.len() >= wanted {
                break;
            }
            let blob = self.location_at(index).await?;
            if blob.trim().is_empty() {
                warn!(index, "Empty blob received for location index");
                continue;
            }
            locations.push(blob);
        }

        if locations.is_empty() {
            warn!(size, "No valid locations found");
        }
        Ok(locations)
    }

    /// Picture blobs: all in server order, or the last `count` newest first.
    pub async fn pictures(&mut self, count: Option<usize>) -> Result<Vec<String>> {
        let payload = self.token_payload("")?;
        let body = self.request_json(Method::PUT, endpoints::PICTURES, payload).await?;

        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("Data") {
                Some(Value::Array(items)) => items,
                _ => return Err(FmdError::protocol(endpoints::PICTURES, "expected an array of pictures")),
            },
            _ => return Err(FmdError::protocol(endpoints::PICTURES, "expected an array of pictures")),
        };

        let mut pictures: Vec<String> = items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Value::String(s) => Some(s),
                other => {
                    warn!(index, kind = json_kind(&other), "Skipping non-string picture entry");
                    None
                }
            })
            .collect();
        info!(available = pictures.len(), "Pictures listed");

        if let Some(count) = count {
            let keep = count.min(pictures.len());
            pictures.drain(..pictures.len() - keep);
            pictures.reverse();
        }
        Ok(pictures)
    }

    /// Stream the server's export archive into `writer`. Returns bytes written.
    pub async fn export_data<W>(&mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let payload = self.token_payload("unused")?;
        let mut response = self
            .send_authorized(Method::POST, endpoints::EXPORT_DATA, payload)
            .await?;

        let mut buf = vec![0u8; EXPORT_CHUNK];
        let mut written = 0u64;
        loop {
            let n = response
                .body
                .read(&mut buf)
                .await
                .map_err(|e| FmdError::operation(endpoints::EXPORT_DATA, e))?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            written += n as u64;
        }
        writer.flush().await?;

        info!(bytes = written, "Export data downloaded");
        Ok(written)
    }

    /// Sign and send a command to the device.
    ///
    /// The signature covers the command text only; `UnixTime` rides along.
    pub async fn send_command(&mut self, command: &Command) -> Result<()> {
        let text = command.to_string();
        info!(command = %text, "Sending command to device");

        let signature = self.sign_command(&text)?;
        let unix_time_ms = chrono::Utc::now().timestamp_millis();
        let payload = self
            .token_payload(text.as_str())?
            .with("UnixTime", unix_time_ms)
            .with("CmdSig", signature);

        if let Err(e) = self.request(Method::POST, endpoints::COMMAND, payload, false).await {
            error!(command = %text, error = %e, "Failed to send command");
            return Err(e);
        }
        info!(command = %text, "Command sent");
        Ok(())
    }

    /// Ask the device for a fresh fix. It shows up in `locations` once the
    /// device has uploaded it.
    pub async fn request_location(&mut self, provider: LocationProvider) -> Result<()> {
        self.send_command(&Command::Locate(provider)).await
    }

    pub async fn ring(&mut self) -> Result<()> {
        self.send_command(&Command::Ring).await
    }

    pub async fn lock(&mut self) -> Result<()> {
        self.send_command(&Command::Lock).await
    }

    pub async fn take_picture(&mut self, camera: CameraFacing) -> Result<()> {
        self.send_command(&Command::Camera(camera)).await
    }

    pub async fn toggle_bluetooth(&mut self, enabled: bool) -> Result<()> {
        self.send_command(&Command::Bluetooth(enabled)).await
    }

    pub async fn toggle_do_not_disturb(&mut self, enabled: bool) -> Result<()> {
        self.send_command(&Command::DoNotDisturb(enabled)).await
    }

    pub async fn set_ringer_mode(&mut self, mode: RingerMode) -> Result<()> {
        self.send_command(&Command::RingerMode(mode)).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
