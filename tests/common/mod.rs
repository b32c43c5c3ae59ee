//! In-process mock FMD server for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use fmd_client::crypto::keys::{wrap_private_key, PrivateKey};
use fmd_client::crypto::{blob, kdf};
use fmd_client::{ClientConfig, Credentials, KdfParams};

pub const ACCOUNT: &str = "alice";
pub const PASSWORD: &str = "correct-horse";
pub const SALT: &str = "c2FsdHNhbHRzYWx0c2FsdA";

pub const PRIMARY_PEM: &str = include_str!("../fixtures/rsa3072_primary.pem");

/// Lowered Argon2 profile shared by the mock server and the client under test.
pub fn test_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
        output_len: 32,
    }
}

pub fn device_key() -> PrivateKey {
    PrivateKey::from_pem(PRIMARY_PEM).unwrap()
}

pub fn credentials() -> Credentials {
    Credentials::new(ACCOUNT, PASSWORD)
}

/// Encrypt `plaintext` to the device key as the app would upload it.
pub fn seal(plaintext: &[u8]) -> String {
    blob::seal(plaintext, &device_key().public_key()).unwrap()
}

#[derive(Default)]
pub struct ServerState {
    pub login_hash: String,
    pub wrapped_key: String,
    /// Token currently accepted; empty until the first login.
    pub token: String,
    pub logins: usize,
    pub locations: Vec<String>,
    pub pictures: Vec<String>,
    pub export: Vec<u8>,
    /// Serve `locationDataSize` as a bare text/plain number.
    pub size_as_text: bool,
    /// Commands received, as full request bodies.
    pub commands: Vec<Value>,
    /// Every request path in arrival order.
    pub requests: Vec<String>,
}

pub type Shared = Arc<Mutex<ServerState>>;

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Shared,
}

impl MockServer {
    pub async fn start() -> Self {
        let kdf = test_kdf();
        let state = ServerState {
            login_hash: kdf::login_hash(PASSWORD, SALT, &kdf).unwrap(),
            wrapped_key: wrap_private_key(PRIMARY_PEM.as_bytes(), PASSWORD, &kdf).unwrap(),
            ..ServerState::default()
        };
        let state: Shared = Arc::new(Mutex::new(state));

        let app = Router::new()
            .route("/api/v1/salt", post(salt))
            .route("/api/v1/requestAccess", post(request_access))
            .route("/api/v1/key", post(key))
            .route("/api/v1/locationDataSize", post(location_data_size))
            .route("/api/v1/location", post(location))
            .route("/api/v1/pictures", put(pictures))
            .route("/api/v1/command", post(command))
            .route("/api/v1/exportData", post(export_data))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.url()).with_kdf(test_kdf())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ServerState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Invalidate the current token, as if the session timed out.
    pub fn expire_session(&self) {
        self.with(|s| s.token = "expired".into());
    }
}

fn data(value: impl Into<Value>) -> Response {
    Json(json!({ "Data": value.into() })).into_response()
}

fn record<'a>(state: &'a Shared, path: &str) -> std::sync::MutexGuard<'a, ServerState> {
    let mut guard = state.lock().unwrap();
    guard.requests.push(path.to_string());
    guard
}

fn authorized(state: &ServerState, body: &Value) -> bool {
    !state.token.is_empty() && body["IDT"] == state.token
}

async fn salt(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let _guard = record(&state, "salt");
    if body["IDT"] != ACCOUNT {
        return StatusCode::NOT_FOUND.into_response();
    }
    data(SALT)
}

async fn request_access(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = record(&state, "requestAccess");
    if body["IDT"] != ACCOUNT || body["Data"] != s.login_hash {
        return StatusCode::FORBIDDEN.into_response();
    }
    s.logins += 1;
    s.token = format!("token-{}", s.logins);
    data(s.token.clone())
}

async fn key(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let s = record(&state, "key");
    if !authorized(&s, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    data(s.wrapped_key.clone())
}

async fn location_data_size(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let s = record(&state, "locationDataSize");
    if !authorized(&s, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let size = s.locations.len();
    if s.size_as_text {
        ([(header::CONTENT_TYPE, "text/plain")], size.to_string()).into_response()
    } else {
        data(size.to_string())
    }
}

async fn location(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let s = record(&state, "location");
    if !authorized(&s, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let index: Option<usize> = body["Data"].as_str().and_then(|d| d.parse().ok());
    match index.and_then(|i| s.locations.get(i)) {
        Some(blob) => data(blob.clone()),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn pictures(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let s = record(&state, "pictures");
    if !authorized(&s, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!(s.pictures)).into_response()
}

async fn command(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = record(&state, "command");
    if !authorized(&s, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    s.commands.push(body);
    StatusCode::OK.into_response()
}

async fn export_data(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let s = record(&state, "exportData");
    if !authorized(&s, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ([(header::CONTENT_TYPE, "application/zip")], s.export.clone()).into_response()
}
