pub mod api;
pub mod config;
pub mod crypto;
pub mod error;

pub use api::{Command, FmdClient, Location, LocationProvider, LocationQuery, SessionState};
pub use config::{ClientConfig, Credentials, KdfParams, SignatureEncoding};
pub use error::{FmdError, Result};
