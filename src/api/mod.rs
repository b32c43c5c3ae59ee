/// FMD server API: transport seam, login, and the session-holding client.
///
/// Every request body is `{"IDT": <token or account id>, "Data": <payload>, ...}`.
pub mod client;
pub mod command;
pub mod location;
pub mod session;
pub mod transport;

use serde::Serialize;
use serde_json::{Map, Value};

pub use client::{FmdClient, LocationQuery, SessionState};
pub use command::{CameraFacing, Command, LocationProvider, RingerMode};
pub use location::Location;
pub use session::{Authenticator, Session};
pub use transport::{HttpTransport, RawResponse, Transport};

/// Endpoint paths relative to the server URL.
pub mod endpoints {
    pub const SALT: &str = "/api/v1/salt";
    pub const REQUEST_ACCESS: &str = "/api/v1/requestAccess";
    pub const KEY: &str = "/api/v1/key";
    pub const LOCATION: &str = "/api/v1/location";
    pub const LOCATION_DATA_SIZE: &str = "/api/v1/locationDataSize";
    pub const PICTURES: &str = "/api/v1/pictures";
    pub const COMMAND: &str = "/api/v1/command";
    pub const EXPORT_DATA: &str = "/api/v1/exportData";
}

/// Request body envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Payload {
    #[serde(rename = "IDT")]
    pub idt: String,
    #[serde(rename = "Data")]
    pub data: String,
    /// Endpoint-specific fields such as `UnixTime` or `CmdSig`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Payload {
    pub fn new(idt: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            idt: idt.into(),
            data: data.into(),
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_shape() {
        let payload = Payload::new("token", "ring")
            .with("UnixTime", 1_760_814_500_000i64)
            .with("CmdSig", "c2ln");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "IDT": "token",
                "Data": "ring",
                "UnixTime": 1_760_814_500_000i64,
                "CmdSig": "c2ln",
            })
        );
    }

    #[test]
    fn test_plain_payload_has_two_fields() {
        let value = serde_json::to_value(Payload::new("alice", "")).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 2);
    }
}
