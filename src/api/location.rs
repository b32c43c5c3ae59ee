/// Decrypted payload types.
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::api::endpoints;
use crate::crypto::encoding;
use crate::error::{FmdError, Result};

/// One location record as uploaded by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Human-readable device time, e.g. "Sat Oct 18 14:08:20 CDT 2025".
    pub time: String,
    /// Unix time in milliseconds.
    pub date: i64,
    /// "gps", "network", "fused", "BeaconDB", ...
    pub provider: String,
    /// Battery percentage. Some app versions send it as a string.
    #[serde(default, deserialize_with = "lenient_u8")]
    pub bat: Option<u8>,
    pub lat: f64,
    pub lon: f64,
    /// Accuracy radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Meters per second, only while moving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Degrees 0-360, only while moving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

fn lenient_u8<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u8>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl Location {
    pub fn from_json(plaintext: &[u8]) -> Result<Self> {
        serde_json::from_slice(plaintext)
            .map_err(|e| FmdError::protocol(endpoints::LOCATION, format!("invalid location record: {e}")))
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.date).single()
    }
}

/// Turn a decrypted picture payload into image bytes.
///
/// The device uploads base64 text, sometimes behind a data-URI prefix
/// (`data:image/jpeg;base64,`).
pub fn decode_picture(plaintext: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(plaintext)
        .map_err(|e| FmdError::protocol(endpoints::PICTURES, format!("picture payload is not text: {e}")))?;
    let b64 = text.rsplit(',').next().unwrap_or(text);
    encoding::decode_lenient(b64)
        .map_err(|e| FmdError::protocol(endpoints::PICTURES, format!("picture payload: {e}")))
}
