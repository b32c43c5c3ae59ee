/// Device commands understood by the FMD Android app.
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Which location source a `locate` command asks the device to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationProvider {
    #[default]
    All,
    Gps,
    /// Cell tower / network location.
    Cell,
    /// Last known location, no new fix.
    Last,
}

impl FromStr for LocationProvider {
    type Err = Infallible;

    /// Unknown names fall back to `All`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "gps" => Self::Gps,
            "cell" | "network" => Self::Cell,
            "last" => Self::Last,
            _ => Self::All,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingerMode {
    Normal,
    Vibrate,
    /// Android also enables Do Not Disturb in this mode.
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Locate(LocationProvider),
    Ring,
    Lock,
    /// Factory-reset the device.
    Delete,
    Camera(CameraFacing),
    Bluetooth(bool),
    DoNotDisturb(bool),
    RingerMode(RingerMode),
    /// Network info (IP addresses, Wi-Fi SSID/BSSID).
    Stats,
    /// Battery and GPS status.
    GpsStatus,
    Raw(String),
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locate(LocationProvider::All) => f.write_str("locate"),
            Self::Locate(LocationProvider::Gps) => f.write_str("locate gps"),
            Self::Locate(LocationProvider::Cell) => f.write_str("locate cell"),
            Self::Locate(LocationProvider::Last) => f.write_str("locate last"),
            Self::Ring => f.write_str("ring"),
            Self::Lock => f.write_str("lock"),
            Self::Delete => f.write_str("delete"),
            Self::Camera(CameraFacing::Front) => f.write_str("camera front"),
            Self::Camera(CameraFacing::Back) => f.write_str("camera back"),
            Self::Bluetooth(on) => write!(f, "bluetooth {}", on_off(*on)),
            Self::DoNotDisturb(on) => write!(f, "nodisturb {}", on_off(*on)),
            Self::RingerMode(RingerMode::Normal) => f.write_str("ringermode normal"),
            Self::RingerMode(RingerMode::Vibrate) => f.write_str("ringermode vibrate"),
            Self::RingerMode(RingerMode::Silent) => f.write_str("ringermode silent"),
            Self::Stats => f.write_str("stats"),
            Self::GpsStatus => f.write_str("gps"),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

impl FromStr for Command {
    type Err = Infallible;

    /// Recognise the known command strings; anything else is sent as-is.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let known = match s {
            "locate" | "locate all" => Self::Locate(LocationProvider::All),
            "locate gps" => Self::Locate(LocationProvider::Gps),
            "locate cell" => Self::Locate(LocationProvider::Cell),
            "locate last" => Self::Locate(LocationProvider::Last),
            "ring" => Self::Ring,
            "lock" => Self::Lock,
            "delete" => Self::Delete,
            "camera front" => Self::Camera(CameraFacing::Front),
            "camera back" => Self::Camera(CameraFacing::Back),
            "bluetooth on" => Self::Bluetooth(true),
            "bluetooth off" => Self::Bluetooth(false),
            "nodisturb on" => Self::DoNotDisturb(true),
            "nodisturb off" => Self::DoNotDisturb(false),
            "ringermode normal" => Self::RingerMode(RingerMode::Normal),
            "ringermode vibrate" => Self::RingerMode(RingerMode::Vibrate),
            "ringermode silent" => Self::RingerMode(RingerMode::Silent),
            "stats" => Self::Stats,
            "gps" => Self::GpsStatus,
            other => Self::Raw(other.to_string()),
        };
        Ok(known)
    }
}
