use crate::{
    Result,
    constants::MAX_PIN,
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device address: the MAC-style identity a device reports during the
/// identify handshake (six colon-separated hex pairs).
///
/// Addresses are normalized to uppercase so that configuration entries and
/// handshake replies compare equal regardless of case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddr(String);

impl DeviceAddr {
    /// Create a new device address with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidDeviceAddr` if the value is not six
    /// colon-separated hex pairs (`AA:BB:CC:DD:EE:FF`).
    pub fn new(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        let groups: Vec<&str> = addr.split(':').collect();

        let valid = groups.len() == 6
            && groups
                .iter()
                .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()));

        if !valid {
            return Err(Error::InvalidDeviceAddr(addr.to_string()));
        }

        Ok(DeviceAddr(addr.to_uppercase()))
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceAddr::new(s)
    }
}

impl TryFrom<String> for DeviceAddr {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        DeviceAddr::new(&s)
    }
}

impl From<DeviceAddr> for String {
    fn from(addr: DeviceAddr) -> Self {
        addr.0
    }
}

/// Physical pin number (2 wire digits, zero-padded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Pin(u8);

impl Pin {
    /// Create a new pin with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidPin` if the pin is outside the wire-encodable
    /// range (0-99).
    pub fn new(pin: u8) -> Result<Self> {
        if pin > MAX_PIN {
            return Err(Error::InvalidPin(format!(
                "Pin must be 0-{MAX_PIN}, got {pin}"
            )));
        }
        Ok(Pin(pin))
    }

    /// Get the raw pin number as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl TryFrom<u8> for Pin {
    type Error = Error;

    fn try_from(pin: u8) -> Result<Self> {
        Pin::new(pin)
    }
}

impl From<Pin> for u8 {
    fn from(pin: Pin) -> Self {
        pin.0
    }
}

/// Sensor identifier from configuration.
///
/// Sensor ids become MQTT topic segments, so they must be non-empty ASCII
/// without topic metacharacters or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SensorId(String);

impl SensorId {
    /// Create a new sensor id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidSensorId` if the id is empty, non-ASCII, or
    /// contains `/`, `+`, `#`, or whitespace.
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::InvalidSensorId("empty sensor id".to_string()));
        }

        let valid = id.is_ascii()
            && !id
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '+' | '#'));

        if !valid {
            return Err(Error::InvalidSensorId(id.to_string()));
        }

        Ok(SensorId(id.to_string()))
    }

    /// Get the sensor id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SensorId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        SensorId::new(&s)
    }
}

impl From<SensorId> for String {
    fn from(id: SensorId) -> Self {
        id.0
    }
}

/// Lifecycle status shared by the correlator and the connection.
///
/// Transitions are one-way: `Created → Running → Canceled → Stopped`.
/// Starting from a terminal state fails; stopping is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Canceled,
    Stopped,
}

impl RunState {
    /// Whether this state is terminal (no restart possible).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Canceled | RunState::Stopped)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            RunState::Created => "Created",
            RunState::Running => "Running",
            RunState::Canceled => "Canceled",
            RunState::Stopped => "Stopped",
        };
        write!(f, "{s}")
    }
}
