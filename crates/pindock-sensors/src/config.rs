//! Sensor configuration model.
//!
//! Sensors are immutable for the process lifetime and bind to a device by
//! its reported address. The kind is a closed tagged variant; dispatch is
//! by the [`SensorType`] discriminant, never by runtime type checks.

use pindock_core::constants::ANALOG_MAX;
use pindock_core::{DeviceAddr, Error, Pin, Result, SensorId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Digital,
    Analog,
    Switch,
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            SensorType::Digital => "digital",
            SensorType::Analog => "analog",
            SensorType::Switch => "switch",
        };
        write!(f, "{s}")
    }
}

/// One configured sensor, bound to a pin on one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub device_id: DeviceAddr,
    pub name: String,
    pub pin: Pin,
    #[serde(flatten)]
    pub kind: SensorKind,
}

impl Sensor {
    /// The type discriminant of this sensor.
    #[must_use]
    pub fn sensor_type(&self) -> SensorType {
        match self.kind {
            SensorKind::Digital(_) => SensorType::Digital,
            SensorKind::Analog(_) => SensorType::Analog,
            SensorKind::Switch(_) => SensorType::Switch,
        }
    }

    /// Validate type-specific configuration shape.
    ///
    /// # Errors
    /// Returns `Error::Config` for malformed analog bands.
    pub fn validate(&self) -> Result<()> {
        if let SensorKind::Analog(cfg) = &self.kind {
            cfg.bands
                .validate()
                .map_err(|e| Error::Config(format!("sensor {}: {e}", self.id)))?;
        }
        Ok(())
    }
}

/// Type-specific sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorKind {
    Digital(DigitalConfig),
    Analog(AnalogConfig),
    Switch(SwitchConfig),
}

/// A digital input sensor (e.g. a reed contact on an InputPullup pin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalConfig {
    /// Home-automation classification tag (e.g. `GarageDoor`), passed
    /// through to discovery.
    #[serde(default)]
    pub class: Option<String>,
    /// Invert the raw reading before publishing.
    #[serde(default)]
    pub invert: bool,
}

/// An analog input sensor classified against three value bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogConfig {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(flatten)]
    pub bands: AnalogBands,
}

/// A write-only virtual switch backed by a physical output pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Invert the apparent state before driving the pin.
    #[serde(default)]
    pub invert: bool,
    /// Apparent state applied at connect time.
    #[serde(default)]
    pub default_state: bool,
}

/// One inclusive range of raw analog values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub min: u16,
    pub max: u16,
}

impl Band {
    #[must_use]
    pub fn contains(&self, value: u16) -> bool {
        value >= self.min && value <= self.max
    }

    fn overlaps(&self, other: &Band) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// The three disjoint classification bands of an analog sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalogBands {
    pub offline: Band,
    pub off: Band,
    pub on: Band,
}

impl AnalogBands {
    /// Classify a raw reading.
    ///
    /// Bands are evaluated in fixed priority - offline, then off, then on -
    /// and a value in none of them defaults to offline, so classification
    /// is total.
    #[must_use]
    pub fn classify(&self, value: u16) -> AnalogLevel {
        if self.offline.contains(value) {
            AnalogLevel::Offline
        } else if self.off.contains(value) {
            AnalogLevel::Off
        } else if self.on.contains(value) {
            AnalogLevel::On
        } else {
            AnalogLevel::Offline
        }
    }

    /// Validate band shape: each min ≤ max, each within the ADC range,
    /// and the three bands pairwise disjoint.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("offline", self.offline),
            ("off", self.off),
            ("on", self.on),
        ];

        for (name, band) in named {
            if band.min > band.max {
                return Err(Error::Config(format!(
                    "{name} band is inverted ({}..{})",
                    band.min, band.max
                )));
            }
            if band.max > ANALOG_MAX {
                return Err(Error::Config(format!(
                    "{name} band exceeds the ADC range (max {ANALOG_MAX})"
                )));
            }
        }

        for i in 0..named.len() {
            for j in (i + 1)..named.len() {
                let (a_name, a) = named[i];
                let (b_name, b) = named[j];
                if a.overlaps(&b) {
                    return Err(Error::Config(format!(
                        "{a_name} and {b_name} bands overlap"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Classified analog level: the (availability, state) pair and its packed
/// ternary encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogLevel {
    /// Not available; state reads as off.
    Offline,
    /// Available, off.
    Off,
    /// Available, on.
    On,
}

impl AnalogLevel {
    /// Availability half of the pair.
    #[must_use]
    pub fn available(self) -> bool {
        !matches!(self, AnalogLevel::Offline)
    }

    /// State half of the pair.
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, AnalogLevel::On)
    }

    /// Packed ternary encoding: `(state ? 1 : 0) + (available ? 0 : -1)`,
    /// yielding exactly {-1, 0, 1}.
    #[must_use]
    pub fn packed(self) -> i8 {
        i8::from(self.is_on()) + if self.available() { 0 } else { -1 }
    }

    /// Inverse of [`Self::packed`].
    #[must_use]
    pub fn from_packed(value: i8) -> Self {
        match value {
            1 => AnalogLevel::On,
            0 => AnalogLevel::Off,
            _ => AnalogLevel::Offline,
        }
    }
}
