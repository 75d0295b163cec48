//! Gateway configuration, loaded from `settings.json`.
//!
//! Configuration errors are fatal to process startup, before any
//! networking begins.

use std::path::Path;

use serde::{Deserialize, Serialize};

use pindock_broker::BrokerSettings;
use pindock_core::{Error, Result};
use pindock_sensors::Sensor;

/// Top-level gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// TCP port the device listener binds on.
    pub listen_port: u16,
    /// Broker connection and topic configuration.
    pub mqtt: BrokerSettings,
    /// Every sensor the gateway may bind, across all devices.
    pub sensors: Vec<Sensor>,
}

impl Settings {
    /// Load and validate settings from a JSON file.
    ///
    /// # Errors
    /// Returns `Error::Config` on unreadable files, malformed JSON,
    /// unknown sensor types, duplicate sensor ids, or malformed analog
    /// bands.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

        Self::parse(&text)
    }

    /// Parse and validate settings from a JSON string.
    ///
    /// # Errors
    /// Same as [`Self::load`], minus file I/O.
    pub fn parse(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid settings: {e}")))?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for sensor in &self.sensors {
            sensor.validate()?;
        }

        let mut seen = std::collections::HashSet::new();
        for sensor in &self.sensors {
            if !seen.insert(sensor.id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate sensor id: {}",
                    sensor.id
                )));
            }
        }

        Ok(())
    }
}
