use std::sync::Arc;

use tracing::info;

use pindock_link::{DeviceProxy, LinkError};
use pindock_protocol::PinMode;

use crate::cache::PinStateCache;
use crate::config::{AnalogConfig, AnalogLevel, Sensor};
use crate::handlers::on_off;
use crate::publisher::StatePublisher;

/// Analog input sensors: raw readings classified against the configured
/// bands, cached as a packed ternary value.
pub struct AnalogHandler {
    proxy: DeviceProxy,
    publisher: Arc<dyn StatePublisher>,
    cache: Arc<PinStateCache>,
}

impl AnalogHandler {
    #[must_use]
    pub fn new(
        proxy: DeviceProxy,
        publisher: Arc<dyn StatePublisher>,
        cache: Arc<PinStateCache>,
    ) -> Self {
        Self { proxy, publisher, cache }
    }

    pub async fn on_connect(&self, sensor: &Sensor, _cfg: &AnalogConfig) -> Result<(), LinkError> {
        self.proxy.set_pin_mode(sensor.pin, PinMode::Input).await
    }

    /// Read, classify, and publish when the packed value changes.
    ///
    /// Publishing always emits two messages - availability and state -
    /// unpacked from the cached ternary.
    pub async fn on_poll(&self, sensor: &Sensor, cfg: &AnalogConfig) -> Result<(), LinkError> {
        let Some(value) = self.proxy.analog_read(sensor.pin).await? else {
            return Ok(());
        };

        let level = cfg.bands.classify(value);

        if !self.cache.set(sensor.pin, level.packed()) {
            return Ok(());
        }

        if level.available() {
            info!(sensor = %sensor.name, state = on_off(level.is_on()), "state changed");
        } else {
            info!(sensor = %sensor.name, "state changed to offline");
        }

        self.publisher.publish_status(sensor, level.available());
        self.publisher.publish_state(sensor, level.is_on());
        Ok(())
    }

    pub fn on_publish(&self, sensor: &Sensor, _cfg: &AnalogConfig) {
        if !self.cache.has(sensor.pin) {
            return;
        }

        let level = AnalogLevel::from_packed(self.cache.get(sensor.pin));
        self.publisher.publish_status(sensor, level.available());
        self.publisher.publish_state(sensor, level.is_on());
    }
}
