use std::sync::Arc;

use tracing::info;

use pindock_link::{DeviceProxy, LinkError};
use pindock_protocol::PinMode;

use crate::cache::PinStateCache;
use crate::config::{Sensor, SwitchConfig};
use crate::handlers::on_off;
use crate::publisher::StatePublisher;

/// Write-only virtual switches backed by a physical output pin.
///
/// The cache stores the physical pin level; the published state is always
/// the apparent (un-inverted) one. Switches are authoritative, not
/// measured: the poll step never reads them back.
pub struct SwitchHandler {
    proxy: DeviceProxy,
    publisher: Arc<dyn StatePublisher>,
    cache: Arc<PinStateCache>,
}

impl SwitchHandler {
    #[must_use]
    pub fn new(
        proxy: DeviceProxy,
        publisher: Arc<dyn StatePublisher>,
        cache: Arc<PinStateCache>,
    ) -> Self {
        Self { proxy, publisher, cache }
    }

    /// Drive the pin to the configured default and publish the apparent
    /// default state.
    pub async fn on_connect(&self, sensor: &Sensor, cfg: &SwitchConfig) -> Result<(), LinkError> {
        let physical = cfg.default_state != cfg.invert;

        self.cache.set_bool(sensor.pin, physical);
        self.proxy
            .set_pin_mode_with_state(sensor.pin, PinMode::Output, physical)
            .await?;

        self.publisher.publish_status(sensor, true);
        self.publisher.publish_state(sensor, cfg.default_state);
        Ok(())
    }

    /// Apply externally driven state.
    ///
    /// Setting the already-cached value is a silent no-op that never
    /// touches hardware.
    pub async fn on_set_state(
        &self,
        sensor: &Sensor,
        cfg: &SwitchConfig,
        state: bool,
    ) -> Result<(), LinkError> {
        let physical = state != cfg.invert;

        if !self.cache.set_bool(sensor.pin, physical) {
            return Ok(());
        }

        self.proxy.digital_write(sensor.pin, physical).await?;

        info!(sensor = %sensor.name, state = on_off(state), "state changed via broker");

        self.publisher.publish_status(sensor, true);
        self.publisher.publish_state(sensor, state);
        Ok(())
    }

    pub fn on_publish(&self, sensor: &Sensor, cfg: &SwitchConfig) {
        if !self.cache.has(sensor.pin) {
            return;
        }

        let apparent = self.cache.get_bool(sensor.pin) != cfg.invert;
        self.publisher.publish_status(sensor, true);
        self.publisher.publish_state(sensor, apparent);
    }
}
