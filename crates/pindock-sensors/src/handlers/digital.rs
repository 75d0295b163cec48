use std::sync::Arc;

use tracing::info;

use pindock_link::{DeviceProxy, LinkError};
use pindock_protocol::PinMode;

use crate::cache::PinStateCache;
use crate::config::{DigitalConfig, Sensor};
use crate::handlers::on_off;
use crate::publisher::StatePublisher;

/// Digital input sensors: polled reads with change debouncing.
pub struct DigitalHandler {
    proxy: DeviceProxy,
    publisher: Arc<dyn StatePublisher>,
    cache: Arc<PinStateCache>,
}

impl DigitalHandler {
    #[must_use]
    pub fn new(
        proxy: DeviceProxy,
        publisher: Arc<dyn StatePublisher>,
        cache: Arc<PinStateCache>,
    ) -> Self {
        Self { proxy, publisher, cache }
    }

    /// Pull the pin up and announce availability.
    pub async fn on_connect(&self, sensor: &Sensor, _cfg: &DigitalConfig) -> Result<(), LinkError> {
        self.proxy
            .set_pin_mode(sensor.pin, PinMode::InputPullup)
            .await?;
        self.publisher.publish_status(sensor, true);
        Ok(())
    }

    /// Read the pin; publish only when the cache reports a change.
    ///
    /// A read whose reply window expired skips this cycle without touching
    /// the cache.
    pub async fn on_poll(&self, sensor: &Sensor, cfg: &DigitalConfig) -> Result<(), LinkError> {
        let Some(state) = self.proxy.digital_read(sensor.pin).await? else {
            return Ok(());
        };

        if !self.cache.set_bool(sensor.pin, state) {
            return Ok(());
        }

        let apparent = state != cfg.invert;
        info!(sensor = %sensor.name, state = on_off(apparent), "state changed");

        self.publisher.publish_status(sensor, true);
        self.publisher.publish_state(sensor, apparent);
        Ok(())
    }

    /// Re-emit from cache; nothing to emit before the first poll.
    pub fn on_publish(&self, sensor: &Sensor, cfg: &DigitalConfig) {
        if !self.cache.has(sensor.pin) {
            return;
        }

        let apparent = self.cache.get_bool(sensor.pin) != cfg.invert;
        self.publisher.publish_status(sensor, true);
        self.publisher.publish_state(sensor, apparent);
    }
}
