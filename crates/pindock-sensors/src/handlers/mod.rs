//! Per-type sensor policy and the aggregate dispatcher.
//!
//! Each handler owns one sensor type's policy for connect-time
//! initialization, polling, on-demand republish, and externally driven
//! state. The aggregate dispatches on the [`SensorType`] discriminant; the
//! configuration schema guarantees the types are mutually exclusive.

mod analog;
mod digital;
mod switch;

pub use analog::AnalogHandler;
pub use digital::DigitalHandler;
pub use switch::SwitchHandler;

use std::sync::Arc;

use pindock_link::{DeviceProxy, LinkError};

use crate::cache::PinStateCache;
use crate::config::{Sensor, SensorKind};
use crate::publisher::StatePublisher;

pub(crate) fn on_off(state: bool) -> &'static str {
    if state { "on" } else { "off" }
}

/// Dispatches sensor operations to the per-type handlers.
///
/// One aggregate per connection, with a fresh [`PinStateCache`] shared by
/// all three handlers: a device's pins are one namespace, whichever sensor
/// type observes them.
pub struct AggregateHandler {
    digital: DigitalHandler,
    analog: AnalogHandler,
    switch: SwitchHandler,
}

impl AggregateHandler {
    #[must_use]
    pub fn new(proxy: DeviceProxy, publisher: Arc<dyn StatePublisher>) -> Self {
        let cache = Arc::new(PinStateCache::new());

        Self {
            digital: DigitalHandler::new(proxy.clone(), Arc::clone(&publisher), Arc::clone(&cache)),
            analog: AnalogHandler::new(proxy.clone(), Arc::clone(&publisher), Arc::clone(&cache)),
            switch: SwitchHandler::new(proxy, publisher, cache),
        }
    }

    /// Connect-time initialization: pin-mode configuration and initial
    /// availability/state publication.
    pub async fn on_connect(&self, sensor: &Sensor) -> Result<(), LinkError> {
        match &sensor.kind {
            SensorKind::Digital(cfg) => self.digital.on_connect(sensor, cfg).await,
            SensorKind::Analog(cfg) => self.analog.on_connect(sensor, cfg).await,
            SensorKind::Switch(cfg) => self.switch.on_connect(sensor, cfg).await,
        }
    }

    /// One poll-loop step. Write-only sensors no-op here.
    pub async fn on_poll(&self, sensor: &Sensor) -> Result<(), LinkError> {
        match &sensor.kind {
            SensorKind::Digital(cfg) => self.digital.on_poll(sensor, cfg).await,
            SensorKind::Analog(cfg) => self.analog.on_poll(sensor, cfg).await,
            SensorKind::Switch(_) => Ok(()),
        }
    }

    /// Re-emit cached state/status without touching hardware.
    ///
    /// Before the first observation there is nothing cached and nothing is
    /// published.
    pub fn on_publish(&self, sensor: &Sensor) {
        match &sensor.kind {
            SensorKind::Digital(cfg) => self.digital.on_publish(sensor, cfg),
            SensorKind::Analog(cfg) => self.analog.on_publish(sensor, cfg),
            SensorKind::Switch(cfg) => self.switch.on_publish(sensor, cfg),
        }
    }

    /// Apply externally driven state. Only switches accept it.
    pub async fn on_set_state(&self, sensor: &Sensor, state: bool) -> Result<(), LinkError> {
        match &sensor.kind {
            SensorKind::Switch(cfg) => self.switch.on_set_state(sensor, cfg, state).await,
            SensorKind::Digital(_) | SensorKind::Analog(_) => Ok(()),
        }
    }
}
