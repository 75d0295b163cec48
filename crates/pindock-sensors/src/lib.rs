//! Sensor configuration model, pin-state cache, and the per-type handlers
//! that turn raw pin readings into publishable sensor state.

pub mod cache;
pub mod config;
pub mod handlers;
pub mod publisher;

pub use cache::PinStateCache;
pub use config::{
    AnalogBands, AnalogConfig, AnalogLevel, Band, DigitalConfig, Sensor, SensorKind, SensorType,
    SwitchConfig,
};
pub use handlers::AggregateHandler;
pub use publisher::StatePublisher;
