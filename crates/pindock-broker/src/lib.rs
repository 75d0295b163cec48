//! MQTT bridge: topic conventions, Home Assistant discovery, the
//! connection registry, the outbound batching queue, and the broker client
//! loop.
//!
//! Broker availability is never the gateway's problem: publishes accumulate
//! on the [`OutboundQueue`] while the broker is unreachable and reconnection
//! is retried on a fixed interval indefinitely. Nothing in this crate can
//! fail a device connection.

pub mod bridge;
pub mod discovery;
pub mod outbound;
pub mod registry;
pub mod topics;

pub use bridge::{BrokerSettings, MqttBridge};
pub use outbound::{OutboundMessage, OutboundQueue};
pub use registry::{ConnectionCommand, ConnectionHandle, ConnectionRegistry};
