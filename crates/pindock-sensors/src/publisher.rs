//! The seam between sensor handlers and the broker bridge.

use crate::config::Sensor;

/// Outbound state sink the handlers publish through.
///
/// Implemented by the broker bridge: it computes the topic names from the
/// sensor id and enqueues the messages on the outbound queue. Both calls
/// are enqueue-only and never block on broker availability.
pub trait StatePublisher: Send + Sync {
    /// Publish the sensor's externally visible on/off state.
    fn publish_state(&self, sensor: &Sensor, state: bool);

    /// Publish the sensor's online/offline availability.
    fn publish_status(&self, sensor: &Sensor, online: bool);
}
