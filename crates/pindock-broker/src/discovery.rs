//! Home-automation discovery payload generation.
//!
//! One JSON config message per sensor, published on every broker
//! (re)connect and whenever the home-automation layer announces itself on
//! the discovery status topic.

use serde_json::{Value, json};

use pindock_sensors::{Sensor, SensorKind};

use crate::outbound::OutboundMessage;
use crate::topics;

/// Build the discovery config message for one sensor.
#[must_use]
pub fn discovery_message(
    base_discovery: &str,
    base_control: &str,
    sensor: &Sensor,
) -> OutboundMessage {
    let payload = match &sensor.kind {
        SensorKind::Digital(cfg) => {
            binary_sensor_payload(base_control, sensor, cfg.class.as_deref())
        }
        SensorKind::Analog(cfg) => {
            binary_sensor_payload(base_control, sensor, cfg.class.as_deref())
        }
        SensorKind::Switch(_) => json!({
            "name": sensor.name,
            "state_topic": topics::state_topic(base_control, &sensor.id),
            "command_topic": topics::set_topic(base_control, &sensor.id),
            "payload_on": topics::STATE_ON,
            "payload_off": topics::STATE_OFF,
        }),
    };

    OutboundMessage::new(
        topics::discovery_topic(base_discovery, sensor.sensor_type(), &sensor.id),
        serde_json::to_vec(&payload).expect("discovery payload serialization"),
    )
}

/// Digital and analog sensors share the binary_sensor discovery shape.
fn binary_sensor_payload(base_control: &str, sensor: &Sensor, class: Option<&str>) -> Value {
    let mut payload = json!({
        "name": sensor.name,
        "state_topic": topics::state_topic(base_control, &sensor.id),
        "availability_topic": topics::status_topic(base_control, &sensor.id),
        "payload_on": topics::STATE_ON,
        "payload_off": topics::STATE_OFF,
        "payload_available": topics::STATUS_ONLINE,
        "payload_not_available": topics::STATUS_OFFLINE,
    });

    if let Some(class) = class {
        payload["device_class"] = json!(topics::snake_case_class(class));
    }

    payload
}
