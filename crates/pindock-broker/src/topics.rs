//! Topic naming and payload conventions.
//!
//! Every sensor owns three control topics derived from its id -
//! `<control>/<id>/state`, `<control>/<id>/status`, `<control>/<id>/set` -
//! plus one discovery topic under the home-automation discovery prefix.

use pindock_core::SensorId;
use pindock_sensors::SensorType;

/// State payload for an asserted sensor or switch.
pub const STATE_ON: &str = "on";
/// State payload for a deasserted sensor or switch.
pub const STATE_OFF: &str = "off";
/// Availability payload for a reachable sensor.
pub const STATUS_ONLINE: &str = "online";
/// Availability payload for an unreachable sensor.
pub const STATUS_OFFLINE: &str = "offline";

/// Topic carrying a sensor's on/off state.
#[must_use]
pub fn state_topic(base_control: &str, id: &SensorId) -> String {
    format!("{base_control}/{id}/state")
}

/// Topic carrying a sensor's online/offline availability.
#[must_use]
pub fn status_topic(base_control: &str, id: &SensorId) -> String {
    format!("{base_control}/{id}/status")
}

/// Topic a switch listens on for externally driven state.
#[must_use]
pub fn set_topic(base_control: &str, id: &SensorId) -> String {
    format!("{base_control}/{id}/set")
}

/// Discovery config topic for a sensor.
#[must_use]
pub fn discovery_topic(base_discovery: &str, sensor_type: SensorType, id: &SensorId) -> String {
    format!(
        "{base_discovery}/{}/sensor-{id}/config",
        component(sensor_type)
    )
}

/// Topic the home-automation layer announces its own availability on.
#[must_use]
pub fn discovery_status_topic(base_discovery: &str) -> String {
    format!("{base_discovery}/status")
}

/// Wildcard subscription matching every sensor's set topic.
#[must_use]
pub fn set_subscription(base_control: &str) -> String {
    format!("{base_control}/+/set")
}

/// Home-automation component for a sensor type.
#[must_use]
pub fn component(sensor_type: SensorType) -> &'static str {
    match sensor_type {
        SensorType::Digital | SensorType::Analog => "binary_sensor",
        SensorType::Switch => "switch",
    }
}

/// Extract the sensor id from an inbound `<control>/<id>/set` topic.
///
/// Returns `None` for any other topic shape.
#[must_use]
pub fn parse_set_topic<'a>(topic: &'a str, base_control: &str) -> Option<&'a str> {
    let parts: Vec<&str> = topic.split('/').collect();

    match parts.as_slice() {
        [base, id, "set"] if *base == base_control => Some(id),
        _ => None,
    }
}

/// Map a PascalCase classification tag to its snake_case discovery form
/// (`GarageDoor` -> `garage_door`).
#[must_use]
pub fn snake_case_class(class: &str) -> String {
    let mut result = String::with_capacity(class.len() + 4);

    for character in class.chars() {
        if character.is_ascii_uppercase() {
            result.push('_');
            result.push(character.to_ascii_lowercase());
        } else {
            result.push(character);
        }
    }

    result.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id(s: &str) -> SensorId {
        SensorId::new(s).unwrap()
    }

    #[test]
    fn control_topic_shapes() {
        let id = id("boiler");
        assert_eq!(state_topic("pindock", &id), "pindock/boiler/state");
        assert_eq!(status_topic("pindock", &id), "pindock/boiler/status");
        assert_eq!(set_topic("pindock", &id), "pindock/boiler/set");
    }

    #[test]
    fn discovery_topic_uses_component() {
        let id = id("door");
        assert_eq!(
            discovery_topic("homeassistant", SensorType::Digital, &id),
            "homeassistant/binary_sensor/sensor-door/config"
        );
        assert_eq!(
            discovery_topic("homeassistant", SensorType::Switch, &id),
            "homeassistant/switch/sensor-door/config"
        );
    }

    #[test]
    fn subscriptions() {
        assert_eq!(discovery_status_topic("homeassistant"), "homeassistant/status");
        assert_eq!(set_subscription("pindock"), "pindock/+/set");
    }

    #[rstest]
    #[case("pindock/boiler/set", Some("boiler"))]
    #[case("pindock/boiler/state", None)]
    #[case("other/boiler/set", None)]
    #[case("pindock/a/b/set", None)]
    #[case("pindock/set", None)]
    fn parse_set_topic_shapes(#[case] topic: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_set_topic(topic, "pindock"), expected);
    }

    #[rstest]
    #[case("GarageDoor", "garage_door")]
    #[case("Moisture", "moisture")]
    #[case("door", "door")]
    fn class_snake_casing(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(snake_case_class(input), expected);
    }
}
