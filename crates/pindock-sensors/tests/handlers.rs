//! Integration tests for the sensor handlers against a scripted device.
//!
//! A loopback TCP device answers read commands from a per-test script; a
//! recording publisher captures everything the handlers emit. This
//! exercises the full chain: handler -> proxy -> correlator -> wire.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pindock_core::{DeviceAddr, Pin, SensorId};
use pindock_link::{Correlator, DeviceProxy};
use pindock_sensors::{
    AggregateHandler, AnalogBands, AnalogConfig, Band, DigitalConfig, Sensor, SensorKind,
    StatePublisher, SwitchConfig,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    State(String, bool),
    Status(String, bool),
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingPublisher {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

impl StatePublisher for RecordingPublisher {
    fn publish_state(&self, sensor: &Sensor, state: bool) {
        self.events
            .lock()
            .unwrap()
            .push(Event::State(sensor.id.to_string(), state));
    }

    fn publish_status(&self, sensor: &Sensor, online: bool) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Status(sensor.id.to_string(), online));
    }
}

/// Scripted device: answers each command via `script`, forwards every
/// received command line for assertions.
async fn scripted_device(
    script: impl Fn(&str) -> Option<String> + Send + 'static,
) -> (std::net::SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            let _ = seen_tx.send(line.clone());

            let (id, command) = line.split_at(5);
            if let Some(result) = script(command) {
                let reply = format!("{id}{result}\n");
                if write.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    });

    (addr, seen_rx)
}

struct Rig {
    correlator: Arc<Correlator>,
    aggregate: AggregateHandler,
    publisher: Arc<RecordingPublisher>,
    seen: mpsc::UnboundedReceiver<String>,
}

async fn rig(script: impl Fn(&str) -> Option<String> + Send + 'static) -> Rig {
    let (addr, seen) = scripted_device(script).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let correlator = Arc::new(Correlator::new(stream, CancellationToken::new()));
    correlator.start().unwrap();

    let proxy = DeviceProxy::new(Arc::clone(&correlator));
    let publisher = Arc::new(RecordingPublisher::default());
    let aggregate = AggregateHandler::new(proxy, Arc::clone(&publisher) as Arc<dyn StatePublisher>);

    Rig { correlator, aggregate, publisher, seen }
}

fn device() -> DeviceAddr {
    DeviceAddr::new("AA:BB:CC:DD:EE:FF").unwrap()
}

fn switch_sensor(pin: u8, invert: bool, default_state: bool) -> Sensor {
    Sensor {
        id: SensorId::new("relay-1").unwrap(),
        device_id: device(),
        name: "Relay 1".to_string(),
        pin: Pin::new(pin).unwrap(),
        kind: SensorKind::Switch(SwitchConfig { invert, default_state }),
    }
}

fn digital_sensor(pin: u8, invert: bool) -> Sensor {
    Sensor {
        id: SensorId::new("door-1").unwrap(),
        device_id: device(),
        name: "Door 1".to_string(),
        pin: Pin::new(pin).unwrap(),
        kind: SensorKind::Digital(DigitalConfig { class: Some("Door".to_string()), invert }),
    }
}

fn analog_sensor(pin: u8) -> Sensor {
    Sensor {
        id: SensorId::new("sump-1").unwrap(),
        device_id: device(),
        name: "Sump 1".to_string(),
        pin: Pin::new(pin).unwrap(),
        kind: SensorKind::Analog(AnalogConfig {
            class: Some("Moisture".to_string()),
            bands: AnalogBands {
                offline: Band { min: 0, max: 10 },
                off: Band { min: 11, max: 500 },
                on: Band { min: 501, max: 1023 },
            },
        }),
    }
}

/// Pops one scripted analog value per read.
fn analog_script(values: Vec<&'static str>) -> impl Fn(&str) -> Option<String> + Send + 'static {
    let values = Mutex::new(VecDeque::from(values));
    move |cmd| {
        if cmd.starts_with('A') {
            values.lock().unwrap().pop_front().map(str::to_string)
        } else {
            None
        }
    }
}

#[tokio::test]
async fn inverted_switch_drives_pin_high_but_publishes_off() {
    let mut r = rig(|_| None).await;
    let sensor = switch_sensor(5, true, false);

    r.aggregate.on_connect(&sensor).await.unwrap();

    // Physical pin is written inverted (true)...
    assert_eq!(r.seen.recv().await.unwrap(), "C0001M05O");
    assert_eq!(r.seen.recv().await.unwrap(), "C0002W051");

    // ...while the published apparent state is the un-inverted default.
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("relay-1".to_string(), true),
            Event::State("relay-1".to_string(), false),
        ]
    );

    r.correlator.stop().await;
}

#[tokio::test]
async fn analog_band_walk_publishes_only_changes() {
    let mut r = rig(analog_script(vec!["5", "300", "900", "900"])).await;
    let sensor = analog_sensor(3);

    r.aggregate.on_connect(&sensor).await.unwrap();
    assert_eq!(r.seen.recv().await.unwrap(), "C0001M03I");
    assert!(r.publisher.take().is_empty());

    // 5 -> offline
    r.aggregate.on_poll(&sensor).await.unwrap();
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("sump-1".to_string(), false),
            Event::State("sump-1".to_string(), false),
        ]
    );

    // 300 -> online, off
    r.aggregate.on_poll(&sensor).await.unwrap();
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("sump-1".to_string(), true),
            Event::State("sump-1".to_string(), false),
        ]
    );

    // 900 -> online, on
    r.aggregate.on_poll(&sensor).await.unwrap();
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("sump-1".to_string(), true),
            Event::State("sump-1".to_string(), true),
        ]
    );

    // 900 again -> unchanged, nothing published
    r.aggregate.on_poll(&sensor).await.unwrap();
    assert!(r.publisher.take().is_empty());

    r.correlator.stop().await;
}

#[tokio::test]
async fn digital_poll_debounces_and_inverts() {
    let values = Mutex::new(VecDeque::from(vec!["0", "0", "1"]));
    let mut r = rig(move |cmd| {
        if cmd.starts_with('R') {
            values.lock().unwrap().pop_front().map(str::to_string)
        } else {
            None
        }
    })
    .await;
    let sensor = digital_sensor(7, true);

    r.aggregate.on_connect(&sensor).await.unwrap();
    assert_eq!(r.seen.recv().await.unwrap(), "C0001M07P");
    assert_eq!(
        r.publisher.take(),
        vec![Event::Status("door-1".to_string(), true)]
    );

    // Raw 0, inverted -> apparent on
    r.aggregate.on_poll(&sensor).await.unwrap();
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("door-1".to_string(), true),
            Event::State("door-1".to_string(), true),
        ]
    );

    // Same raw value -> debounced
    r.aggregate.on_poll(&sensor).await.unwrap();
    assert!(r.publisher.take().is_empty());

    // Raw 1, inverted -> apparent off
    r.aggregate.on_poll(&sensor).await.unwrap();
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("door-1".to_string(), true),
            Event::State("door-1".to_string(), false),
        ]
    );

    r.correlator.stop().await;
}

#[tokio::test]
async fn switch_set_state_is_silent_when_unchanged() {
    let mut r = rig(|_| None).await;
    let sensor = switch_sensor(5, false, false);

    r.aggregate.on_connect(&sensor).await.unwrap();
    r.seen.recv().await.unwrap(); // M05O
    r.seen.recv().await.unwrap(); // W050
    r.publisher.take();

    // Already off: no hardware write, no publish.
    r.aggregate.on_set_state(&sensor, false).await.unwrap();
    assert!(r.publisher.take().is_empty());

    // Turn on: one write, apparent state published.
    r.aggregate.on_set_state(&sensor, true).await.unwrap();
    assert_eq!(r.seen.recv().await.unwrap(), "C0003W051");
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("relay-1".to_string(), true),
            Event::State("relay-1".to_string(), true),
        ]
    );

    // No further frames were sent for the silent no-op.
    assert!(r.seen.try_recv().is_err());

    r.correlator.stop().await;
}

#[tokio::test]
async fn switch_poll_is_a_no_op() {
    let mut r = rig(|_| None).await;
    let sensor = switch_sensor(5, false, true);

    r.aggregate.on_connect(&sensor).await.unwrap();
    r.seen.recv().await.unwrap();
    r.seen.recv().await.unwrap();
    r.publisher.take();

    r.aggregate.on_poll(&sensor).await.unwrap();
    assert!(r.publisher.take().is_empty());
    assert!(r.seen.try_recv().is_err());

    r.correlator.stop().await;
}

#[tokio::test]
async fn republish_reads_cache_not_hardware() {
    let mut r = rig(analog_script(vec!["900"])).await;
    let sensor = analog_sensor(3);

    // Nothing cached yet: republish emits nothing.
    r.aggregate.on_publish(&sensor);
    assert!(r.publisher.take().is_empty());

    r.aggregate.on_connect(&sensor).await.unwrap();
    r.aggregate.on_poll(&sensor).await.unwrap();
    r.publisher.take();
    while r.seen.try_recv().is_ok() {}

    // Republish mirrors the cached classification without new reads.
    r.aggregate.on_publish(&sensor);
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("sump-1".to_string(), true),
            Event::State("sump-1".to_string(), true),
        ]
    );
    assert!(r.seen.try_recv().is_err());

    r.correlator.stop().await;
}

#[tokio::test]
async fn inverted_switch_republish_uninverts_cached_value() {
    let mut r = rig(|_| None).await;
    let sensor = switch_sensor(5, true, false);

    r.aggregate.on_connect(&sensor).await.unwrap();
    r.seen.recv().await.unwrap();
    r.seen.recv().await.unwrap();
    r.publisher.take();

    // Cache holds physical true; apparent state is false.
    r.aggregate.on_publish(&sensor);
    assert_eq!(
        r.publisher.take(),
        vec![
            Event::Status("relay-1".to_string(), true),
            Event::State("relay-1".to_string(), false),
        ]
    );

    r.correlator.stop().await;
}

#[tokio::test]
async fn non_switch_sensors_ignore_external_state() {
    let mut r = rig(|_| None).await;
    let sensor = digital_sensor(7, false);

    r.aggregate.on_set_state(&sensor, true).await.unwrap();
    assert!(r.publisher.take().is_empty());
    assert!(r.seen.try_recv().is_err());

    r.correlator.stop().await;
}
