//! The broker client loop.
//!
//! One task owns the rumqttc event loop plus the outbound publish tick and
//! the periodic pin-state resync broadcast. Connection state is tracked
//! from protocol events: on ConnAck the bridge re-subscribes, republishes
//! discovery, and resumes flushing the outbound queue; on a connection
//! error it marks itself disconnected and retries after a fixed delay,
//! forever. Nothing here ever propagates a failure to a device connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use pindock_core::DeviceAddr;
use pindock_core::constants::{BROKER_RETRY_SECS, PIN_STATE_RESYNC_SECS, PUBLISH_TICK_MS};
use pindock_sensors::{Sensor, StatePublisher};

use crate::discovery::discovery_message;
use crate::outbound::{OutboundMessage, OutboundQueue};
use crate::registry::{ConnectionCommand, ConnectionRegistry};
use crate::topics;

/// Broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Prefix of the home-automation discovery convention
    /// (typically `homeassistant`).
    pub base_discovery_topic: String,
    /// Prefix under which this gateway owns its sensor topics.
    pub base_control_topic: String,
}

/// The gateway's side of the broker boundary.
///
/// Shared by every device connection: handlers publish through it (the
/// [`StatePublisher`] impl enqueues onto the outbound queue) and inbound
/// `set` requests are routed back through the connection registry.
pub struct MqttBridge {
    client: AsyncClient,
    settings: BrokerSettings,
    sensors: Arc<[Sensor]>,
    registry: Arc<ConnectionRegistry>,
    queue: Arc<OutboundQueue>,
    connected: AtomicBool,
}

impl MqttBridge {
    /// Build the bridge and the event loop that [`Self::run`] must drive.
    #[must_use]
    pub fn new(settings: BrokerSettings, sensors: Vec<Sensor>) -> (Arc<Self>, EventLoop) {
        let mut options = MqttOptions::new(
            settings.client_id.clone(),
            settings.host.clone(),
            settings.port,
        );
        options.set_clean_session(true);
        options.set_keep_alive(Duration::from_secs(5));

        let (client, eventloop) = AsyncClient::new(options, 64);

        let bridge = Arc::new(Self {
            client,
            settings,
            sensors: sensors.into(),
            registry: Arc::new(ConnectionRegistry::new()),
            queue: Arc::new(OutboundQueue::new()),
            connected: AtomicBool::new(false),
        });

        (bridge, eventloop)
    }

    /// The shared connection registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// All configured sensors bound to `device`.
    #[must_use]
    pub fn sensors_for(&self, device: &DeviceAddr) -> Vec<Sensor> {
        self.sensors
            .iter()
            .filter(|s| s.device_id == *device)
            .cloned()
            .collect()
    }

    /// Whether the broker link is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Drive the bridge until cancellation.
    pub async fn run(self: Arc<Self>, mut eventloop: EventLoop, token: CancellationToken) {
        let mut publish_tick =
            tokio::time::interval(Duration::from_millis(PUBLISH_TICK_MS));
        let mut resync_tick =
            tokio::time::interval(Duration::from_secs(PIN_STATE_RESYNC_SECS));

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("broker bridge shutting down");
                    let _ = self.client.try_disconnect();
                    break;
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => self.on_connected().await,
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.on_message(&publish.topic, &publish.payload).await;
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        self.connected.store(false, Ordering::Release);
                        warn!("broker requested disconnect");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if self.connected.swap(false, Ordering::AcqRel) {
                            warn!("broker connection lost: {e}");
                        } else {
                            debug!("broker connect attempt failed: {e}");
                        }
                        tokio::time::sleep(Duration::from_secs(BROKER_RETRY_SECS)).await;
                    }
                },
                _ = publish_tick.tick() => self.flush_outbound().await,
                _ = resync_tick.tick() => {
                    if self.is_connected() {
                        self.registry.broadcast(&ConnectionCommand::PublishPinStates);
                    }
                }
            }
        }
    }

    /// Connected: re-subscribe and republish discovery. Subscriptions do
    /// not survive the clean-session reconnect, so both happen on every
    /// ConnAck.
    async fn on_connected(&self) {
        info!(host = %self.settings.host, "connected to broker");
        self.connected.store(true, Ordering::Release);

        let status = topics::discovery_status_topic(&self.settings.base_discovery_topic);
        let sets = topics::set_subscription(&self.settings.base_control_topic);

        for topic in [status, sets] {
            if let Err(e) = self.client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                warn!(topic, "subscribe failed: {e}");
            }
        }

        self.publish_discovery();
    }

    /// Route one inbound message.
    async fn on_message(&self, topic: &str, payload: &[u8]) {
        if topic == topics::discovery_status_topic(&self.settings.base_discovery_topic) {
            if payload == topics::STATUS_ONLINE.as_bytes() {
                info!("home-automation layer came online, republishing discovery");
                self.publish_discovery();
            }
            return;
        }

        let Some(sensor_id) = topics::parse_set_topic(topic, &self.settings.base_control_topic)
        else {
            trace!(topic, "ignoring unrelated message");
            return;
        };

        let Some(sensor) = self.sensors.iter().find(|s| s.id.as_str() == sensor_id) else {
            debug!(sensor = sensor_id, "set request for unknown sensor");
            return;
        };

        let state = payload == topics::STATE_ON.as_bytes();
        let command = ConnectionCommand::SetSwitchState {
            sensor_id: sensor.id.clone(),
            state,
        };

        if !self.registry.send_to_device(&sensor.device_id, command) {
            debug!(sensor = sensor_id, device = %sensor.device_id, "set request for offline device");
        }
    }

    /// Enqueue discovery config for every configured sensor.
    fn publish_discovery(&self) {
        for sensor in self.sensors.iter() {
            self.queue.enqueue(discovery_message(
                &self.settings.base_discovery_topic,
                &self.settings.base_control_topic,
                sensor,
            ));
        }
    }

    /// One publish tick: push the current batch, confirm on success.
    ///
    /// A failed publish leaves the batch pending; the next tick resends it
    /// in full. Duplicate delivery is preferred over loss.
    async fn flush_outbound(&self) {
        if !self.is_connected() {
            return;
        }

        let batch = self.queue.next_batch();
        if batch.is_empty() {
            return;
        }

        for message in &batch {
            if let Err(e) = self
                .client
                .publish(
                    message.topic.clone(),
                    QoS::AtMostOnce,
                    message.retain,
                    message.payload.clone(),
                )
                .await
            {
                warn!(topic = %message.topic, "publish failed, batch kept for resend: {e}");
                return;
            }
        }

        self.queue.mark_delivered();
        trace!(count = batch.len(), "batch published");
    }
}

impl StatePublisher for MqttBridge {
    fn publish_state(&self, sensor: &Sensor, state: bool) {
        let payload = if state { topics::STATE_ON } else { topics::STATE_OFF };
        self.queue.enqueue(OutboundMessage::new(
            topics::state_topic(&self.settings.base_control_topic, &sensor.id),
            payload,
        ));
    }

    fn publish_status(&self, sensor: &Sensor, online: bool) {
        let payload = if online { topics::STATUS_ONLINE } else { topics::STATUS_OFFLINE };
        self.queue.enqueue(OutboundMessage::new(
            topics::status_topic(&self.settings.base_control_topic, &sensor.id),
            payload,
        ));
    }
}
