//! One device's full lifecycle.
//!
//! A connection owns the correlator over its TCP stream, the identify
//! handshake, the sensors bound to the identified device, and the poll
//! loop. Broker-side operations arrive over the command channel registered
//! with the connection registry; the poll loop and the command stream are
//! one task, selected together with the cancellation token.
//!
//! # Lifecycle
//!
//! `Created → Running → Canceled → Stopped`, one-way. `start` while Running
//! is a no-op; `start` from a terminal state fails; `stop` is idempotent.
//! A handshake failure aborts startup before anything is registered.
//!
//! # Failure containment
//!
//! Transport and protocol errors terminate this connection only: the
//! registry entry is removed, the socket is shut down best-effort, and the
//! process keeps serving every other device.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use pindock_broker::{ConnectionCommand, ConnectionHandle, MqttBridge};
use pindock_core::constants::POLL_INTERVAL_MS;
use pindock_core::{DeviceAddr, Error, RunState};
use pindock_link::{Correlator, DeviceProxy, LinkError};
use pindock_sensors::{AggregateHandler, Sensor, StatePublisher};

/// One device connection.
pub struct Connection {
    bridge: Arc<MqttBridge>,
    correlator: Arc<Correlator>,
    proxy: DeviceProxy,
    token: CancellationToken,
    state: Mutex<RunState>,
    run_task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Wrap a freshly accepted device stream.
    ///
    /// `shutdown` is the process-wide cancellation token; the connection
    /// derives a child token from it, so external shutdown, an internal
    /// fault, and an explicit [`Self::stop`] all converge on the same
    /// cancellation path.
    #[must_use]
    pub fn new(stream: TcpStream, bridge: Arc<MqttBridge>, shutdown: &CancellationToken) -> Self {
        let token = shutdown.child_token();
        let correlator = Arc::new(Correlator::new(stream, token.clone()));
        let proxy = DeviceProxy::new(Arc::clone(&correlator));

        Self {
            bridge,
            correlator,
            proxy,
            token,
            state: Mutex::new(RunState::Created),
            run_task: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Bring the connection up: correlator, identify handshake, sensor
    /// binding, registry entry, run task.
    ///
    /// No-op while already Running.
    ///
    /// # Errors
    /// `Error::InvalidStateTransition` (as `LinkError::Core`) from a
    /// terminal state; any handshake failure aborts startup with nothing
    /// registered.
    pub async fn start(self: &Arc<Self>) -> Result<(), LinkError> {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            match *state {
                RunState::Running => return Ok(()),
                RunState::Canceled | RunState::Stopped => {
                    return Err(Error::InvalidStateTransition {
                        from: state.to_string(),
                        to: RunState::Running.to_string(),
                    }
                    .into());
                }
                RunState::Created => *state = RunState::Running,
            }
        }

        if let Err(e) = self.handshake().await {
            self.correlator.stop().await;
            *self.state.lock().expect("state lock poisoned") = RunState::Stopped;
            return Err(e);
        }

        Ok(())
    }

    async fn handshake(self: &Arc<Self>) -> Result<(), LinkError> {
        self.correlator.start()?;

        let device = self.proxy.identify().await?;
        let sensors: Arc<[Sensor]> = self.bridge.sensors_for(&device).into();
        info!(device = %device, sensors = sensors.len(), "device identified");

        let aggregate = AggregateHandler::new(
            self.proxy.clone(),
            Arc::clone(&self.bridge) as Arc<dyn StatePublisher>,
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(device.clone(), commands_tx);
        let id = handle.id;
        self.bridge.registry().add(handle)?;

        let connection = Arc::clone(self);
        let task = tokio::spawn(async move {
            connection.run(id, device, sensors, aggregate, commands_rx).await;
        });
        *self.run_task.lock().expect("task lock poisoned") = Some(task);

        Ok(())
    }

    /// Cancel the run task, join it, and finalize to Stopped.
    ///
    /// Safe to call repeatedly and concurrently.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            if *state == RunState::Running {
                *state = RunState::Canceled;
            }
        }

        self.token.cancel();

        let task = self.run_task.lock().expect("task lock poisoned").take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("error joining connection task: {e}");
            }
        }

        self.correlator.stop().await;
        *self.state.lock().expect("state lock poisoned") = RunState::Stopped;
    }

    async fn run(
        self: Arc<Self>,
        id: Uuid,
        device: DeviceAddr,
        sensors: Arc<[Sensor]>,
        aggregate: AggregateHandler,
        mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
    ) {
        if let Err(e) = self.drive(&sensors, &aggregate, &mut commands).await {
            error!(device = %device, "connection failed: {e}");
        }

        self.bridge.registry().remove(id);
        self.correlator.stop().await;
        *self.state.lock().expect("state lock poisoned") = RunState::Stopped;
        info!(device = %device, "device disconnected");
    }

    /// The connection's main loop: connect-time init once, then poll ticks
    /// interleaved with broker-side commands until cancellation or failure.
    async fn drive(
        &self,
        sensors: &[Sensor],
        aggregate: &AggregateHandler,
        commands: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
    ) -> Result<(), LinkError> {
        for sensor in sensors {
            aggregate.on_connect(sensor).await?;
        }

        let mut poll = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => return Ok(()),
                command = commands.recv() => match command {
                    Some(ConnectionCommand::PublishPinStates) => {
                        for sensor in sensors {
                            aggregate.on_publish(sensor);
                        }
                    }
                    Some(ConnectionCommand::SetSwitchState { sensor_id, state }) => {
                        if let Some(sensor) = sensors.iter().find(|s| s.id == sensor_id) {
                            aggregate.on_set_state(sensor, state).await?;
                        } else {
                            debug!(sensor = %sensor_id, "set request for unbound sensor");
                        }
                    }
                    None => return Ok(()),
                },
                _ = poll.tick() => {
                    if self.correlator.state() != RunState::Running {
                        debug!("transport closed, stopping");
                        return Ok(());
                    }

                    // A probe that got no reply skips this cycle; a dead
                    // transport surfaces as an error on the next write.
                    if !self.proxy.keepalive().await? {
                        warn!("keepalive got no reply, skipping poll cycle");
                        continue;
                    }

                    let results = join_all(sensors.iter().map(|s| aggregate.on_poll(s))).await;
                    for result in results {
                        result?;
                    }
                }
            }
        }
    }
}
