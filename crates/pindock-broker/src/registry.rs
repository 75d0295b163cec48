//! Registry of live device connections.
//!
//! The bridge never calls into a connection directly: each connection is
//! registered as a [`ConnectionHandle`] carrying an mpsc sender, and
//! operations travel as [`ConnectionCommand`]s consumed by the connection's
//! own task. A closed channel (a connection mid-shutdown) is logged and
//! skipped; one faulty connection can never abort delivery to others.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use pindock_core::{DeviceAddr, Error, Result, SensorId};

/// An operation routed to a connection from the broker side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Re-emit cached state/status for every bound sensor.
    PublishPinStates,
    /// Apply externally driven state to a bound switch.
    SetSwitchState { sensor_id: SensorId, state: bool },
}

/// Registered identity of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub device_id: DeviceAddr,
    pub connected_at: DateTime<Utc>,
    commands: mpsc::UnboundedSender<ConnectionCommand>,
}

impl ConnectionHandle {
    #[must_use]
    pub fn new(
        device_id: DeviceAddr,
        commands: mpsc::UnboundedSender<ConnectionCommand>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id,
            connected_at: Utc::now(),
            commands,
        }
    }

    /// Send a command to the connection; false if its channel is closed.
    pub fn send(&self, command: ConnectionCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// Shared uuid-keyed map of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<Uuid, ConnectionHandle>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    ///
    /// # Errors
    /// Returns `Error::Config` if the uuid is already registered.
    pub fn add(&self, handle: ConnectionHandle) -> Result<()> {
        let mut connections = self.connections.lock().expect("registry lock poisoned");

        if connections.contains_key(&handle.id) {
            return Err(Error::Config(format!(
                "connection {} already registered",
                handle.id
            )));
        }

        debug!(connection = %handle.id, device = %handle.device_id, "connection registered");
        connections.insert(handle.id, handle);
        Ok(())
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn remove(&self, id: Uuid) {
        if self
            .connections
            .lock()
            .expect("registry lock poisoned")
            .remove(&id)
            .is_some()
        {
            debug!(connection = %id, "connection unregistered");
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections
            .lock()
            .expect("registry lock poisoned")
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send a command to the connection owning `device`, if one is live.
    ///
    /// Returns false when no connection owns the device or its channel is
    /// closed.
    pub fn send_to_device(&self, device: &DeviceAddr, command: ConnectionCommand) -> bool {
        let handle = {
            let connections = self.connections.lock().expect("registry lock poisoned");
            connections
                .values()
                .find(|h| h.device_id == *device)
                .cloned()
        };

        match handle {
            Some(handle) => {
                let delivered = handle.send(command);
                if !delivered {
                    warn!(connection = %handle.id, device = %device, "command channel closed");
                }
                delivered
            }
            None => false,
        }
    }

    /// Send a command to every live connection, isolating failures.
    pub fn broadcast(&self, command: &ConnectionCommand) {
        let handles: Vec<ConnectionHandle> = {
            let connections = self.connections.lock().expect("registry lock poisoned");
            connections.values().cloned().collect()
        };

        for handle in handles {
            if !handle.send(command.clone()) {
                warn!(connection = %handle.id, "broadcast skipped closed connection");
            }
        }
    }
}
