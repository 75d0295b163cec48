//! Typed device operations and their reply-validation rules.
//!
//! The proxy owns every judgment about what a reply may look like; the
//! correlator below it only moves lines. Validation failures are
//! [`LinkError::Protocol`] and are distinct from timeouts: a missing reply
//! surfaces as an absent result (`Ok(None)` / `Ok(false)`), which the caller
//! treats as a failed read for that cycle without tearing the connection
//! down. The one exception is [`DeviceProxy::identify`], where a timeout is
//! an error because no connection exists yet.

use std::sync::Arc;

use tracing::trace;

use pindock_core::constants::{ANALOG_MAX, KEEPALIVE_ECHO};
use pindock_core::{DeviceAddr, Pin};
use pindock_protocol::{Command, PinMode};

use crate::correlator::Correlator;
use crate::error::LinkError;

/// Typed command surface of one device.
///
/// Cheap to clone; all clones share the same correlator, so calls issued
/// from independent logical flows still observe one-at-a-time wire framing.
#[derive(Clone)]
pub struct DeviceProxy {
    correlator: Arc<Correlator>,
}

impl DeviceProxy {
    #[must_use]
    pub fn new(correlator: Arc<Correlator>) -> Self {
        Self { correlator }
    }

    /// Ask the device for its identity.
    ///
    /// # Errors
    /// `LinkError::HandshakeTimeout` if no reply arrives in the result
    /// window; `LinkError::Protocol` if the reply is not a MAC-style
    /// address.
    pub async fn identify(&self) -> Result<DeviceAddr, LinkError> {
        let raw = self
            .correlator
            .send(Command::Identify)
            .await?
            .ok_or(LinkError::HandshakeTimeout)?;

        DeviceAddr::new(&raw)
            .map_err(|_| LinkError::Protocol(format!("Invalid identify reply: {raw}")))
    }

    /// Read an analog pin. `Ok(None)` means the reply window expired.
    ///
    /// # Errors
    /// `LinkError::Protocol` if the reply does not parse as an integer in
    /// 0..=1023.
    pub async fn analog_read(&self, pin: Pin) -> Result<Option<u16>, LinkError> {
        let Some(raw) = self.correlator.send(Command::AnalogRead { pin }).await? else {
            return Ok(None);
        };

        match raw.parse::<u16>() {
            Ok(value) if value <= ANALOG_MAX => Ok(Some(value)),
            _ => Err(LinkError::Protocol(format!(
                "Invalid analog read result: {raw}"
            ))),
        }
    }

    /// Read a digital pin. `Ok(None)` means the reply window expired.
    ///
    /// # Errors
    /// `LinkError::Protocol` if the reply is neither `0` nor `1`.
    pub async fn digital_read(&self, pin: Pin) -> Result<Option<bool>, LinkError> {
        let Some(raw) = self.correlator.send(Command::DigitalRead { pin }).await? else {
            return Ok(None);
        };

        match raw.parse::<u8>() {
            Ok(value) if value <= 1 => Ok(Some(value == 1)),
            _ => Err(LinkError::Protocol(format!(
                "Invalid digital read result: {raw}"
            ))),
        }
    }

    /// Write a digital pin. Fire-and-forget.
    pub async fn digital_write(&self, pin: Pin, value: bool) -> Result<(), LinkError> {
        self.correlator
            .send(Command::DigitalWrite { pin, value })
            .await?;
        Ok(())
    }

    /// Configure pin direction.
    ///
    /// An Output pin is deterministically driven low right after, so a
    /// freshly configured output never floats at whatever the bootloader
    /// left behind. Use [`Self::set_pin_mode_with_state`] to choose the
    /// initial level instead.
    pub async fn set_pin_mode(&self, pin: Pin, mode: PinMode) -> Result<(), LinkError> {
        self.correlator.send(Command::PinMode { pin, mode }).await?;

        if mode == PinMode::Output {
            self.digital_write(pin, false).await?;
        }

        Ok(())
    }

    /// Configure an Output pin with an explicit initial level.
    ///
    /// # Errors
    /// `LinkError::Protocol` if `mode` is not `Output`.
    pub async fn set_pin_mode_with_state(
        &self,
        pin: Pin,
        mode: PinMode,
        state: bool,
    ) -> Result<(), LinkError> {
        if mode != PinMode::Output {
            return Err(LinkError::Protocol(format!(
                "Cannot set initial state for pin mode {mode}"
            )));
        }

        self.correlator.send(Command::PinMode { pin, mode }).await?;
        self.digital_write(pin, state).await
    }

    /// Liveness probe. `Ok(true)` on the fixed echo, `Ok(false)` if the
    /// reply window expired.
    ///
    /// # Errors
    /// `LinkError::Protocol` on any reply other than the echo token.
    pub async fn keepalive(&self) -> Result<bool, LinkError> {
        match self.correlator.send(Command::Keepalive).await? {
            Some(raw) if raw == KEEPALIVE_ECHO => {
                trace!("keepalive echo");
                Ok(true)
            }
            Some(raw) => Err(LinkError::Protocol(format!("Invalid keepalive result: {raw}"))),
            None => Ok(false),
        }
    }
}
