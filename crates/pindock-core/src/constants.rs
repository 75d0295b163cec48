//! Core constants for the pin-link wire protocol and gateway timing.
//!
//! This module defines the protocol-level constants used throughout the
//! pindock gateway. The wire protocol is ASCII and line oriented: every
//! command and every reply is one newline-terminated line wrapped in a
//! correlation envelope.
//!
//! # Frame Structure
//!
//! ```text
//! C<IIII><command-text>\n
//! ```
//!
//! Where:
//! - `C` - Envelope prefix marking a correlated frame
//! - `IIII` - Correlation id (0001-9999, zero-padded)
//! - `command-text` - Opcode character, optional 2-digit pin, optional payload
//! - `\n` - Line terminator (a preceding `\r` is tolerated on receive)
//!
//! # Examples
//!
//! ```
//! use pindock_core::constants::*;
//!
//! // A digital write of `true` on pin 5 with correlation id 1:
//! let line = format!(
//!     "{}{:0width$}W051",
//!     FRAME_PREFIX,
//!     1,
//!     width = COMMAND_ID_WIDTH
//! );
//! assert_eq!(line, "C0001W051");
//! ```

// ============================================================================
// Frame Envelope
// ============================================================================

/// Envelope prefix for correlated frames.
///
/// Every outbound command line and every inbound reply line starts with this
/// character. Inbound lines that do not are discarded as protocol noise.
pub const FRAME_PREFIX: char = 'C';

/// Width of the zero-padded correlation id field.
pub const COMMAND_ID_WIDTH: usize = 4;

/// Lowest correlation id ever assigned.
pub const MIN_COMMAND_ID: u16 = 1;

/// Highest correlation id; the counter wraps back to [`MIN_COMMAND_ID`].
///
/// Id 0 is never assigned by the sender. It is, however, the decoded value
/// of an all-zero or empty id field, so a reply carrying id 0 can never
/// match a pending call and is silently dropped.
pub const MAX_COMMAND_ID: u16 = 9999;

// ============================================================================
// Pins and Readings
// ============================================================================

/// Width of the zero-padded pin field in command text.
pub const PIN_WIDTH: usize = 2;

/// Highest addressable pin (two wire digits).
pub const MAX_PIN: u8 = 99;

/// Highest raw value an analog read may report (10-bit ADC).
pub const ANALOG_MAX: u16 = 1023;

/// Exact reply text expected for a keepalive round trip.
///
/// Any other reply is a protocol violation.
pub const KEEPALIVE_ECHO: &str = "N";

// ============================================================================
// Timing
// ============================================================================

/// How long a reply-expecting command waits for its result (milliseconds).
///
/// On expiry the call resolves to an absent result; the pending entry is
/// always removed. Whether absence is fatal depends on the caller: during
/// the identify handshake it is, during polling it only skips the cycle.
///
/// # Value: 5000ms (5 seconds)
pub const RESULT_TIMEOUT_MS: u64 = 5000;

/// Period of the per-connection poll loop (milliseconds).
///
/// Each tick issues one keepalive probe followed by one concurrent poll
/// step across all bound sensors.
pub const POLL_INTERVAL_MS: u64 = 500;

/// Period of the outbound publish tick (milliseconds).
pub const PUBLISH_TICK_MS: u64 = 50;

/// Maximum number of fresh messages drained per publish tick.
pub const PUBLISH_BATCH_SIZE: usize = 10;

/// Delay between broker reconnect attempts (seconds).
///
/// Broker unavailability is never fatal; reconnection is retried on this
/// fixed interval indefinitely.
pub const BROKER_RETRY_SECS: u64 = 1;

/// Period of the full pin-state resync broadcast (seconds).
///
/// Every tick re-emits the cached state and status of every bound sensor
/// on every connection, without touching hardware.
pub const PIN_STATE_RESYNC_SECS: u64 = 5;
