//! Typed commands of the pin-link protocol.
//!
//! A [`Command`] is an immutable tagged variant over the small, fixed
//! vocabulary the devices understand. Its wire form is one ASCII fragment:
//! the opcode character, then (for pin commands) a two-digit zero-padded
//! pin, then an optional payload character. The correlation envelope and the
//! line terminator are added by [`CommandFrame`](crate::frame::CommandFrame)
//! and [`LinkCodec`](crate::codec::LinkCodec); every command is framed the
//! same way, including `Identify` and `Keepalive`.
//!
//! # Wire Examples
//!
//! ```
//! use pindock_core::Pin;
//! use pindock_protocol::Command;
//!
//! let write = Command::DigitalWrite { pin: Pin::new(5).unwrap(), value: true };
//! assert_eq!(write.wire_text(), "W051");
//!
//! let read = Command::AnalogRead { pin: Pin::new(3).unwrap() };
//! assert_eq!(read.wire_text(), "A03");
//!
//! assert_eq!(Command::Keepalive.wire_text(), "N");
//! ```

use pindock_core::Pin;
use std::fmt;

/// Pin direction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    InputPullup,
    Output,
}

impl PinMode {
    /// Wire character for this mode.
    #[must_use]
    pub fn wire_char(&self) -> char {
        match self {
            PinMode::Input => 'I',
            PinMode::InputPullup => 'P',
            PinMode::Output => 'O',
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            PinMode::Input => "Input",
            PinMode::InputPullup => "InputPullup",
            PinMode::Output => "Output",
        };
        write!(f, "{s}")
    }
}

/// One command of the device vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Configure pin direction. Fire-and-forget.
    PinMode { pin: Pin, mode: PinMode },
    /// Read a digital pin. Reply: `0` or `1`.
    DigitalRead { pin: Pin },
    /// Write a digital pin. Fire-and-forget.
    DigitalWrite { pin: Pin, value: bool },
    /// Read an analog pin. Reply: `0`-`1023`.
    AnalogRead { pin: Pin },
    /// Ask the device for its identity. Reply: MAC-style address.
    Identify,
    /// Liveness probe. Reply: the fixed `N` echo.
    Keepalive,
}

impl Command {
    /// Opcode character for this command.
    #[must_use]
    pub fn opcode(&self) -> char {
        match self {
            Command::PinMode { .. } => 'M',
            Command::DigitalRead { .. } => 'R',
            Command::DigitalWrite { .. } => 'W',
            Command::AnalogRead { .. } => 'A',
            Command::Identify => 'I',
            Command::Keepalive => 'N',
        }
    }

    /// The pin this command addresses, if any.
    ///
    /// `Identify` and `Keepalive` are device-level and carry no pin field.
    #[must_use]
    pub fn pin(&self) -> Option<Pin> {
        match self {
            Command::PinMode { pin, .. }
            | Command::DigitalRead { pin }
            | Command::DigitalWrite { pin, .. }
            | Command::AnalogRead { pin } => Some(*pin),
            Command::Identify | Command::Keepalive => None,
        }
    }

    /// Whether the device answers this command with a correlated reply.
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Command::DigitalRead { .. }
                | Command::AnalogRead { .. }
                | Command::Identify
                | Command::Keepalive
        )
    }

    /// Serialize to the wire fragment: opcode, pin, payload.
    ///
    /// The correlation envelope and line terminator are not included.
    #[must_use]
    pub fn wire_text(&self) -> String {
        let mut text = String::new();
        text.push(self.opcode());

        if let Some(pin) = self.pin() {
            text.push_str(&pin.to_string());
        }

        match self {
            Command::PinMode { mode, .. } => text.push(mode.wire_char()),
            Command::DigitalWrite { value, .. } => text.push(if *value { '1' } else { '0' }),
            _ => {}
        }

        text
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.wire_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pin(n: u8) -> Pin {
        Pin::new(n).unwrap()
    }

    #[test]
    fn digital_write_true_on_pin_5() {
        let cmd = Command::DigitalWrite { pin: pin(5), value: true };
        assert_eq!(cmd.wire_text(), "W051");
    }

    #[test]
    fn digital_write_false_on_pin_5() {
        let cmd = Command::DigitalWrite { pin: pin(5), value: false };
        assert_eq!(cmd.wire_text(), "W050");
    }

    #[test]
    fn analog_read_on_pin_3() {
        let cmd = Command::AnalogRead { pin: pin(3) };
        assert_eq!(cmd.wire_text(), "A03");
    }

    #[test]
    fn keepalive_is_bare_opcode() {
        assert_eq!(Command::Keepalive.wire_text(), "N");
    }

    #[test]
    fn identify_is_bare_opcode() {
        assert_eq!(Command::Identify.wire_text(), "I");
    }

    #[rstest]
    #[case(PinMode::Input, "M07I")]
    #[case(PinMode::InputPullup, "M07P")]
    #[case(PinMode::Output, "M07O")]
    fn pin_mode_payload_chars(#[case] mode: PinMode, #[case] expected: &str) {
        let cmd = Command::PinMode { pin: pin(7), mode };
        assert_eq!(cmd.wire_text(), expected);
    }

    #[test]
    fn reply_expectations() {
        assert!(Command::DigitalRead { pin: pin(1) }.expects_reply());
        assert!(Command::AnalogRead { pin: pin(1) }.expects_reply());
        assert!(Command::Identify.expects_reply());
        assert!(Command::Keepalive.expects_reply());
        assert!(!Command::DigitalWrite { pin: pin(1), value: true }.expects_reply());
        assert!(!Command::PinMode { pin: pin(1), mode: PinMode::Output }.expects_reply());
    }
}
