//! Correlation envelope around command and reply lines.
//!
//! Outbound: `C<4-digit zero-padded id><command-text>`. Inbound:
//! `C<4-digit id><result-text>`. The id is decoded by stripping leading
//! zeros, so `C0000...` and a malformed empty id field both decode to id 0,
//! which is never assigned by the sender and therefore never matches a
//! pending call.

use crate::command::Command;
use pindock_core::constants::{COMMAND_ID_WIDTH, FRAME_PREFIX};

/// An outbound command wrapped in its correlation envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub id: u16,
    pub command: Command,
}

impl CommandFrame {
    #[must_use]
    pub fn new(id: u16, command: Command) -> Self {
        Self { id, command }
    }

    /// Encode to the wire line, without the terminator.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{:0width$}{}",
            FRAME_PREFIX,
            self.id,
            self.command.wire_text(),
            width = COMMAND_ID_WIDTH
        )
    }
}

/// An inbound reply line, already stripped of its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    pub id: u16,
    pub result: String,
}

impl ReplyFrame {
    /// Parse one inbound line.
    ///
    /// Returns `None` for anything not shaped like `C<4 digits><rest>` -
    /// such lines are protocol noise and are discarded by the receive loop,
    /// not treated as errors.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix(FRAME_PREFIX)?;

        if rest.len() < COMMAND_ID_WIDTH {
            return None;
        }

        let (id_text, result) = rest.split_at(COMMAND_ID_WIDTH);

        if !id_text.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        // Leading zeros are stripped before parsing; an all-zero field
        // decodes to 0, the never-assigned id.
        let id = id_text.trim_start_matches('0').parse::<u16>().unwrap_or(0);

        Some(ReplyFrame {
            id,
            result: result.to_string(),
        })
    }
}
