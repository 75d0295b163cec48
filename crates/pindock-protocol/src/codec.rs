//! Tokio codec for pin-link line framing.
//!
//! `LinkCodec` integrates the pin-link protocol with async TCP I/O by
//! implementing the tokio-util [`Decoder`] and [`Encoder`] traits:
//!
//! ```text
//! TCP stream -> Decoder -> ReplyFrame (correlated reply)
//! CommandFrame -> Encoder -> TCP stream (newline-terminated line)
//! ```
//!
//! The device link is best-effort line-buffered ASCII. On decode, the codec
//! splits on `\n`, tolerates a preceding `\r`, and silently discards any
//! line that does not parse as a reply frame - flaky microcontroller links
//! emit boot banners and debug noise, and noise must never kill the
//! connection. The only decode error is an unterminated line exceeding
//! [`MAX_LINE_LENGTH`], which indicates a peer that is not speaking the
//! protocol at all.
//!
//! # Usage
//!
//! ```no_run
//! use tokio::net::TcpStream;
//! use tokio_util::codec::{FramedRead, FramedWrite};
//! use pindock_protocol::LinkCodec;
//!
//! # async fn example() -> pindock_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:9000").await?;
//! let (read, write) = stream.into_split();
//! let replies = FramedRead::new(read, LinkCodec::new());
//! let commands = FramedWrite::new(write, LinkCodec::new());
//! # Ok(())
//! # }
//! ```

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{CommandFrame, ReplyFrame};
use pindock_core::{Error, Result};

/// Maximum accepted length of a single unterminated line in bytes.
///
/// Legitimate reply lines are tens of bytes; this bound only protects
/// against a peer streaming garbage without newlines.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Line codec for the pin-link protocol.
#[derive(Debug, Default)]
pub struct LinkCodec;

impl LinkCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for LinkCodec {
    type Item = ReplyFrame;
    type Error = Error;

    /// Extract the next reply frame from the byte stream.
    ///
    /// Consumes complete lines until one parses as a reply frame. Lines
    /// that do not are protocol noise and are dropped without error.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` if the peer accumulates more than
    /// [`MAX_LINE_LENGTH`] bytes without a line terminator.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let Some(newline) = src.iter().position(|&b| b == b'\n') else {
                if src.len() > MAX_LINE_LENGTH {
                    return Err(Error::InvalidFrame(format!(
                        "line exceeds {MAX_LINE_LENGTH} bytes without terminator"
                    )));
                }
                return Ok(None);
            };

            let line = src.split_to(newline + 1);
            let line = &line[..newline];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            let Ok(text) = std::str::from_utf8(line) else {
                // Non-UTF8 bytes on a nominally-ASCII link: noise.
                continue;
            };

            if let Some(frame) = ReplyFrame::parse(text) {
                return Ok(Some(frame));
            }
        }
    }
}

impl Encoder<CommandFrame> for LinkCodec {
    type Error = Error;

    /// Encode a command frame as one newline-terminated line.
    fn encode(&mut self, item: CommandFrame, dst: &mut BytesMut) -> Result<()> {
        let line = item.encode();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pindock_core::Pin;

    fn decode_all(codec: &mut LinkCodec, buffer: &mut BytesMut) -> Vec<ReplyFrame> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = codec.decode(buffer) {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn decode_complete_reply() {
        let mut codec = LinkCodec::new();
        let mut buffer = BytesMut::from(&b"C00011\n"[..]);

        let frame = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(frame.id, 1);
        assert_eq!(frame.result, "1");
    }

    #[test]
    fn decode_partial_line_waits_for_more() {
        let mut codec = LinkCodec::new();
        let mut buffer = BytesMut::from(&b"C0001"[..]);

        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"512\n");
        let frame = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(frame.result, "512");
    }

    #[test]
    fn decode_tolerates_crlf() {
        let mut codec = LinkCodec::new();
        let mut buffer = BytesMut::from(&b"C0003N\r\n"[..]);

        let frame = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(frame.id, 3);
        assert_eq!(frame.result, "N");
    }

    #[test]
    fn decode_skips_noise_lines() {
        let mut codec = LinkCodec::new();
        let mut buffer = BytesMut::from(&b"boot v1.2\n\nC00071\njunk\n"[..]);

        let frames = decode_all(&mut codec, &mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, 7);
    }

    #[test]
    fn decode_multiple_replies_in_one_buffer() {
        let mut codec = LinkCodec::new();
        let mut buffer = BytesMut::from(&b"C00010\nC00021\n"[..]);

        let frames = decode_all(&mut codec, &mut buffer);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].id, 1);
        assert_eq!(frames[1].id, 2);
    }

    #[test]
    fn decode_rejects_unterminated_flood() {
        let mut codec = LinkCodec::new();
        let mut buffer = BytesMut::from(vec![b'x'; MAX_LINE_LENGTH + 1].as_slice());

        assert!(codec.decode(&mut buffer).is_err());
    }

    #[test]
    fn encode_appends_terminator() {
        let mut codec = LinkCodec::new();
        let mut buffer = BytesMut::new();

        let frame = CommandFrame::new(
            1,
            Command::DigitalWrite { pin: Pin::new(5).unwrap(), value: true },
        );
        codec.encode(frame, &mut buffer).unwrap();

        assert_eq!(&buffer[..], b"C0001W051\n");
    }

    #[test]
    fn encode_keepalive_literal() {
        let mut codec = LinkCodec::new();
        let mut buffer = BytesMut::new();

        codec
            .encode(CommandFrame::new(12, Command::Keepalive), &mut buffer)
            .unwrap();

        assert_eq!(&buffer[..], b"C0012N\n");
    }
}
