use thiserror::Error;

/// Errors on the device link.
///
/// `Transport` and `Protocol` are fatal to the owning connection.
/// A reply timeout is not an error on this level: non-handshake calls
/// surface it as an absent result and the caller decides.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Socket I/O failure. Fatal to the owning connection, never to the
    /// process.
    #[error("Link transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Malformed or out-of-range reply, or an unexpected echo.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The identify handshake got no reply within the result window.
    /// The connection is never established.
    #[error("Identify timeout: device did not report an address")]
    HandshakeTimeout,

    /// The correlator is not running (never started, or already stopped).
    #[error("Link is not running")]
    NotRunning,

    /// Core protocol or lifecycle error.
    #[error(transparent)]
    Core(#[from] pindock_core::Error),
}
