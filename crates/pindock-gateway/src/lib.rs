//! The gateway daemon: settings, per-device connection lifecycle, and the
//! TCP accept loop.

pub mod connection;
pub mod server;
pub mod settings;

pub use connection::Connection;
pub use settings::Settings;
