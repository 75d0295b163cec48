use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid pin: {0}")]
    InvalidPin(String),

    #[error("Invalid device address: {0}")]
    InvalidDeviceAddr(String),

    #[error("Invalid sensor id: {0}")]
    InvalidSensorId(String),

    // Lifecycle errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
