//! Per-device link engine: command correlation and the typed device proxy.
//!
//! One TCP stream per device carries many concurrent request/response
//! exchanges. The [`Correlator`] serializes outbound frames, assigns
//! correlation ids, and matches inbound reply lines back to the waiting
//! caller; the [`DeviceProxy`] layers the typed command vocabulary and all
//! reply-validation rules on top.

pub mod correlator;
pub mod error;
pub mod proxy;

pub use correlator::Correlator;
pub use error::LinkError;
pub use proxy::DeviceProxy;
