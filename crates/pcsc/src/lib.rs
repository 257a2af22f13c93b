//! PC/SC backend for the scbridge smartcard bridge
//!
//! Implements the `CardTransport` trait from `scbridge-core` on top of the
//! system PC/SC stack, and provides reader enumeration with card-presence
//! detection for the bridge's list endpoint.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod error;
mod manager;
mod reader;
mod transport;

pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;
