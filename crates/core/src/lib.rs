//! Command-translation and session-state engine for the scbridge smartcard bridge
//!
//! This crate contains the protocol logic of the bridge, independent of any
//! HTTP transport or PC/SC backend:
//!
//! - issuing and resolving descrambling references ([`ReferenceStore`])
//! - reconstructing scrambled-PIN APDUs ([`translate`])
//! - the status-word-driven multi-step card exchange ([`exchange`])
//! - session lifecycle keyed by caller-supplied ids ([`SessionRegistry`])
//!
//! Card I/O happens through the [`CardTransport`] trait; the actual reader
//! backend is injected by the caller. All state-owning types here are plain
//! owned values with no interior locking: the caller is responsible for
//! serializing access (a physical card supports one transaction at a time).
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::Bytes;

pub mod error;
pub mod exchange;
pub mod reference;
pub mod session;
pub mod status;
pub mod translate;
pub mod transport;

pub use error::Error;
pub use exchange::exchange;
pub use reference::{Reference, ReferenceStore};
pub use session::{Session, SessionRegistry};
pub use status::StatusWord;
pub use translate::translate;
pub use transport::{CardTransport, TransportError};
