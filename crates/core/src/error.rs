//! Core error type for bridge operations
//!
//! All request-scoped failures the engine can produce are consolidated here.
//! Every variant maps to a structured failure response at the HTTP boundary;
//! none of them is fatal to the process.

use crate::transport::TransportError;

/// Core error type for the bridge engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A scrambled-PIN command named a reference id the store does not hold
    #[error("reference {0} not found")]
    ReferenceNotFound(u32),

    /// A request named a session id the registry does not hold
    #[error("session {0:?} not found")]
    SessionNotFound(String),

    /// The requested reader could not be opened
    #[error("reader {0:?} unavailable")]
    ReaderUnavailable(String),

    /// A card exchange did not complete within the configured deadline
    #[error("card exchange timed out")]
    CardTimeout,

    /// Scrambled-PIN sentinel detected but the command layout is inconsistent
    #[error("malformed APDU: {0}")]
    MalformedApdu(&'static str),

    /// The card returned fewer than the two mandatory status bytes
    #[error("truncated card response ({0} bytes)")]
    TruncatedResponse(usize),

    /// Failure in the underlying card transport
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
