//! Transport trait for APDU communication with cards
//!
//! A transport is responsible for moving raw APDU bytes to a card and back.
//! It has no knowledge of the bridge protocol: no sentinel handling, no
//! GET RESPONSE follow-ups, no session bookkeeping.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

/// Errors produced by a card transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to transmit data
    #[error("failed to transmit data")]
    Transmission,

    /// No card is present in the reader
    #[error("no card present in reader {0:?}")]
    NoCard(String),

    /// The named reader does not exist
    #[error("reader {0:?} not found")]
    ReaderNotFound(String),

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

/// Trait for raw card transports
///
/// Implementations own one exchange channel to one card. Dropping the
/// transport releases the underlying channel.
pub trait CardTransport: Send + fmt::Debug {
    /// Send raw APDU bytes to the card and return the raw response,
    /// including the trailing status bytes.
    fn transmit(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode(command), "transmitting");
        let result = self.do_transmit(command);
        match &result {
            Ok(response) => trace!(response = %hex::encode(response), "received"),
            Err(e) => debug!(error = ?e, "transport error during transmission"),
        }
        result
    }

    /// Internal implementation of transmit; concrete transports override this
    fn do_transmit(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    /// Scripted responses, consumed front to back
    pub responses: Vec<Bytes>,
    /// Commands that were sent
    pub commands: Vec<Bytes>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses,
            commands: Vec::new(),
        }
    }

    pub fn with_response(response: &'static [u8]) -> Self {
        Self::new(vec![Bytes::from_static(response)])
    }
}

#[cfg(test)]
impl CardTransport for MockTransport {
    fn do_transmit(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.commands.push(Bytes::copy_from_slice(command));
        if self.responses.is_empty() {
            return Err(TransportError::Transmission);
        }
        Ok(self.responses.remove(0))
    }
}
