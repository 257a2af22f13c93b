//! Error types for the PC/SC backend

use scbridge_core::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// Error from the PC/SC stack
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// Reader not found
    #[error("reader {0:?} not found")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("no card present in reader {0:?}")]
    NoCard(String),
}

impl From<PcscError> for TransportError {
    fn from(err: PcscError) -> Self {
        match err {
            PcscError::ReaderNotFound(name) => Self::ReaderNotFound(name),
            PcscError::NoCard(name) => Self::NoCard(name),
            PcscError::Pcsc(e) => Self::Other(e.to_string()),
        }
    }
}
