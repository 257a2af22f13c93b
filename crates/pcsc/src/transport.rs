//! PC/SC transport implementation

use std::ffi::CString;
use std::fmt;

use bytes::Bytes;
use pcsc::{Card, Context, Disposition, Protocols, ShareMode};
use scbridge_core::{CardTransport, TransportError};

use crate::error::PcscError;

/// Card transport backed by a PC/SC connection
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .finish()
    }
}

impl PcscTransport {
    /// Create a new PC/SC transport for the named reader
    pub(crate) fn new(context: Context, reader_name: &str) -> Result<Self, PcscError> {
        let mut transport = Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
        };

        // The session contract is an open channel, so connect eagerly
        transport.connect_card()?;
        Ok(transport)
    }

    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader_cstr = CString::new(self.reader_name.clone())
            .map_err(|_| PcscError::ReaderNotFound(self.reader_name.clone()))?;

        match self
            .context
            .connect(&reader_cstr, ShareMode::Shared, Protocols::ANY)
        {
            Ok(card) => {
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard) => Err(PcscError::NoCard(self.reader_name.clone())),
            Err(pcsc::Error::UnknownReader) => {
                Err(PcscError::ReaderNotFound(self.reader_name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn transmit_command(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        match self.transmit_once(command) {
            // Another application reset the card; reconnect and retry once
            Err(PcscError::Pcsc(pcsc::Error::ResetCard)) => {
                self.card = None;
                self.connect_card()?;
                self.transmit_once(command)
            }
            Err(PcscError::Pcsc(pcsc::Error::RemovedCard)) => {
                self.card = None;
                Err(PcscError::NoCard(self.reader_name.clone()))
            }
            other => other,
        }
    }

    fn transmit_once(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        self.connect_card()?;

        let card = match &mut self.card {
            Some(card) => card,
            None => return Err(PcscError::NoCard(self.reader_name.clone())),
        };

        let mut response_buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        let response = card.transmit(command, &mut response_buffer)?;
        Ok(Bytes::copy_from_slice(response))
    }
}

impl CardTransport for PcscTransport {
    fn do_transmit(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.transmit_command(command).map_err(TransportError::from)
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
