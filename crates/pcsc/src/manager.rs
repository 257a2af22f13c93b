//! Device manager for PC/SC operations

use pcsc::{Context, Scope};
use tracing::debug;

use crate::error::PcscError;
use crate::reader::PcscReader;
use crate::transport::PcscTransport;

/// Manager for PC/SC device operations
#[allow(missing_debug_implementations)]
pub struct PcscDeviceManager {
    context: Context,
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager
    pub fn new() -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers with their card-presence state
    ///
    /// An empty list is a valid answer: the portal renders "no readers"
    /// itself, so the absence of readers is not an error here.
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let readers = self.context.list_readers_owned()?;
        let mut result = Vec::with_capacity(readers.len());

        for reader_name in readers {
            let mut reader_states = vec![pcsc::ReaderState::new(
                reader_name.as_c_str(),
                pcsc::State::UNAWARE,
            )];

            match self.context.get_status_change(None, &mut reader_states) {
                Ok(()) => result.push(PcscReader::from_reader_state(&reader_states[0])),
                Err(e) => {
                    // If the state query fails, report the reader without a card
                    debug!(reader = %reader_name.to_string_lossy(), error = %e, "status query failed");
                    result.push(PcscReader::new(
                        reader_name.to_string_lossy().into_owned(),
                        false,
                    ));
                }
            }
        }

        Ok(result)
    }

    /// Open an exchange channel to a specific reader
    pub fn open_reader(&self, reader_name: &str) -> Result<PcscTransport, PcscError> {
        // Clone the context to hand ownership to the transport
        PcscTransport::new(self.context.clone(), reader_name)
    }
}
