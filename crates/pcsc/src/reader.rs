//! Reader representation for PC/SC devices

use pcsc::{ReaderState, State};

/// A PC/SC card reader and its card-presence state
#[derive(Debug, Clone)]
pub struct PcscReader {
    name: String,
    has_card: bool,
}

impl PcscReader {
    /// Create a new reader entry
    pub const fn new(name: String, has_card: bool) -> Self {
        Self { name, has_card }
    }

    /// Get the reader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a card is present in the reader
    pub const fn has_card(&self) -> bool {
        self.has_card
    }

    pub(crate) fn from_reader_state(reader_state: &ReaderState) -> Self {
        let has_card = reader_state.event_state().contains(State::PRESENT)
            && !reader_state.event_state().contains(State::EMPTY);

        Self {
            name: reader_state.name().to_string_lossy().into_owned(),
            has_card,
        }
    }
}
