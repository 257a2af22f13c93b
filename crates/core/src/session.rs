//! Session registry keyed by caller-supplied ids
//!
//! A session binds an opaque id chosen by the portal to one open exchange
//! channel on one reader. The id is the sole registry key: reusing an id
//! against a different reader closes the old channel and opens a new one.
//! Sessions live until an explicit disconnect or process shutdown.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::error::Error;
use crate::transport::{CardTransport, TransportError};

/// An open card session bound to a specific reader
#[derive(Debug)]
pub struct Session {
    reader_name: String,
    transport: Box<dyn CardTransport>,
}

impl Session {
    /// Name of the reader this session is bound to
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Mutable access to the underlying card transport
    pub fn transport_mut(&mut self) -> &mut dyn CardTransport {
        self.transport.as_mut()
    }
}

/// Registry of live sessions; at most one per session id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the session for `session_id`, opening a channel to
    /// `reader_name` through `open` if none exists
    ///
    /// If the id is already bound to a different reader, the stale channel
    /// is dropped and a fresh one opened against the requested reader.
    pub fn get_or_create<F>(
        &mut self,
        reader_name: &str,
        session_id: &str,
        open: F,
    ) -> Result<&mut Session, Error>
    where
        F: FnOnce(&str) -> Result<Box<dyn CardTransport>, TransportError>,
    {
        let stale = self
            .sessions
            .get(session_id)
            .is_some_and(|s| s.reader_name != reader_name);
        if stale {
            debug!(session_id, reader_name, "session rebinding to a new reader");
            self.sessions.remove(session_id);
        }

        match self.sessions.entry(session_id.to_owned()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!(session_id, reader_name, "opening new card session");
                let transport = open(reader_name)
                    .map_err(|_| Error::ReaderUnavailable(reader_name.to_owned()))?;
                Ok(entry.insert(Session {
                    reader_name: reader_name.to_owned(),
                    transport,
                }))
            }
        }
    }

    /// Close and remove the session for `session_id`
    pub fn close(&mut self, session_id: &str) -> Result<(), Error> {
        match self.sessions.remove(session_id) {
            Some(_) => {
                debug!(session_id, "session closed");
                Ok(())
            }
            None => Err(Error::SessionNotFound(session_id.to_owned())),
        }
    }

    /// Close every live session; used at shutdown
    pub fn close_all(&mut self) {
        if !self.sessions.is_empty() {
            debug!(count = self.sessions.len(), "closing all sessions");
        }
        self.sessions.clear();
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check whether the registry holds no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
