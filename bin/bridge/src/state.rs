//! Shared bridge state and the operations behind each endpoint
//!
//! One `parking_lot::Mutex` guards the session registry and every card
//! handle. A physical card supports a single outstanding transaction, so
//! every request that touches it is serialized through this lock; the HTTP
//! layer may accept connections concurrently but queues here. The
//! reference store sits behind its own lock: issuing a reference never
//! touches a card, so `/scard/getref/` stays responsive while an exchange
//! is in flight (or hung).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scbridge_core::{
    exchange, translate, CardTransport, Error, Reference, ReferenceStore, SessionRegistry,
    TransportError,
};
use scbridge_pcsc::PcscDeviceManager;
use tracing::{debug, warn};

/// Reader enumeration and card-channel opening, as the bridge needs them
///
/// The production backend is PC/SC; tests inject their own.
pub(crate) trait ReaderBackend: Send {
    /// Enumerate readers and their card presence
    fn list_readers(&self) -> Result<Vec<ReaderStatus>, TransportError>;

    /// Open an exchange channel to the named reader
    fn open_reader(&self, name: &str) -> Result<Box<dyn CardTransport>, TransportError>;
}

impl ReaderBackend for PcscDeviceManager {
    fn list_readers(&self) -> Result<Vec<ReaderStatus>, TransportError> {
        let readers = PcscDeviceManager::list_readers(self)?;
        Ok(readers
            .iter()
            .map(|r| ReaderStatus {
                name: r.name().to_owned(),
                has_card: r.has_card(),
            })
            .collect())
    }

    fn open_reader(&self, name: &str) -> Result<Box<dyn CardTransport>, TransportError> {
        let transport = PcscDeviceManager::open_reader(self, name)?;
        Ok(Box::new(transport) as Box<dyn CardTransport>)
    }
}

struct BridgeInner {
    sessions: SessionRegistry,
    backend: Box<dyn ReaderBackend>,
}

/// Handle to the bridge engine, cloneable across connection tasks
#[derive(Clone)]
pub(crate) struct Bridge {
    references: Arc<Mutex<ReferenceStore>>,
    inner: Arc<Mutex<BridgeInner>>,
    card_timeout: Duration,
}

/// Reader name plus card presence, as reported to the portal
#[derive(Debug)]
pub(crate) struct ReaderStatus {
    pub(crate) name: String,
    pub(crate) has_card: bool,
}

impl Bridge {
    /// Create the bridge around a reader backend
    pub(crate) fn new(backend: impl ReaderBackend + 'static, card_timeout: Duration) -> Self {
        Self {
            references: Arc::new(Mutex::new(ReferenceStore::default())),
            inner: Arc::new(Mutex::new(BridgeInner {
                sessions: SessionRegistry::new(),
                backend: Box::new(backend),
            })),
            card_timeout,
        }
    }

    /// Enumerate readers and their card presence
    pub(crate) async fn list_readers(&self) -> Result<Vec<ReaderStatus>, Error> {
        self.run_blocking(|inner| inner.backend.list_readers().map_err(Error::Transport))
            .await
    }

    /// Issue a fresh descrambling reference
    ///
    /// Only takes the reference lock, never the card lock: this must work
    /// even while an exchange is blocked on the reader.
    pub(crate) fn create_reference(&self) -> Reference {
        self.references.lock().create()
    }

    /// Run a batch of APDUs against the session's card, in order
    ///
    /// Each command is translated (PIN descrambling) and exchanged with the
    /// status-word protocol; responses come back one per command. The first
    /// failing command aborts the batch.
    pub(crate) async fn send_apdus(
        &self,
        reader_name: &str,
        session_id: &str,
        commands: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, Error> {
        let reader_name = reader_name.to_owned();
        let session_id = session_id.to_owned();
        let references = Arc::clone(&self.references);
        self.run_blocking(move |inner| {
            // Split borrows: the opener captures the backend, the registry
            // entry borrows the session map.
            let BridgeInner { sessions, backend } = inner;

            let session =
                sessions.get_or_create(&reader_name, &session_id, |name| backend.open_reader(name))?;

            let mut responses = Vec::with_capacity(commands.len());
            for command in &commands {
                let real = translate(command, &references.lock())?;
                let response = exchange(session.transport_mut(), &real)?;
                responses.push(response.to_vec());
            }
            debug!(
                session_id = %session_id,
                count = responses.len(),
                "APDU batch completed"
            );
            Ok(responses)
        })
        .await
    }

    /// Close the session for `session_id`
    ///
    /// Runs on the blocking worker: dropping the transport issues a PC/SC
    /// disconnect.
    pub(crate) async fn disconnect(&self, session_id: &str) -> Result<(), Error> {
        let session_id = session_id.to_owned();
        self.run_blocking(move |inner| inner.sessions.close(&session_id))
            .await
    }

    /// Close every live session; called at shutdown
    pub(crate) fn close_all(&self) {
        self.inner.lock().sessions.close_all();
    }

    /// Execute a card-touching operation on a blocking worker, bounded by
    /// the configured deadline
    ///
    /// PC/SC calls cannot be interrupted mid-flight: on expiry the caller
    /// gets `CardTimeout` while the worker keeps the lock until the driver
    /// returns, so later requests queue behind the hung exchange.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&mut BridgeInner) -> Result<T, Error> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = inner.lock();
            op(&mut *guard)
        });

        match tokio::time::timeout(self.card_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                warn!(error = %join_err, "card worker task failed");
                Err(Error::Transport(TransportError::Other(
                    join_err.to_string(),
                )))
            }
            Err(_) => {
                warn!("card exchange exceeded deadline");
                Err(Error::CardTimeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use scbridge_core::Bytes;

    #[derive(Debug, Default)]
    struct StubTransport {
        responses: Vec<Vec<u8>>,
    }

    impl CardTransport for StubTransport {
        fn do_transmit(&mut self, _command: &[u8]) -> Result<Bytes, TransportError> {
            if self.responses.is_empty() {
                return Err(TransportError::Transmission);
            }
            Ok(Bytes::from(self.responses.remove(0)))
        }
    }

    /// Backend whose card operations stall, standing in for a wedged
    /// reader driver
    struct SlowBackend {
        delay: Duration,
    }

    impl ReaderBackend for SlowBackend {
        fn list_readers(&self) -> Result<Vec<ReaderStatus>, TransportError> {
            std::thread::sleep(self.delay);
            Ok(Vec::new())
        }

        fn open_reader(&self, _name: &str) -> Result<Box<dyn CardTransport>, TransportError> {
            std::thread::sleep(self.delay);
            Ok(Box::new(StubTransport {
                responses: vec![vec![0x90, 0x00]],
            }))
        }
    }

    struct StaticBackend;

    impl ReaderBackend for StaticBackend {
        fn list_readers(&self) -> Result<Vec<ReaderStatus>, TransportError> {
            Ok(vec![ReaderStatus {
                name: "Reader A".to_owned(),
                has_card: true,
            }])
        }

        fn open_reader(&self, _name: &str) -> Result<Box<dyn CardTransport>, TransportError> {
            Ok(Box::new(StubTransport {
                responses: vec![vec![0xCA, 0xFE, 0x90, 0x00], vec![0x90, 0x00]],
            }))
        }
    }

    #[tokio::test]
    async fn test_slow_card_operation_times_out() {
        let bridge = Bridge::new(
            SlowBackend {
                delay: Duration::from_millis(500),
            },
            Duration::from_millis(20),
        );
        let err = bridge
            .send_apdus("Reader A", "s1", vec![vec![0x00, 0xA4, 0x04, 0x00]])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CardTimeout));
    }

    #[tokio::test]
    async fn test_reference_issuance_unaffected_by_busy_card_path() {
        let bridge = Bridge::new(
            SlowBackend {
                delay: Duration::from_millis(500),
            },
            Duration::from_secs(5),
        );

        let busy = bridge.clone();
        let task = tokio::spawn(async move {
            busy.send_apdus("Reader A", "s1", vec![vec![0x00, 0xA4, 0x04, 0x00]])
                .await
        });
        // Let the exchange take the card lock before asking for a reference
        tokio::time::sleep(Duration::from_millis(100)).await;

        let start = Instant::now();
        let reference = bridge.create_reference();
        assert!(start.elapsed() < Duration::from_millis(200));
        assert!(reference.id < 0x8000_0000);

        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_apdu_batch_answers_in_order() {
        let bridge = Bridge::new(StaticBackend, Duration::from_secs(5));
        let responses = bridge
            .send_apdus(
                "Reader A",
                "s1",
                vec![vec![0x00, 0xB0, 0x00, 0x00], vec![0x00, 0x20, 0x00, 0x82]],
            )
            .await
            .unwrap();
        assert_eq!(responses, vec![vec![0xCA, 0xFE], vec![0x90, 0x00]]);
    }

    #[tokio::test]
    async fn test_list_readers_reports_backend_state() {
        let bridge = Bridge::new(StaticBackend, Duration::from_secs(5));
        let readers = bridge.list_readers().await.unwrap();
        assert_eq!(readers.len(), 1);
        assert_eq!(readers[0].name, "Reader A");
        assert!(readers[0].has_card);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_session_is_reported() {
        let bridge = Bridge::new(StaticBackend, Duration::from_secs(5));
        let err = bridge.disconnect("nope").await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }
}
