//! Reference store for PIN descrambling keys
//!
//! The portal fetches a "reference" before prompting for a PIN: a random id
//! plus 16 random bytes the browser uses as an XOR pad. The scrambled-PIN
//! command later names the id so the bridge can recover the plain PIN (see
//! [`crate::translate`]).
//!
//! Nothing enforces single use of a reference; the bounded store is the only
//! mitigation against both unbounded growth and long-lived pads.

use std::collections::{HashMap, VecDeque};

use rand::Rng;

use crate::error::Error;

/// Length of a descrambling key in bytes
pub const KEY_LEN: usize = 16;

/// Default number of live references before the oldest is recycled
pub const DEFAULT_CAPACITY: usize = 1024;

/// A freshly issued descrambling reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    /// Random id in `[0, 2^31)`, kept below the sign bit so clients using
    /// signed 32-bit integers round-trip it unchanged
    pub id: u32,
    /// Random XOR pad
    pub key: [u8; KEY_LEN],
}

/// Store of issued references, bounded with insertion-order eviction
#[derive(Debug)]
pub struct ReferenceStore {
    entries: HashMap<u32, [u8; KEY_LEN]>,
    order: VecDeque<u32>,
    capacity: usize,
}

impl Default for ReferenceStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ReferenceStore {
    /// Create a store bounded to `capacity` live references
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Issue a fresh reference and retain its key for later lookup
    ///
    /// Ids are drawn uniformly from `[0, 2^31)` and re-drawn while the id is
    /// still live, so an issued id is unique among the live references.
    pub fn create(&mut self) -> Reference {
        let mut rng = rand::rng();
        let id = loop {
            let candidate = rng.random_range(0..0x8000_0000u32);
            if !self.entries.contains_key(&candidate) {
                break candidate;
            }
        };
        let mut key = [0u8; KEY_LEN];
        rng.fill(&mut key[..]);

        self.entries.insert(id, key);
        self.order.push_back(id);
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }

        Reference { id, key }
    }

    /// Look up the key for a previously issued reference
    pub fn lookup(&self, id: u32) -> Result<&[u8; KEY_LEN], Error> {
        self.entries.get(&id).ok_or(Error::ReferenceNotFound(id))
    }

    /// Number of live references
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the store holds no references
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
