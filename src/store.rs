//! Boundary to the node's persistent key-value store.
//!
//! The persistent-state proxy objects translate the typed object protocol into
//! this surface: scalar records, ordered sequences of byte records, and
//! byte-keyed dictionaries. Integers are stored as fixed-width 8-byte
//! little-endian records.

use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;

/// The persistent store a chain node provides to a host instance. Consistency
/// and locking of the backing store are the store's own concern; a host
/// instance is driven by a single caller and performs no synchronization.
pub trait StateStore {
    fn has(&self, key: &[u8]) -> bool;
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Number of records in the ordered sequence stored under `key`.
    fn seq_len(&self, key: &[u8]) -> u32;
    fn seq_get(&self, key: &[u8], index: u32) -> Vec<u8>;
    fn seq_set(&mut self, key: &[u8], index: u32, value: &[u8]);
    fn seq_push(&mut self, key: &[u8], value: &[u8]);
    fn seq_clear(&mut self, key: &[u8]);

    fn dict_has(&self, key: &[u8], entry: &[u8]) -> bool;
    fn dict_get(&self, key: &[u8], entry: &[u8]) -> Option<Vec<u8>>;
    fn dict_set(&mut self, key: &[u8], entry: &[u8], value: &[u8]);
}

/// In-memory [`StateStore`]. Backs standalone hosts and tests; durable nodes
/// plug in their own store at the same trait boundary.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    scalars:      BTreeMap<Vec<u8>, Vec<u8>>,
    sequences:    BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
    dictionaries: BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self { Self::default() }
}

impl StateStore for MemoryStateStore {
    fn has(&self, key: &[u8]) -> bool { self.scalars.contains_key(key) }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> { self.scalars.get(key).cloned() }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.scalars.insert(key.to_vec(), value.to_vec());
    }

    fn seq_len(&self, key: &[u8]) -> u32 {
        self.sequences.get(key).map_or(0, |items| items.len() as u32)
    }

    fn seq_get(&self, key: &[u8], index: u32) -> Vec<u8> {
        self.sequences
            .get(key)
            .and_then(|items| items.get(index as usize))
            .cloned()
            .unwrap_or_default()
    }

    fn seq_set(&mut self, key: &[u8], index: u32, value: &[u8]) {
        let items = self.sequences.entry(key.to_vec()).or_default();
        if let Some(slot) = items.get_mut(index as usize) {
            *slot = value.to_vec();
        }
    }

    fn seq_push(&mut self, key: &[u8], value: &[u8]) {
        self.sequences.entry(key.to_vec()).or_default().push(value.to_vec());
    }

    fn seq_clear(&mut self, key: &[u8]) { self.sequences.remove(key); }

    fn dict_has(&self, key: &[u8], entry: &[u8]) -> bool {
        self.dictionaries.get(key).is_some_and(|dict| dict.contains_key(entry))
    }

    fn dict_get(&self, key: &[u8], entry: &[u8]) -> Option<Vec<u8>> {
        self.dictionaries.get(key).and_then(|dict| dict.get(entry)).cloned()
    }

    fn dict_set(&mut self, key: &[u8], entry: &[u8], value: &[u8]) {
        self.dictionaries.entry(key.to_vec()).or_default().insert(entry.to_vec(), value.to_vec());
    }
}

/// Encode an integer as the store's fixed-width little-endian record.
pub(crate) fn encode_int(value: i64) -> [u8; 8] {
    let mut out = [0u8; 8];
    LittleEndian::write_i64(&mut out, value);
    out
}

/// Decode a little-endian integer record. Records of any other width decode
/// to 0, matching the zero value the protocol returns for absent fields.
pub(crate) fn decode_int(bytes: &[u8]) -> i64 {
    if bytes.len() == 8 {
        LittleEndian::read_i64(bytes)
    } else {
        0
    }
}
