//! Cryptographic and utility primitives exposed as a host object.

use crate::{
    constants::{KEY_BASE58, KEY_HASH, KEY_RANDOM},
    host::ObjectHost,
    objects::HostObject,
    types::FieldType,
};
use byteorder::{ByteOrder, LittleEndian};
use sha2::{Digest, Sha256, Sha512};
use std::any::Any;

/// Base58 codec, domain hash and deterministic pseudo-randomness.
///
/// The random generator is seeded from the id of the request currently being
/// processed and hands out 8-byte little-endian integers. When the 64-byte
/// buffer runs dry it re-hashes its own contents for the next 64 bytes, so the
/// same seed always reproduces the same sequence.
pub struct UtilityObject {
    name:        String,
    encoded:     String,
    decoded:     Vec<u8>,
    hash:        Vec<u8>,
    random:      Vec<u8>,
    next_random: usize,
}

impl UtilityObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:        name.into(),
            encoded:     String::new(),
            decoded:     Vec::new(),
            hash:        Vec::new(),
            random:      Vec::new(),
            next_random: 0,
        }
    }

    fn next_random(&mut self, host: &mut ObjectHost) -> i64 {
        if self.random.is_empty() {
            self.random = Sha512::digest(host.ctx().request_id.0).to_vec();
        }
        if self.next_random + 8 > self.random.len() {
            self.random = Sha512::digest(&self.random).to_vec();
            self.next_random = 0;
        }
        let value = LittleEndian::read_u64(&self.random[self.next_random..self.next_random + 8]);
        self.next_random += 8;
        value as i64
    }
}

impl HostObject for UtilityObject {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, _host: &mut ObjectHost, key_id: i32) -> bool {
        matches!(key_id, KEY_BASE58 | KEY_HASH | KEY_RANDOM)
    }

    fn type_of(&self, key_id: i32) -> i32 {
        match key_id {
            KEY_HASH => FieldType::Bytes.into(),
            KEY_RANDOM => FieldType::Int.into(),
            _ => -1,
        }
    }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        match key_id {
            KEY_BASE58 => self.decoded.clone(),
            KEY_HASH => self.hash.clone(),
            _ => {
                host.fault(&self.name, "invalid access");
                Vec::new()
            }
        }
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        match key_id {
            KEY_RANDOM => self.next_random(host),
            _ => {
                host.fault(&self.name, "invalid access");
                0
            }
        }
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        match key_id {
            KEY_BASE58 => self.encoded.clone(),
            _ => {
                host.fault(&self.name, "invalid access");
                String::new()
            }
        }
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, key_id: i32, value: &[u8]) {
        match key_id {
            KEY_BASE58 => self.encoded = bs58::encode(value).into_string(),
            KEY_HASH => self.hash = Sha256::digest(value).to_vec(),
            _ => host.fault(&self.name, "invalid access"),
        }
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        match key_id {
            KEY_BASE58 => match bs58::decode(value).into_vec() {
                Ok(bytes) => self.decoded = bytes,
                Err(_) => host.fault(&self.name, "invalid base58"),
            },
            _ => host.fault(&self.name, "invalid access"),
        }
    }
}
