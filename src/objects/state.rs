//! Proxies presenting the durable chain state through the object protocol.
//!
//! Unlike the in-memory map and array objects these hold no values of their
//! own: every access translates to the backing [`StateStore`], keyed by the
//! exact bytes of the interned key. Type locks are tracked locally per host
//! instance and are not persisted.

use crate::{
    constants::KEY_LENGTH,
    host::ObjectHost,
    objects::{map_child_id, HostObject, ObjectFactory},
    store::{decode_int, encode_int, StateStore},
    types::FieldType,
};
use std::{any::Any, collections::BTreeMap};

/// Scalar view of the persistent state.
pub struct StateObject {
    name:     String,
    types:    BTreeMap<i32, i32>,
    children: BTreeMap<i32, i32>,
}

impl StateObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:     name.into(),
            types:    BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }

    fn valid(&mut self, host: &mut ObjectHost, key_id: i32, field_type: FieldType) -> bool {
        match self.types.get(&key_id) {
            None => {
                self.types.insert(key_id, field_type.into());
                true
            }
            Some(&locked) if locked == i32::from(field_type) => true,
            Some(_) => {
                host.fault(&self.name, "invalid access");
                false
            }
        }
    }

    fn state_key(&self, host: &mut ObjectHost, key_id: i32) -> Option<Vec<u8>> {
        let key = host.key_bytes(key_id);
        if key.is_none() {
            host.fault(&self.name, "invalid key");
        }
        key
    }
}

impl HostObject for StateObject {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, host: &mut ObjectHost, key_id: i32) -> bool {
        match host.key_bytes(key_id) {
            Some(key) => host.store().borrow().has(&key),
            None => false,
        }
    }

    fn type_of(&self, key_id: i32) -> i32 { self.types.get(&key_id).copied().unwrap_or(-1) }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        if !self.valid(host, key_id, FieldType::Bytes) {
            return Vec::new();
        }
        match self.state_key(host, key_id) {
            Some(key) => host.store().borrow().get(&key).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        if !self.valid(host, key_id, FieldType::Int) {
            return 0;
        }
        match self.state_key(host, key_id) {
            Some(key) => decode_int(&host.store().borrow().get(&key).unwrap_or_default()),
            None => 0,
        }
    }

    fn get_object_id(&mut self, host: &mut ObjectHost, key_id: i32, type_id: i32) -> i32 {
        let Some(key) = self.state_key(host, key_id) else {
            return 0;
        };
        let key_name = host.key_name(key_id);
        let factory: ObjectFactory = match FieldType::try_from(type_id) {
            Ok(FieldType::BytesArray | FieldType::IntArray | FieldType::StringArray) => {
                let name = format!("state.array.{key_name}");
                Box::new(move |host| host.track(StateArrayObject::new(name, key, type_id - 1)))
            }
            Ok(FieldType::Map) => {
                let name = format!("state.map.{key_name}");
                Box::new(move |host| host.track(StateDictObject::new(name, key)))
            }
            _ => {
                host.fault(&self.name, "invalid type");
                return 0;
            }
        };
        map_child_id(host, &self.name, &mut self.types, &mut self.children, key_id, type_id, factory)
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        if !self.valid(host, key_id, FieldType::String) {
            return String::new();
        }
        match self.state_key(host, key_id) {
            Some(key) => {
                let value = host.store().borrow().get(&key).unwrap_or_default();
                String::from_utf8_lossy(&value).into_owned()
            }
            None => String::new(),
        }
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, key_id: i32, value: &[u8]) {
        if !self.valid(host, key_id, FieldType::Bytes) {
            return;
        }
        if let Some(key) = self.state_key(host, key_id) {
            host.store().borrow_mut().set(&key, value);
        }
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        if !self.valid(host, key_id, FieldType::Int) {
            return;
        }
        if let Some(key) = self.state_key(host, key_id) {
            host.store().borrow_mut().set(&key, &encode_int(value));
        }
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        if !self.valid(host, key_id, FieldType::String) {
            return;
        }
        if let Some(key) = self.state_key(host, key_id) {
            host.store().borrow_mut().set(&key, value.as_bytes());
        }
    }
}

/// Dense array of byte records persisted as an ordered sequence under a
/// single storage key. Integer elements are fixed-width 8-byte little-endian
/// records.
pub struct StateArrayObject {
    name:      String,
    key:       Vec<u8>,
    elem_type: i32,
}

impl StateArrayObject {
    pub fn new(name: impl Into<String>, key: Vec<u8>, elem_type: i32) -> Self {
        Self {
            name: name.into(),
            key,
            elem_type,
        }
    }

    fn length(&self, host: &mut ObjectHost) -> i32 { host.store().borrow().seq_len(&self.key) as i32 }

    /// Bounds check with auto-append: touching the index one past the end
    /// pushes the element type's zero record.
    fn valid(&self, host: &mut ObjectHost, index: i32, field_type: FieldType) -> bool {
        if i32::from(field_type) != self.elem_type {
            host.fault(&self.name, "invalid access");
            return false;
        }
        let length = self.length(host);
        if index == length {
            let zero: Vec<u8> = match field_type {
                FieldType::Bytes | FieldType::String => Vec::new(),
                FieldType::Int => encode_int(0).to_vec(),
                _ => {
                    host.fault(&self.name, "invalid type");
                    return false;
                }
            };
            host.store().borrow_mut().seq_push(&self.key, &zero);
            return true;
        }
        if index < 0 || index > length {
            host.fault(&self.name, "invalid index");
            return false;
        }
        true
    }
}

impl HostObject for StateArrayObject {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, host: &mut ObjectHost, key_id: i32) -> bool {
        key_id >= 0 && key_id <= self.length(host)
    }

    fn type_of(&self, key_id: i32) -> i32 {
        if key_id == KEY_LENGTH {
            return FieldType::Int.into();
        }
        self.elem_type
    }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        if !self.valid(host, key_id, FieldType::Bytes) {
            return Vec::new();
        }
        host.store().borrow().seq_get(&self.key, key_id as u32)
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        if key_id == KEY_LENGTH {
            return i64::from(self.length(host));
        }
        if !self.valid(host, key_id, FieldType::Int) {
            return 0;
        }
        decode_int(&host.store().borrow().seq_get(&self.key, key_id as u32))
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        if !self.valid(host, key_id, FieldType::String) {
            return String::new();
        }
        let value = host.store().borrow().seq_get(&self.key, key_id as u32);
        String::from_utf8_lossy(&value).into_owned()
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, key_id: i32, value: &[u8]) {
        if self.valid(host, key_id, FieldType::Bytes) {
            host.store().borrow_mut().seq_set(&self.key, key_id as u32, value);
        }
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        if key_id == KEY_LENGTH {
            if value == 0 {
                host.store().borrow_mut().seq_clear(&self.key);
            } else {
                host.fault(&self.name, "invalid length");
            }
            return;
        }
        if self.valid(host, key_id, FieldType::Int) {
            host.store().borrow_mut().seq_set(&self.key, key_id as u32, &encode_int(value));
        }
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        if self.valid(host, key_id, FieldType::String) {
            host.store().borrow_mut().seq_set(&self.key, key_id as u32, value.as_bytes());
        }
    }
}

/// Dictionary of byte-string keys persisted under a single storage key. The
/// entry key is the interned key's exact bytes; existence and type are
/// tracked locally for the type lock, not persisted. Dictionaries cannot be
/// truncated through the length key.
pub struct StateDictObject {
    name:  String,
    key:   Vec<u8>,
    types: BTreeMap<i32, i32>,
}

impl StateDictObject {
    pub fn new(name: impl Into<String>, key: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            key,
            types: BTreeMap::new(),
        }
    }

    fn valid(&mut self, host: &mut ObjectHost, key_id: i32, field_type: FieldType) -> bool {
        match self.types.get(&key_id) {
            None => {
                self.types.insert(key_id, field_type.into());
                true
            }
            Some(&locked) if locked == i32::from(field_type) => true,
            Some(_) => {
                host.fault(&self.name, "invalid access");
                false
            }
        }
    }

    fn entry_key(&self, host: &mut ObjectHost, key_id: i32) -> Option<Vec<u8>> {
        let key = host.key_bytes(key_id);
        if key.is_none() {
            host.fault(&self.name, "invalid key");
        }
        key
    }
}

impl HostObject for StateDictObject {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, host: &mut ObjectHost, key_id: i32) -> bool {
        match host.key_bytes(key_id) {
            Some(entry) => host.store().borrow().dict_has(&self.key, &entry),
            None => false,
        }
    }

    fn type_of(&self, key_id: i32) -> i32 { self.types.get(&key_id).copied().unwrap_or(-1) }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        if !self.valid(host, key_id, FieldType::Bytes) {
            return Vec::new();
        }
        match self.entry_key(host, key_id) {
            Some(entry) => host.store().borrow().dict_get(&self.key, &entry).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        if !self.valid(host, key_id, FieldType::Int) {
            return 0;
        }
        match self.entry_key(host, key_id) {
            Some(entry) => {
                decode_int(&host.store().borrow().dict_get(&self.key, &entry).unwrap_or_default())
            }
            None => 0,
        }
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        if !self.valid(host, key_id, FieldType::String) {
            return String::new();
        }
        match self.entry_key(host, key_id) {
            Some(entry) => {
                let value = host.store().borrow().dict_get(&self.key, &entry).unwrap_or_default();
                String::from_utf8_lossy(&value).into_owned()
            }
            None => String::new(),
        }
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, key_id: i32, value: &[u8]) {
        if !self.valid(host, key_id, FieldType::Bytes) {
            return;
        }
        if let Some(entry) = self.entry_key(host, key_id) {
            host.store().borrow_mut().dict_set(&self.key, &entry, value);
        }
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        if key_id == KEY_LENGTH {
            host.fault(&self.name, "invalid clear");
            return;
        }
        if !self.valid(host, key_id, FieldType::Int) {
            return;
        }
        if let Some(entry) = self.entry_key(host, key_id) {
            host.store().borrow_mut().dict_set(&self.key, &entry, &encode_int(value));
        }
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        if !self.valid(host, key_id, FieldType::String) {
            return;
        }
        if let Some(entry) = self.entry_key(host, key_id) {
            host.store().borrow_mut().dict_set(&self.key, &entry, value.as_bytes());
        }
    }
}
