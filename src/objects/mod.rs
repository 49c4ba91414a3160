//! The polymorphic host objects of the sandbox protocol.
//!
//! Every capability a guest can address through an object id implements
//! [`HostObject`]: in-memory maps and arrays, the persistent-state proxies,
//! contract metadata, the utility object and the outgoing-request tree. The
//! default trait methods fault with "invalid access", so a variant only
//! implements the accessors it actually supports.

pub(crate) mod contract;
pub(crate) mod request;
pub(crate) mod state;
pub(crate) mod utility;

use crate::{
    constants::KEY_LENGTH,
    host::ObjectHost,
    types::{FieldType, Value},
};
use std::{any::Any, collections::BTreeMap};

pub use contract::ContractObject;
pub use request::{PostedRequest, PostedRequests, RequestParamMap, RequestParams, RequestSink};
pub use state::{StateArrayObject, StateDictObject, StateObject};
pub use utility::UtilityObject;

/// The common accessor surface of every host object. Accessors never return
/// errors; a failed access latches a fault on the host and yields the zero
/// value of the attempted type.
pub trait HostObject {
    fn as_any(&mut self) -> &mut dyn Any;

    /// Diagnostic name, used as the prefix of fault messages.
    fn name(&self) -> &str;

    fn exists(&self, _host: &mut ObjectHost, _key_id: i32) -> bool { false }

    /// The locked field type of a key, or -1 when the key has none.
    fn type_of(&self, _key_id: i32) -> i32 { -1 }

    fn get_bytes(&mut self, host: &mut ObjectHost, _key_id: i32) -> Vec<u8> {
        host.fault(self.name(), "invalid access");
        Vec::new()
    }

    fn get_int(&mut self, host: &mut ObjectHost, _key_id: i32) -> i64 {
        host.fault(self.name(), "invalid access");
        0
    }

    fn get_object_id(&mut self, host: &mut ObjectHost, _key_id: i32, _type_id: i32) -> i32 {
        host.fault(self.name(), "invalid access");
        0
    }

    fn get_string(&mut self, host: &mut ObjectHost, _key_id: i32) -> String {
        host.fault(self.name(), "invalid access");
        String::new()
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, _key_id: i32, _value: &[u8]) {
        host.fault(self.name(), "invalid access");
    }

    fn set_int(&mut self, host: &mut ObjectHost, _key_id: i32, _value: i64) {
        host.fault(self.name(), "invalid access");
    }

    fn set_string(&mut self, host: &mut ObjectHost, _key_id: i32, _value: &str) {
        host.fault(self.name(), "invalid access");
    }
}

/// Creates a child object and returns its freshly assigned object id.
pub(crate) type ObjectFactory = Box<dyn FnOnce(&mut ObjectHost) -> i32>;

/// Shared map addressing: a key maps to at most one child object, created
/// lazily on first structural access. Requesting an existing child, or a key
/// locked to a scalar type, with a different type id is a fault.
pub(crate) fn map_child_id(
    host: &mut ObjectHost,
    name: &str,
    types: &mut BTreeMap<i32, i32>,
    children: &mut BTreeMap<i32, i32>,
    key_id: i32,
    type_id: i32,
    factory: ObjectFactory,
) -> i32 {
    if let Some(&child_id) = children.get(&key_id) {
        if types.get(&key_id) != Some(&type_id) {
            host.fault(name, "invalid type");
            return 0;
        }
        return child_id;
    }
    if let Some(&locked) = types.get(&key_id) {
        if locked != type_id {
            host.fault(name, "invalid type");
            return 0;
        }
    }
    let child_id = factory(host);
    children.insert(key_id, child_id);
    types.insert(key_id, type_id);
    child_id
}

/// Shared array addressing for object children: indices are dense, an access
/// at `length` auto-appends, anything outside `[0, length]` is a fault. Array
/// children are always maps.
pub(crate) fn array_child_id(
    host: &mut ObjectHost,
    name: &str,
    children: &mut Vec<i32>,
    index: i32,
    type_id: i32,
    factory: ObjectFactory,
) -> i32 {
    if type_id != i32::from(FieldType::Map) {
        host.fault(name, "invalid type");
        return 0;
    }
    let length = children.len() as i32;
    if index < 0 || index > length {
        host.fault(name, "invalid index");
        return 0;
    }
    if index < length {
        return children[index as usize];
    }
    let child_id = factory(host);
    children.push(child_id);
    child_id
}

/// The null sentinel at object id 0. Reports "invalid access" for every
/// operation through the trait defaults.
pub struct NullObject;

impl HostObject for NullObject {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { "null" }
}

/// General-purpose in-memory map object. Scalar fields carry a per-key type
/// lock; structural keys lazily create generic sub-maps and sub-arrays.
pub struct HostMap {
    name:     String,
    fields:   BTreeMap<i32, Value>,
    types:    BTreeMap<i32, i32>,
    children: BTreeMap<i32, i32>,
}

impl HostMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:     name.into(),
            fields:   BTreeMap::new(),
            types:    BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }

    /// First-access type lock. The first get or set of a key fixes its type;
    /// any later access with a different type faults.
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
}

impl HostObject for HostMap {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, _host: &mut ObjectHost, key_id: i32) -> bool {
        self.fields.contains_key(&key_id) || self.children.contains_key(&key_id)
    }

    fn type_of(&self, key_id: i32) -> i32 { self.types.get(&key_id).copied().unwrap_or(-1) }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        if !self.valid(host, key_id, FieldType::Bytes) {
            return Vec::new();
        }
        match self.fields.get(&key_id) {
            Some(Value::Bytes(bytes)) => bytes.clone(),
            _ => Vec::new(),
        }
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        if key_id == KEY_LENGTH {
            host.fault(&self.name, "invalid access");
            return 0;
        }
        if !self.valid(host, key_id, FieldType::Int) {
            return 0;
        }
        match self.fields.get(&key_id) {
            Some(Value::Int(value)) => *value,
            _ => 0,
        }
    }

    fn get_object_id(&mut self, host: &mut ObjectHost, key_id: i32, type_id: i32) -> i32 {
        let child_name = format!("{}.{}", self.name, host.key_name(key_id));
        let factory: ObjectFactory = match FieldType::try_from(type_id) {
            Ok(FieldType::Map) => Box::new(move |host| host.track(HostMap::new(child_name))),
            Ok(
                FieldType::BytesArray
                | FieldType::IntArray
                | FieldType::MapArray
                | FieldType::StringArray,
            ) => Box::new(move |host| host.track(HostArray::new(child_name, type_id - 1))),
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
        match self.fields.get(&key_id) {
            Some(Value::String(text)) => text.clone(),
            _ => String::new(),
        }
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, key_id: i32, value: &[u8]) {
        if self.valid(host, key_id, FieldType::Bytes) {
            self.fields.insert(key_id, Value::Bytes(value.to_vec()));
        }
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        if key_id == KEY_LENGTH {
            if value == 0 {
                // Type locks survive a clear; only the data and the child
                // objects are dropped.
                self.fields.clear();
                self.children.clear();
            } else {
                host.fault(&self.name, "invalid length");
            }
            return;
        }
        if self.valid(host, key_id, FieldType::Int) {
            self.fields.insert(key_id, Value::Int(value));
        }
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        if self.valid(host, key_id, FieldType::String) {
            self.fields.insert(key_id, Value::String(value.to_string()));
        }
    }
}

/// General-purpose in-memory array object with a single element type fixed at
/// creation. Scalar arrays store values, map arrays store child object ids.
pub struct HostArray {
    name:      String,
    elem_type: i32,
    items:     Vec<Value>,
    children:  Vec<i32>,
}

impl HostArray {
    pub fn new(name: impl Into<String>, elem_type: i32) -> Self {
        Self {
            name: name.into(),
            elem_type,
            items: Vec::new(),
            children: Vec::new(),
        }
    }

    fn length(&self) -> i32 {
        if self.elem_type == i32::from(FieldType::Map) {
            self.children.len() as i32
        } else {
            self.items.len() as i32
        }
    }

    /// Bounds check plus the auto-append rule: touching the index one past the
    /// end with the element type appends that type's zero value.
    fn valid(&mut self, host: &mut ObjectHost, index: i32, field_type: FieldType) -> bool {
        if i32::from(field_type) != self.elem_type {
            host.fault(&self.name, "invalid access");
            return false;
        }
        let length = self.items.len() as i32;
        if index == length {
            self.items.push(Value::zero(field_type));
            return true;
        }
        if index < 0 || index > length {
            host.fault(&self.name, "invalid index");
            return false;
        }
        true
    }
}

impl HostObject for HostArray {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, _host: &mut ObjectHost, key_id: i32) -> bool {
        key_id >= 0 && key_id <= self.length()
    }

    fn type_of(&self, key_id: i32) -> i32 {
        if key_id == KEY_LENGTH {
            return FieldType::Int.into();
        }
        if key_id >= 0 && key_id <= self.length() {
            self.elem_type
        } else {
            -1
        }
    }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        if !self.valid(host, key_id, FieldType::Bytes) {
            return Vec::new();
        }
        match &self.items[key_id as usize] {
            Value::Bytes(bytes) => bytes.clone(),
            _ => Vec::new(),
        }
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        if key_id == KEY_LENGTH {
            return i64::from(self.length());
        }
        if !self.valid(host, key_id, FieldType::Int) {
            return 0;
        }
        match &self.items[key_id as usize] {
            Value::Int(value) => *value,
            _ => 0,
        }
    }

    fn get_object_id(&mut self, host: &mut ObjectHost, key_id: i32, type_id: i32) -> i32 {
        if self.elem_type != i32::from(FieldType::Map) {
            host.fault(&self.name, "invalid type");
            return 0;
        }
        let child_name = format!("{}.{}", self.name, key_id);
        array_child_id(
            host,
            &self.name,
            &mut self.children,
            key_id,
            type_id,
            Box::new(move |host| host.track(HostMap::new(child_name))),
        )
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        if !self.valid(host, key_id, FieldType::String) {
            return String::new();
        }
        match &self.items[key_id as usize] {
            Value::String(text) => text.clone(),
            _ => String::new(),
        }
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, key_id: i32, value: &[u8]) {
        if self.valid(host, key_id, FieldType::Bytes) {
            self.items[key_id as usize] = Value::Bytes(value.to_vec());
        }
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        if key_id == KEY_LENGTH {
            if value == 0 {
                self.items.clear();
                self.children.clear();
            } else {
                host.fault(&self.name, "invalid length");
            }
            return;
        }
        if self.valid(host, key_id, FieldType::Int) {
            self.items[key_id as usize] = Value::Int(value);
        }
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        if self.valid(host, key_id, FieldType::String) {
            self.items[key_id as usize] = Value::String(value.to_string());
        }
    }
}

/// The root object at object id 1. Behaves as a generic map for user keys and
/// hands out the fixed capability children: contract metadata, persistent
/// state, the utility object, the posted-request array and the incoming
/// request map.
pub struct RootObject {
    map: HostMap,
}

impl RootObject {
    pub fn new() -> Self {
        Self {
            map: HostMap::new("root"),
        }
    }
}

impl Default for RootObject {
    fn default() -> Self { Self::new() }
}

impl HostObject for RootObject {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { "root" }

    fn exists(&self, host: &mut ObjectHost, key_id: i32) -> bool {
        use crate::constants::{
            KEY_CONTRACT, KEY_POSTED_REQUESTS, KEY_REQUEST, KEY_STATE, KEY_UTILITY,
        };
        matches!(
            key_id,
            KEY_CONTRACT | KEY_POSTED_REQUESTS | KEY_REQUEST | KEY_STATE | KEY_UTILITY
        ) || self.map.exists(host, key_id)
    }

    fn type_of(&self, key_id: i32) -> i32 { self.map.type_of(key_id) }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        self.map.get_bytes(host, key_id)
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        self.map.get_int(host, key_id)
    }

    fn get_object_id(&mut self, host: &mut ObjectHost, key_id: i32, type_id: i32) -> i32 {
        use crate::constants::{
            KEY_CONTRACT, KEY_POSTED_REQUESTS, KEY_REQUEST, KEY_STATE, KEY_UTILITY,
        };
        let (expected, factory): (FieldType, ObjectFactory) = match key_id {
            KEY_CONTRACT => {
                (FieldType::Map, Box::new(|host| host.track(ContractObject::new("contract"))))
            }
            KEY_STATE => (FieldType::Map, Box::new(|host| host.track(StateObject::new("state")))),
            KEY_UTILITY => {
                (FieldType::Map, Box::new(|host| host.track(UtilityObject::new("utility"))))
            }
            KEY_POSTED_REQUESTS => (
                FieldType::MapArray,
                Box::new(|host| host.track(PostedRequests::new("postedRequests"))),
            ),
            KEY_REQUEST => (FieldType::Map, Box::new(|host| host.track(HostMap::new("request")))),
            _ => return self.map.get_object_id(host, key_id, type_id),
        };
        if type_id != i32::from(expected) {
            host.fault("root", "invalid type");
            return 0;
        }
        map_child_id(
            host,
            "root",
            &mut self.map.types,
            &mut self.map.children,
            key_id,
            type_id,
            factory,
        )
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        self.map.get_string(host, key_id)
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, key_id: i32, value: &[u8]) {
        self.map.set_bytes(host, key_id, value)
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        self.map.set_int(host, key_id, value)
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        self.map.set_string(host, key_id, value)
    }
}
