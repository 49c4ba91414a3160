//! The outgoing-request tree and its dispatch boundary.

use crate::{
    constants::{
        KEY_CODE, KEY_CONTRACT, KEY_DELAY, KEY_FUNCTION, KEY_LENGTH, KEY_PARAMS, LOG_TARGET,
    },
    host::ObjectHost,
    objects::{array_child_id, map_child_id, HostObject},
    store::{decode_int, encode_int},
    types::FieldType,
};
use log::trace;
use std::{any::Any, collections::BTreeMap};

/// Parameters of a posted request: raw byte keys to raw byte values, with
/// integers encoded as fixed-width 8-byte little-endian records.
pub type RequestParamMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// Where self-addressed posted requests are delivered. The chain's
/// request-dispatch pipeline implements this; an empty parameter map is
/// delivered as `None`.
pub trait RequestSink {
    fn post_request(&mut self, code: i64, params: Option<RequestParamMap>, delay: u32);
}

/// One outgoing request under construction: target contract, function code,
/// delay and a parameter sub-map. Function names resolve through the export
/// table; unknown names fault.
pub struct PostedRequest {
    name:     String,
    contract: Vec<u8>,
    code:     i64,
    delay:    i64,
    types:    BTreeMap<i32, i32>,
    children: BTreeMap<i32, i32>,
}

impl PostedRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:     name.into(),
            contract: Vec::new(),
            code:     0,
            delay:    0,
            types:    BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }

    /// Sends this request if it addresses the executing contract itself.
    /// Requests for any other target stay in the tree; dispatching those is
    /// not supported.
    pub(crate) fn send(&mut self, host: &mut ObjectHost) {
        let function = host.export_name(self.code).unwrap_or_default().to_string();
        trace!(
            target: LOG_TARGET,
            "request f'{}' c{} d{}",
            function,
            self.code,
            self.delay
        );
        if self.contract.as_slice() != host.ctx().address.0.as_slice() {
            return;
        }
        let params = self.children.get(&KEY_PARAMS).copied().and_then(|child_id| {
            let child = host.object(child_id)?;
            let mut child = child.borrow_mut();
            let params = child.as_any().downcast_mut::<RequestParams>()?;
            if params.entries.is_empty() {
                None
            } else {
                Some(params.entries.clone())
            }
        });
        host.sink().borrow_mut().post_request(self.code, params, self.delay as u32);
    }
}

impl HostObject for PostedRequest {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, _host: &mut ObjectHost, key_id: i32) -> bool { self.type_of(key_id) >= 0 }

    fn type_of(&self, key_id: i32) -> i32 {
        match key_id {
            KEY_CODE | KEY_DELAY => FieldType::Int.into(),
            KEY_CONTRACT => FieldType::Bytes.into(),
            KEY_FUNCTION => FieldType::String.into(),
            KEY_PARAMS => FieldType::Map.into(),
            _ => -1,
        }
    }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        match key_id {
            KEY_CONTRACT => self.contract.clone(),
            _ => {
                host.fault(&self.name, "invalid access");
                Vec::new()
            }
        }
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        match key_id {
            KEY_CODE => self.code,
            KEY_DELAY => self.delay,
            _ => {
                host.fault(&self.name, "invalid access");
                0
            }
        }
    }

    fn get_object_id(&mut self, host: &mut ObjectHost, key_id: i32, type_id: i32) -> i32 {
        if key_id != KEY_PARAMS {
            host.fault(&self.name, "invalid key");
            return 0;
        }
        if type_id != i32::from(FieldType::Map) {
            host.fault(&self.name, "invalid type");
            return 0;
        }
        let name = format!("{}.params", self.name);
        map_child_id(
            host,
            &self.name,
            &mut self.types,
            &mut self.children,
            key_id,
            type_id,
            Box::new(move |host| host.track(RequestParams::new(name))),
        )
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        match key_id {
            KEY_FUNCTION => host.export_name(self.code).unwrap_or_default().to_string(),
            _ => {
                host.fault(&self.name, "invalid access");
                String::new()
            }
        }
    }

    fn set_bytes(&mut self, host: &mut ObjectHost, key_id: i32, value: &[u8]) {
        match key_id {
            KEY_CONTRACT => self.contract = value.to_vec(),
            _ => host.fault(&self.name, "invalid access"),
        }
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        match key_id {
            KEY_LENGTH if value == 0 => {
                self.contract.clear();
                self.code = 0;
                self.delay = 0;
            }
            KEY_LENGTH => host.fault(&self.name, "invalid length"),
            KEY_CODE => self.code = value,
            KEY_DELAY => self.delay = value,
            _ => host.fault(&self.name, "invalid access"),
        }
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        match key_id {
            KEY_FUNCTION => match host.export_code(value) {
                Some(code) => self.code = i64::from(code),
                None => host.fault(&self.name, &format!("invalid function: {value}")),
            },
            _ => host.fault(&self.name, "invalid access"),
        }
    }
}

/// The array of requests posted during the current invocation. Flushing sends
/// every contained request in index order.
pub struct PostedRequests {
    name:     String,
    children: Vec<i32>,
}

impl PostedRequests {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:     name.into(),
            children: Vec::new(),
        }
    }

    pub(crate) fn send(&mut self, host: &mut ObjectHost) {
        for &child_id in &self.children {
            let Some(child) = host.object(child_id) else {
                continue;
            };
            let mut child = child.borrow_mut();
            if let Some(request) = child.as_any().downcast_mut::<PostedRequest>() {
                request.send(host);
            }
        }
    }
}

impl HostObject for PostedRequests {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, _host: &mut ObjectHost, key_id: i32) -> bool {
        key_id >= 0 && key_id <= self.children.len() as i32
    }

    fn type_of(&self, key_id: i32) -> i32 {
        if key_id == KEY_LENGTH {
            return FieldType::Int.into();
        }
        if key_id >= 0 && key_id <= self.children.len() as i32 {
            FieldType::Map.into()
        } else {
            -1
        }
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        if key_id == KEY_LENGTH {
            return self.children.len() as i64;
        }
        host.fault(&self.name, "invalid access");
        0
    }

    fn get_object_id(&mut self, host: &mut ObjectHost, key_id: i32, type_id: i32) -> i32 {
        let name = format!("{}.{}", self.name, key_id);
        array_child_id(
            host,
            &self.name,
            &mut self.children,
            key_id,
            type_id,
            Box::new(move |host| host.track(PostedRequest::new(name))),
        )
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        if key_id == KEY_LENGTH {
            if value == 0 {
                self.children.clear();
            } else {
                host.fault(&self.name, "invalid length");
            }
            return;
        }
        host.fault(&self.name, "invalid access");
    }
}

/// Parameter map of a posted request. A flat byte-keyed map with a local type
/// lock; structural children are not supported.
pub struct RequestParams {
    name:    String,
    entries: RequestParamMap,
    types:   BTreeMap<i32, i32>,
}

impl RequestParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:    name.into(),
            entries: RequestParamMap::new(),
            types:   BTreeMap::new(),
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

impl HostObject for RequestParams {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, host: &mut ObjectHost, key_id: i32) -> bool {
        match host.key_bytes(key_id) {
            Some(entry) => self.entries.contains_key(&entry),
            None => false,
        }
    }

    fn type_of(&self, key_id: i32) -> i32 { self.types.get(&key_id).copied().unwrap_or(-1) }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        if !self.valid(host, key_id, FieldType::Bytes) {
            return Vec::new();
        }
        match self.entry_key(host, key_id) {
            Some(entry) => self.entries.get(&entry).cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn get_int(&mut self, host: &mut ObjectHost, key_id: i32) -> i64 {
        if !self.valid(host, key_id, FieldType::Int) {
            return 0;
        }
        match self.entry_key(host, key_id) {
            Some(entry) => decode_int(self.entries.get(&entry).map_or(&[][..], Vec::as_slice)),
            None => 0,
        }
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        if !self.valid(host, key_id, FieldType::String) {
            return String::new();
        }
        match self.entry_key(host, key_id) {
            Some(entry) => {
                let value = self.entries.get(&entry).cloned().unwrap_or_default();
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
            self.entries.insert(entry, value.to_vec());
        }
    }

    fn set_int(&mut self, host: &mut ObjectHost, key_id: i32, value: i64) {
        if key_id == KEY_LENGTH {
            if value == 0 {
                self.entries.clear();
            } else {
                host.fault(&self.name, "invalid length");
            }
            return;
        }
        if !self.valid(host, key_id, FieldType::Int) {
            return;
        }
        if let Some(entry) = self.entry_key(host, key_id) {
            self.entries.insert(entry, encode_int(value).to_vec());
        }
    }

    fn set_string(&mut self, host: &mut ObjectHost, key_id: i32, value: &str) {
        if !self.valid(host, key_id, FieldType::String) {
            return;
        }
        if let Some(entry) = self.entry_key(host, key_id) {
            self.entries.insert(entry, value.as_bytes().to_vec());
        }
    }
}
