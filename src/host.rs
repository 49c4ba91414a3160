//! The key/object registry at the center of the host.
//!
//! [`ObjectHost`] is the single authority for key interning, object-id
//! resolution, the error latch and the translation of raw host-call
//! parameters into typed operations on host objects. One instance is bound to
//! one loaded guest module and driven by one caller; nothing here is shared
//! between instances.

use crate::{
    constants::*,
    objects::{HostObject, NullObject, PostedRequests, RootObject},
    store::StateStore,
    types::{ContractContext, FieldType, HostOptions, Key},
};
use log::{info, trace, warn};
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use crate::objects::RequestSink;

fn predefined_key_id(name: &[u8]) -> Option<i32> {
    match name {
        b"error" => Some(KEY_ERROR),
        b"length" => Some(KEY_LENGTH),
        b"log" => Some(KEY_LOG),
        b"trace" => Some(KEY_TRACE),
        b"traceHost" => Some(KEY_TRACE_HOST),
        b"warning" => Some(KEY_WARNING),
        b"account" => Some(KEY_ACCOUNT),
        b"address" => Some(KEY_ADDRESS),
        b"base58" => Some(KEY_BASE58),
        b"code" => Some(KEY_CODE),
        b"contract" => Some(KEY_CONTRACT),
        b"delay" => Some(KEY_DELAY),
        b"description" => Some(KEY_DESCRIPTION),
        b"function" => Some(KEY_FUNCTION),
        b"hash" => Some(KEY_HASH),
        b"id" => Some(KEY_ID),
        b"name" => Some(KEY_NAME),
        b"owner" => Some(KEY_OWNER),
        b"params" => Some(KEY_PARAMS),
        b"postedRequests" => Some(KEY_POSTED_REQUESTS),
        b"random" => Some(KEY_RANDOM),
        b"request" => Some(KEY_REQUEST),
        b"state" => Some(KEY_STATE),
        b"utility" => Some(KEY_UTILITY),
        _ => None,
    }
}

fn predefined_key_name(key_id: i32) -> Option<&'static str> {
    match key_id {
        KEY_ERROR => Some("error"),
        KEY_LENGTH => Some("length"),
        KEY_LOG => Some("log"),
        KEY_TRACE => Some("trace"),
        KEY_TRACE_HOST => Some("traceHost"),
        KEY_WARNING => Some("warning"),
        KEY_ACCOUNT => Some("account"),
        KEY_ADDRESS => Some("address"),
        KEY_BASE58 => Some("base58"),
        KEY_CODE => Some("code"),
        KEY_CONTRACT => Some("contract"),
        KEY_DELAY => Some("delay"),
        KEY_DESCRIPTION => Some("description"),
        KEY_FUNCTION => Some("function"),
        KEY_HASH => Some("hash"),
        KEY_ID => Some("id"),
        KEY_NAME => Some("name"),
        KEY_OWNER => Some("owner"),
        KEY_PARAMS => Some("params"),
        KEY_POSTED_REQUESTS => Some("postedRequests"),
        KEY_RANDOM => Some("random"),
        KEY_REQUEST => Some("request"),
        KEY_STATE => Some("state"),
        KEY_UTILITY => Some("utility"),
        _ => None,
    }
}

/// One host instance: interning tables, object arena, error latch, export
/// table and the host-call dispatch surface.
pub struct ObjectHost {
    options:      HostOptions,
    ctx:          ContractContext,
    store:        Rc<RefCell<dyn StateStore>>,
    sink:         Rc<RefCell<dyn RequestSink>>,
    error:        Option<String>,
    key_to_id:    BTreeMap<Vec<u8>, i32>,
    id_to_key:    Vec<Key>,
    code_to_func: BTreeMap<i32, String>,
    func_to_code: BTreeMap<String, i32>,
    objects:      Vec<Rc<RefCell<dyn HostObject>>>,
}

impl ObjectHost {
    pub fn new(
        options: HostOptions,
        ctx: ContractContext,
        store: Rc<RefCell<dyn StateStore>>,
        sink: Rc<RefCell<dyn RequestSink>>,
    ) -> Self {
        let mut host = Self {
            options,
            ctx,
            store,
            sink,
            error: None,
            key_to_id: BTreeMap::new(),
            id_to_key: Vec::new(),
            code_to_func: BTreeMap::new(),
            func_to_code: BTreeMap::new(),
            objects: Vec::new(),
        };
        host.track(NullObject);
        host.track(RootObject::new());
        host
    }

    pub fn options(&self) -> &HostOptions { &self.options }

    pub fn ctx(&self) -> &ContractContext { &self.ctx }

    pub fn store(&self) -> Rc<RefCell<dyn StateStore>> { self.store.clone() }

    pub(crate) fn sink(&self) -> Rc<RefCell<dyn RequestSink>> { self.sink.clone() }

    // Error latch.

    /// Latches the first fault; later faults never overwrite it.
    pub fn set_error(&mut self, text: &str) {
        trace!(target: LOG_TARGET, "set_error '{text}'");
        if self.error.is_none() {
            self.error = Some(text.to_string());
        }
    }

    /// Latches an object-level fault, prefixed with the object's name.
    pub fn fault(&mut self, name: &str, text: &str) {
        self.set_error(&format!("{name}: {text}"));
    }

    pub fn has_error(&self) -> bool { self.error.is_some() }

    pub fn error(&self) -> Option<&str> { self.error.as_deref() }

    /// Clears the latch. Invoked at every call boundary so a fault gates the
    /// remainder of its own invocation only.
    pub fn clear_error(&mut self) { self.error = None; }

    // Key interning.

    /// Interns a textual key. Reserved names resolve to their fixed negative
    /// ids; unseen keys are assigned the next non-negative id.
    pub fn intern_text(&mut self, key: &str) -> i32 {
        if let Some(key_id) = predefined_key_id(key.as_bytes()) {
            return key_id;
        }
        if let Some(&key_id) = self.key_to_id.get(key.as_bytes()) {
            return key_id;
        }
        self.add_key(Key::Text(key.to_string()))
    }

    /// Interns a raw byte-string key. With the `encode_raw_keys` option the
    /// key is rewritten to its base58 text form first, so both spellings of a
    /// logical key converge to one id.
    pub fn intern_raw(&mut self, key: &[u8]) -> i32 {
        if self.options.encode_raw_keys {
            return self.intern_text(&bs58::encode(key).into_string());
        }
        if let Some(key_id) = predefined_key_id(key) {
            return key_id;
        }
        if let Some(&key_id) = self.key_to_id.get(key) {
            return key_id;
        }
        self.add_key(Key::Raw(key.to_vec()))
    }

    fn add_key(&mut self, key: Key) -> i32 {
        let key_id = self.id_to_key.len() as i32;
        self.key_to_id.insert(key.bytes().to_vec(), key_id);
        self.id_to_key.push(key);
        key_id
    }

    /// The canonical bytes of a key id, or `None` for an id never handed out.
    pub fn key_bytes(&self, key_id: i32) -> Option<Vec<u8>> {
        if key_id < 0 {
            return predefined_key_name(key_id).map(|name| name.as_bytes().to_vec());
        }
        self.id_to_key.get(key_id as usize).map(|key| key.bytes().to_vec())
    }

    /// Readable form of a key, for diagnostics and child-object names. Raw
    /// keys render as base58.
    pub fn key_name(&self, key_id: i32) -> String {
        if key_id < 0 {
            return predefined_key_name(key_id).unwrap_or("<unknown>").to_string();
        }
        match self.id_to_key.get(key_id as usize) {
            Some(Key::Text(text)) => text.clone(),
            Some(Key::Raw(bytes)) => bs58::encode(bytes).into_string(),
            None => "<unknown>".to_string(),
        }
    }

    // Object arena.

    /// Appends an object to the arena and returns its id. Ids are never
    /// reused or freed within a host's lifetime.
    pub fn track_object(&mut self, obj: Rc<RefCell<dyn HostObject>>) -> i32 {
        let obj_id = self.objects.len() as i32;
        self.objects.push(obj);
        obj_id
    }

    pub fn track<O: HostObject + 'static>(&mut self, obj: O) -> i32 {
        self.track_object(Rc::new(RefCell::new(obj)))
    }

    pub(crate) fn object(&self, obj_id: i32) -> Option<Rc<RefCell<dyn HostObject>>> {
        self.objects.get(obj_id as usize).cloned()
    }

    /// Resolves an object id, faulting and falling back to the null object
    /// when the id is outside the allocated range.
    fn resolve(&mut self, obj_id: i32) -> Rc<RefCell<dyn HostObject>> {
        if obj_id >= 0 {
            if let Some(obj) = self.objects.get(obj_id as usize) {
                return obj.clone();
            }
        }
        self.set_error("invalid object id");
        self.objects[NULL_OBJECT_ID as usize].clone()
    }

    // Export table.

    /// Binds a guest entry-point name to an integer code. Duplicate codes and
    /// duplicate names both fault.
    pub fn set_export(&mut self, code: i32, name: &str) {
        if self.code_to_func.contains_key(&code) {
            self.set_error("set_export: duplicate code");
            return;
        }
        if self.func_to_code.contains_key(name) {
            self.set_error("set_export: duplicate function");
            return;
        }
        self.func_to_code.insert(name.to_string(), code);
        self.code_to_func.insert(code, name.to_string());
    }

    pub fn export_code(&self, name: &str) -> Option<i32> { self.func_to_code.get(name).copied() }

    pub fn export_name(&self, code: i64) -> Option<&str> {
        self.code_to_func.get(&(code as i32)).map(String::as_str)
    }

    // Host-call dispatch. Parameters arrive as raw ids plus sandbox-memory
    // offsets and sizes; results are written back into the guest's linear
    // memory.

    /// Interns the key at `key_ref`. A non-negative `size` declares a text
    /// key; a negative `size` encodes `-(len)-1` for a raw byte-string key.
    pub fn get_key_id(&mut self, memory: &[u8], key_ref: u32, size: i32) -> i32 {
        if size >= 0 {
            let Some(bytes) = self.read_memory(memory, key_ref, size as u32) else {
                return 0;
            };
            let Ok(text) = std::str::from_utf8(&bytes) else {
                self.set_error("get_key_id: invalid utf-8 key");
                return 0;
            };
            let key_id = self.intern_text(text);
            trace!(target: LOG_TARGET, "get_key_id '{text}' = k{key_id}");
            return key_id;
        }
        let len = (-size - 1) as u32;
        let Some(bytes) = self.read_memory(memory, key_ref, len) else {
            return 0;
        };
        let key_id = self.intern_raw(&bytes);
        trace!(
            target: LOG_TARGET,
            "get_key_id '{}' = k{key_id}",
            bs58::encode(&bytes).into_string()
        );
        key_id
    }

    /// Copies a value into guest memory and returns its full length. Negative
    /// `obj_id` requests the string form of the key. A missing key yields -1
    /// without fault. Reading the error text through the sentinel pair
    /// `(-1, error)` takes precedence over latch gating.
    pub fn get_bytes(&mut self, memory: &mut [u8], obj_id: i32, key_id: i32, dest: u32, size: u32) -> i32 {
        if obj_id == -ROOT_OBJECT_ID && key_id == KEY_ERROR {
            let text = self.error.clone().unwrap_or_default();
            trace!(target: LOG_TARGET, "get_string o{ROOT_OBJECT_ID} k{key_id} = '{text}'");
            return self.write_memory(memory, dest, size, text.as_bytes());
        }
        if self.has_error() {
            return -1;
        }
        let target = if obj_id < 0 { -obj_id } else { obj_id };
        let obj = self.resolve(target);
        if !obj.borrow().exists(self, key_id) {
            trace!(target: LOG_TARGET, "get_bytes o{target} k{key_id} missing key");
            return -1;
        }
        let value = if obj_id < 0 {
            let text = obj.borrow_mut().get_string(self, key_id);
            trace!(target: LOG_TARGET, "get_string o{target} k{key_id} = '{text}'");
            text.into_bytes()
        } else {
            let bytes = obj.borrow_mut().get_bytes(self, key_id);
            trace!(
                target: LOG_TARGET,
                "get_bytes o{target} k{key_id} = '{}'",
                bs58::encode(&bytes).into_string()
            );
            bytes
        };
        self.write_memory(memory, dest, size, &value)
    }

    /// Reads an integer field. The sentinel pair `(1, error)` polls the latch
    /// instead: 1 when set, 0 otherwise.
    pub fn get_int(&mut self, obj_id: i32, key_id: i32) -> i64 {
        if obj_id == ROOT_OBJECT_ID && key_id == KEY_ERROR {
            return i64::from(self.has_error());
        }
        if self.has_error() {
            return 0;
        }
        let obj = self.resolve(obj_id);
        let value = obj.borrow_mut().get_int(self, key_id);
        trace!(target: LOG_TARGET, "get_int o{obj_id} k{key_id} = {value}");
        value
    }

    /// Resolves (and lazily creates) the child object at a key.
    pub fn get_object_id(&mut self, obj_id: i32, key_id: i32, type_id: i32) -> i32 {
        if self.has_error() {
            return 0;
        }
        let obj = self.resolve(obj_id);
        let child_id = obj.borrow_mut().get_object_id(self, key_id, type_id);
        trace!(target: LOG_TARGET, "get_object_id o{obj_id} k{key_id} t{type_id} = o{child_id}");
        child_id
    }

    /// Typed string read; `(1, error)` returns the latch text.
    pub fn get_string(&mut self, obj_id: i32, key_id: i32) -> String {
        if obj_id == ROOT_OBJECT_ID && key_id == KEY_ERROR {
            return self.error.clone().unwrap_or_default();
        }
        if self.has_error() {
            return String::new();
        }
        let obj = self.resolve(obj_id);
        let value = obj.borrow_mut().get_string(self, key_id);
        trace!(target: LOG_TARGET, "get_string o{obj_id} k{key_id} = '{value}'");
        value
    }

    /// Writes a value from guest memory. Negative `obj_id` means "set as
    /// string" using the same buffer; writes to the reserved logging keys on
    /// the root's string form are intercepted before latch gating.
    pub fn set_bytes(&mut self, memory: &[u8], obj_id: i32, key_id: i32, src: u32, size: u32) {
        let Some(bytes) = self.read_memory(memory, src, size) else {
            return;
        };
        if obj_id < 0 {
            self.set_string(-obj_id, key_id, &String::from_utf8_lossy(&bytes));
            return;
        }
        if self.has_error() {
            return;
        }
        let obj = self.resolve(obj_id);
        obj.borrow_mut().set_bytes(self, key_id, &bytes);
        trace!(
            target: LOG_TARGET,
            "set_bytes o{obj_id} k{key_id} v='{}'",
            bs58::encode(&bytes).into_string()
        );
    }

    pub fn set_int(&mut self, obj_id: i32, key_id: i32, value: i64) {
        if self.has_error() {
            return;
        }
        let obj = self.resolve(obj_id);
        obj.borrow_mut().set_int(self, key_id, value);
        trace!(target: LOG_TARGET, "set_int o{obj_id} k{key_id} v={value}");
    }

    /// Typed string write. Writes to the reserved keys of the root object are
    /// intercepted: `error` latches a guest fault, the logging keys route to
    /// the logger. Interception happens before latch gating so guests can
    /// keep logging after a fault.
    pub fn set_string(&mut self, obj_id: i32, key_id: i32, value: &str) {
        if obj_id == ROOT_OBJECT_ID {
            match key_id {
                KEY_ERROR => return self.set_error(value),
                KEY_LOG | KEY_TRACE | KEY_TRACE_HOST | KEY_WARNING => {
                    return self.log_text(key_id, value)
                }
                _ => {}
            }
        }
        if self.has_error() {
            return;
        }
        let obj = self.resolve(obj_id);
        obj.borrow_mut().set_string(self, key_id, value);
        trace!(target: LOG_TARGET, "set_string o{obj_id} k{key_id} v='{value}'");
    }

    fn log_text(&self, key_id: i32, text: &str) {
        match key_id {
            KEY_LOG => info!(target: LOG_TARGET, "{text}"),
            KEY_WARNING => warn!(target: LOG_TARGET, "{text}"),
            _ => trace!(target: LOG_TARGET, "{text}"),
        }
    }

    /// Flushes the posted-request array, sending every contained request in
    /// index order. A no-op when no requests were posted.
    pub fn dispatch_posted_requests(&mut self) {
        if self.has_error() {
            return;
        }
        let root = self.resolve(ROOT_OBJECT_ID);
        let requests_id = root.borrow_mut().get_object_id(
            self,
            KEY_POSTED_REQUESTS,
            FieldType::MapArray.into(),
        );
        let Some(requests) = self.object(requests_id) else {
            return;
        };
        let mut requests = requests.borrow_mut();
        if let Some(requests) = requests.as_any().downcast_mut::<PostedRequests>() {
            requests.send(self);
        }
    }

    // Guest memory access.

    fn read_memory(&mut self, memory: &[u8], offset: u32, size: u32) -> Option<Vec<u8>> {
        let start = offset as usize;
        let end = start + size as usize;
        if end > memory.len() {
            self.set_error("invalid memory access");
            return None;
        }
        Some(memory[start..end].to_vec())
    }

    /// Writes at most `size` bytes when `size` is non-zero and reports the
    /// value's full length, so guests can size a buffer with a zero-size
    /// probe first.
    fn write_memory(&mut self, memory: &mut [u8], offset: u32, size: u32, bytes: &[u8]) -> i32 {
        if size != 0 {
            let start = offset as usize;
            let end = start + size as usize;
            if end > memory.len() {
                self.set_error("invalid memory access");
                return -1;
            }
            let n = bytes.len().min(size as usize);
            memory[start..start + n].copy_from_slice(&bytes[..n]);
        }
        bytes.len() as i32
    }
}
