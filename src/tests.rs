use crate::{constants::*, store::encode_int, *};
use quickcheck::QuickCheck;
use sha2::{Digest, Sha256};
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

#[derive(Default)]
struct RecordingSink {
    posted: Vec<(i64, Option<RequestParamMap>, u32)>,
}

impl RequestSink for RecordingSink {
    fn post_request(&mut self, code: i64, params: Option<RequestParamMap>, delay: u32) {
        self.posted.push((code, params, delay));
    }
}

struct TestEnv {
    host:  ObjectHost,
    store: Rc<RefCell<MemoryStateStore>>,
    sink:  Rc<RefCell<RecordingSink>>,
}

fn test_context() -> ContractContext {
    ContractContext {
        address:     Address([1u8; ADDRESS_LENGTH]),
        owner:       Address([2u8; ADDRESS_LENGTH]),
        description: "token registry".to_string(),
        request_id:  RequestId([3u8; REQUEST_ID_LENGTH]),
    }
}

fn test_env_with(options: HostOptions, ctx: ContractContext) -> TestEnv {
    let store = Rc::new(RefCell::new(MemoryStateStore::new()));
    let sink = Rc::new(RefCell::new(RecordingSink::default()));
    let host = ObjectHost::new(options, ctx, store.clone(), sink.clone());
    TestEnv {
        host,
        store,
        sink,
    }
}

fn test_env() -> TestEnv { test_env_with(HostOptions::default(), test_context()) }

/// A stand-in for the bytecode engine: a flat memory buffer whose "data
/// section" is the loaded module, and a callback standing in for guest code.
struct FakeSandbox {
    memory:    Vec<u8>,
    on_invoke: Box<dyn FnMut(&mut ObjectHost, &mut [u8], &str) -> ExecResult<()>>,
}

impl FakeSandbox {
    fn new(on_invoke: Box<dyn FnMut(&mut ObjectHost, &mut [u8], &str) -> ExecResult<()>>) -> Self {
        Self {
            memory: vec![0u8; 1024],
            on_invoke,
        }
    }
}

impl Sandbox for FakeSandbox {
    fn load(&mut self, module: &[u8]) -> ExecResult<()> {
        self.memory[256..256 + module.len()].copy_from_slice(module);
        Ok(())
    }

    fn invoke(&mut self, host: &mut ObjectHost, entry_point: &str) -> ExecResult<()> {
        (self.on_invoke)(host, &mut self.memory, entry_point)
    }

    fn memory(&self) -> &[u8] { &self.memory }

    fn memory_mut(&mut self) -> &mut [u8] { &mut self.memory }
}

#[test]
/// Interning is idempotent and injective, and first-seen user keys are
/// assigned strictly increasing non-negative ids.
fn prop_interning_stable_and_injective() {
    let prop = |keys: Vec<Vec<u8>>| -> bool {
        let mut env = test_env();
        let mut seen: BTreeMap<Vec<u8>, i32> = BTreeMap::new();
        let mut last_fresh = -1;
        for key in keys {
            let key_id = env.host.intern_raw(&key);
            if env.host.intern_raw(&key) != key_id {
                return false;
            }
            match seen.get(&key) {
                Some(&prev) => {
                    if prev != key_id {
                        return false;
                    }
                }
                None => {
                    if key_id >= 0 {
                        if key_id <= last_fresh {
                            return false;
                        }
                        last_fresh = key_id;
                    }
                    seen.insert(key, key_id);
                }
            }
        }
        let mut ids: Vec<i32> = seen.values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len() == seen.len()
    };
    QuickCheck::new().tests(200).quickcheck(prop as fn(Vec<Vec<u8>>) -> bool);
}

#[test]
/// Values written one past the end auto-append and read back unchanged.
fn prop_array_append_reads_back() {
    let prop = |values: Vec<i64>| -> bool {
        let mut env = test_env();
        let host = &mut env.host;
        let key = host.intern_text("numbers");
        let arr = host.get_object_id(ROOT_OBJECT_ID, key, FieldType::IntArray.into());
        for (index, value) in values.iter().enumerate() {
            host.set_int(arr, index as i32, *value);
        }
        host.get_int(arr, KEY_LENGTH) == values.len() as i64
            && values.iter().enumerate().all(|(i, v)| host.get_int(arr, i as i32) == *v)
            && !host.has_error()
    };
    QuickCheck::new().tests(100).quickcheck(prop as fn(Vec<i64>) -> bool);
}

#[test]
fn reserved_keys_resolve_to_fixed_negative_ids() {
    let mut env = test_env();
    assert_eq!(env.host.intern_text("error"), KEY_ERROR);
    assert_eq!(env.host.intern_text("length"), KEY_LENGTH);
    assert_eq!(env.host.intern_text("log"), KEY_LOG);
    assert_eq!(env.host.intern_text("trace"), KEY_TRACE);
    assert_eq!(env.host.intern_text("traceHost"), KEY_TRACE_HOST);
    assert_eq!(env.host.intern_text("warning"), KEY_WARNING);
    // user-defined keys start at 0 in first-seen order
    assert_eq!(env.host.intern_text("first"), 0);
    assert_eq!(env.host.intern_text("second"), 1);
    assert_eq!(env.host.intern_text("first"), 0);
}

#[test]
/// With `encode_raw_keys` a raw key and its base58 text form converge to one
/// id; without the option they intern separately.
fn raw_key_rewriting_follows_the_option() {
    let raw = [7u8, 8, 9];
    let text = bs58::encode(raw).into_string();

    let mut env = test_env_with(
        HostOptions {
            encode_raw_keys: true,
        },
        test_context(),
    );
    assert_eq!(env.host.intern_raw(&raw), env.host.intern_text(&text));

    let mut env = test_env();
    assert_ne!(env.host.intern_raw(&raw), env.host.intern_text(&text));
}

#[test]
fn get_key_id_reads_both_key_forms_from_memory() {
    let mut env = test_env();
    let host = &mut env.host;
    let mut memory = vec![0u8; 64];
    memory[..5].copy_from_slice(b"hello");
    let text_id = host.get_key_id(&memory, 0, 5);
    assert_eq!(text_id, host.intern_text("hello"));
    memory[..3].copy_from_slice(&[1, 2, 3]);
    // negative size encodes -(len)-1 for raw byte-string keys
    let raw_id = host.get_key_id(&memory, 0, -4);
    assert_eq!(raw_id, host.intern_raw(&[1, 2, 3]));
    assert_ne!(text_id, raw_id);
    assert!(!host.has_error());
}

#[test]
/// The scenario from the protocol contract: a counter keeps its value and its
/// type; reading it through the wrong type latches and yields "".
fn type_lock_on_root_map() {
    let mut env = test_env();
    let host = &mut env.host;
    let key = host.intern_text("counter");
    assert_eq!(key, host.intern_text("counter"));
    host.set_int(ROOT_OBJECT_ID, key, 42);
    assert_eq!(host.get_int(ROOT_OBJECT_ID, key), 42);
    assert_eq!(host.get_string(ROOT_OBJECT_ID, key), "");
    assert!(host.has_error());
    // the stored value is untouched by the failed access
    host.clear_error();
    assert_eq!(host.get_int(ROOT_OBJECT_ID, key), 42);
}

#[test]
fn string_array_grows_and_clears() {
    let mut env = test_env();
    let host = &mut env.host;
    let key = host.intern_text("items");
    let arr = host.get_object_id(ROOT_OBJECT_ID, key, FieldType::StringArray.into());
    assert!(arr > ROOT_OBJECT_ID);
    host.set_string(arr, 0, "a");
    host.set_string(arr, 1, "b");
    assert_eq!(host.get_int(arr, KEY_LENGTH), 2);
    assert_eq!(host.get_string(arr, 0), "a");
    host.set_int(arr, KEY_LENGTH, 0);
    assert_eq!(host.get_int(arr, KEY_LENGTH), 0);
    assert!(!host.has_error());
}

#[test]
fn array_read_at_length_appends_zero_value() {
    let mut env = test_env();
    let host = &mut env.host;
    let key = host.intern_text("items");
    let arr = host.get_object_id(ROOT_OBJECT_ID, key, FieldType::StringArray.into());
    assert_eq!(host.get_string(arr, 0), "");
    assert_eq!(host.get_int(arr, KEY_LENGTH), 1);
    assert!(!host.has_error());
}

#[test]
fn array_index_out_of_bounds_faults() {
    let mut env = test_env();
    let host = &mut env.host;
    let key = host.intern_text("items");
    let arr = host.get_object_id(ROOT_OBJECT_ID, key, FieldType::StringArray.into());
    host.set_string(arr, 2, "skip");
    assert!(host.error().is_some_and(|e| e.contains("invalid index")));
    host.clear_error();
    host.set_string(arr, -7, "negative");
    assert!(host.error().is_some_and(|e| e.contains("invalid index")));
    host.clear_error();
    host.set_int(arr, KEY_LENGTH, 3);
    assert!(host.error().is_some_and(|e| e.contains("invalid length")));
}

#[test]
fn persistent_scalar_state_round_trips_through_the_store() {
    let mut env = test_env();
    let host = &mut env.host;
    let state = host.get_object_id(ROOT_OBJECT_ID, KEY_STATE, FieldType::Map.into());
    let key = host.intern_text("owner_count");
    host.set_int(state, key, 7);
    assert_eq!(host.get_int(state, key), 7);
    // the backing record is the fixed-width little-endian encoding
    assert_eq!(env.store.borrow().get(b"owner_count"), Some(encode_int(7).to_vec()));
    // first observed type wins, independent of the in-memory maps
    assert_eq!(env.host.get_string(state, key), "");
    assert!(env.host.has_error());
    env.host.clear_error();
    assert_eq!(env.host.get_int(state, key), 7);
}

#[test]
fn persistent_array_appends_and_truncates() {
    let mut env = test_env();
    let host = &mut env.host;
    let state = host.get_object_id(ROOT_OBJECT_ID, KEY_STATE, FieldType::Map.into());
    let key = host.intern_text("history");
    let arr = host.get_object_id(state, key, FieldType::IntArray.into());
    host.set_int(arr, 0, 10);
    host.set_int(arr, 1, 20);
    assert_eq!(host.get_int(arr, KEY_LENGTH), 2);
    assert_eq!(host.get_int(arr, 1), 20);
    assert_eq!(env.store.borrow().seq_get(b"history", 0), encode_int(10).to_vec());
    env.host.set_int(arr, KEY_LENGTH, 0);
    assert_eq!(env.host.get_int(arr, KEY_LENGTH), 0);
    assert!(!env.host.has_error());
}

#[test]
fn persistent_dictionary_stores_entries_and_refuses_truncation() {
    let mut env = test_env();
    let host = &mut env.host;
    let state = host.get_object_id(ROOT_OBJECT_ID, KEY_STATE, FieldType::Map.into());
    let key = host.intern_text("balances");
    let dict = host.get_object_id(state, key, FieldType::Map.into());
    let entry = host.intern_text("alice");
    host.set_string(dict, entry, "100");
    assert_eq!(host.get_string(dict, entry), "100");
    assert_eq!(env.store.borrow().dict_get(b"balances", b"alice"), Some(b"100".to_vec()));
    env.host.set_int(dict, KEY_LENGTH, 0);
    assert!(env.host.error().is_some_and(|e| e.contains("invalid clear")));
}

#[test]
fn state_children_lock_their_structural_type() {
    let mut env = test_env();
    let host = &mut env.host;
    let state = host.get_object_id(ROOT_OBJECT_ID, KEY_STATE, FieldType::Map.into());
    let key = host.intern_text("history");
    let arr = host.get_object_id(state, key, FieldType::IntArray.into());
    assert!(arr > 0);
    // same key requested as a different shape
    assert_eq!(host.get_object_id(state, key, FieldType::Map.into()), 0);
    assert!(host.error().is_some_and(|e| e.contains("invalid type")));
}

#[test]
fn error_latch_first_fault_wins_and_gates_operations() {
    let mut env = test_env();
    let host = &mut env.host;
    host.set_error("first");
    host.set_error("second");
    assert_eq!(host.error(), Some("first"));
    // error poll and error text are the only reads that still work
    assert_eq!(host.get_int(ROOT_OBJECT_ID, KEY_ERROR), 1);
    assert_eq!(host.get_string(ROOT_OBJECT_ID, KEY_ERROR), "first");
    let mut memory = vec![0u8; 64];
    let n = host.get_bytes(&mut memory, -ROOT_OBJECT_ID, KEY_ERROR, 0, 64);
    assert_eq!(&memory[..n as usize], b"first");
    // everything else is a typed no-op
    let key = host.intern_text("x");
    host.set_int(ROOT_OBJECT_ID, key, 5);
    assert_eq!(host.get_int(ROOT_OBJECT_ID, key), 0);
    host.clear_error();
    assert_eq!(host.get_int(ROOT_OBJECT_ID, KEY_ERROR), 0);
}

#[test]
fn guest_error_write_latches_through_the_string_form() {
    let mut env = test_env();
    let host = &mut env.host;
    let mut memory = vec![0u8; 64];
    memory[..4].copy_from_slice(b"oops");
    host.set_bytes(&memory, -ROOT_OBJECT_ID, KEY_ERROR, 0, 4);
    assert_eq!(host.error(), Some("oops"));
    // logging keys stay writable behind the latch
    memory[..4].copy_from_slice(b"late");
    host.set_bytes(&memory, -ROOT_OBJECT_ID, KEY_LOG, 0, 4);
    assert_eq!(host.error(), Some("oops"));
}

#[test]
fn invalid_object_ids_fault() {
    let mut env = test_env();
    let host = &mut env.host;
    let key = host.intern_text("x");
    assert_eq!(host.get_int(99, key), 0);
    assert!(host.error().is_some_and(|e| e.contains("invalid object id")));
    host.clear_error();
    host.set_int(NULL_OBJECT_ID, key, 1);
    assert!(host.error().is_some_and(|e| e.contains("null: invalid access")));
}

#[test]
fn missing_key_reads_as_absent_without_fault() {
    let mut env = test_env();
    let host = &mut env.host;
    let absent = host.intern_text("absent");
    let mut memory = vec![0u8; 16];
    assert_eq!(host.get_bytes(&mut memory, ROOT_OBJECT_ID, absent, 0, 0), -1);
    assert!(!host.has_error());
}

#[test]
fn byte_values_round_trip_through_guest_memory() {
    let mut env = test_env();
    let host = &mut env.host;
    let key = host.intern_text("greeting");
    let mut memory = vec![0u8; 64];
    memory[..5].copy_from_slice(b"hello");
    host.set_bytes(&memory, -ROOT_OBJECT_ID, key, 0, 5);
    assert_eq!(host.get_string(ROOT_OBJECT_ID, key), "hello");
    // a zero-size probe reports the length without writing
    let n = host.get_bytes(&mut memory, -ROOT_OBJECT_ID, key, 8, 0);
    assert_eq!(n, 5);
    assert_eq!(&memory[8..13], &[0u8; 5]);
    let n = host.get_bytes(&mut memory, -ROOT_OBJECT_ID, key, 8, 5);
    assert_eq!(n, 5);
    assert_eq!(&memory[8..13], b"hello");
}

#[test]
fn out_of_range_memory_access_faults() {
    let mut env = test_env();
    let host = &mut env.host;
    let key = host.intern_text("greeting");
    host.set_string(ROOT_OBJECT_ID, key, "hello");
    let mut memory = vec![0u8; 16];
    let n = host.get_bytes(&mut memory, -ROOT_OBJECT_ID, key, 14, 5);
    assert_eq!(n, -1);
    assert!(host.error().is_some_and(|e| e.contains("invalid memory access")));
}

#[test]
fn contract_metadata_is_read_only_with_placeholder_fields() {
    let mut env = test_env();
    let host = &mut env.host;
    let contract = host.get_object_id(ROOT_OBJECT_ID, KEY_CONTRACT, FieldType::Map.into());
    let mut memory = vec![0u8; 64];
    let n = host.get_bytes(&mut memory, contract, KEY_ADDRESS, 0, 64);
    assert_eq!(n as usize, ADDRESS_LENGTH);
    assert_eq!(&memory[..ADDRESS_LENGTH], &[1u8; ADDRESS_LENGTH]);
    let n = host.get_bytes(&mut memory, contract, KEY_OWNER, 0, 64);
    assert_eq!(n as usize, ADDRESS_LENGTH);
    assert_eq!(&memory[..ADDRESS_LENGTH], &[2u8; ADDRESS_LENGTH]);
    assert_eq!(host.get_string(contract, KEY_DESCRIPTION), "token registry");
    assert!(!host.has_error());
    assert_eq!(host.get_string(contract, KEY_NAME), "");
    assert!(host.error().is_some_and(|e| e.contains("invalid access")));
}

#[test]
fn base58_codec_round_trips_through_complementary_accessors() {
    let mut env = test_env();
    let host = &mut env.host;
    let utility = host.get_object_id(ROOT_OBJECT_ID, KEY_UTILITY, FieldType::Map.into());
    let data = [0u8, 1, 2, 3, 254, 255];
    let mut memory = vec![0u8; 64];
    memory[..data.len()].copy_from_slice(&data);
    host.set_bytes(&memory, utility, KEY_BASE58, 0, data.len() as u32);
    let encoded = host.get_string(utility, KEY_BASE58);
    assert_eq!(encoded, bs58::encode(data).into_string());
    host.set_string(utility, KEY_BASE58, &encoded);
    let n = host.get_bytes(&mut memory, utility, KEY_BASE58, 16, 32);
    assert_eq!(&memory[16..16 + n as usize], &data);
    assert!(!host.has_error());
}

#[test]
fn hash_is_the_fixed_length_domain_hash() {
    let mut env = test_env();
    let host = &mut env.host;
    let utility = host.get_object_id(ROOT_OBJECT_ID, KEY_UTILITY, FieldType::Map.into());
    let mut memory = vec![0u8; 64];
    memory[..3].copy_from_slice(b"abc");
    host.set_bytes(&memory, utility, KEY_HASH, 0, 3);
    let n = host.get_bytes(&mut memory, utility, KEY_HASH, 0, 64);
    assert_eq!(n as usize, HASH_LENGTH);
    assert_eq!(&memory[..HASH_LENGTH], Sha256::digest(b"abc").as_slice());
}

fn random_sequence(ctx: ContractContext, reads: usize) -> Vec<i64> {
    let mut env = test_env_with(HostOptions::default(), ctx);
    let host = &mut env.host;
    let utility = host.get_object_id(ROOT_OBJECT_ID, KEY_UTILITY, FieldType::Map.into());
    let values = (0..reads).map(|_| host.get_int(utility, KEY_RANDOM)).collect();
    assert!(!host.has_error());
    values
}

#[test]
/// The same request id reproduces the same sequence, including past the
/// 64-byte re-hash boundary after eight reads.
fn randomness_is_deterministic_per_request_id() {
    let a = random_sequence(test_context(), 12);
    let b = random_sequence(test_context(), 12);
    assert_eq!(a, b);
    let mut other = test_context();
    other.request_id = RequestId([9u8; REQUEST_ID_LENGTH]);
    let c = random_sequence(other, 12);
    assert_ne!(a, c);
}

#[test]
fn posted_request_to_self_is_dispatched_with_params() {
    let mut env = test_env();
    let host = &mut env.host;
    host.set_export(42, "transfer");
    let requests = host.get_object_id(ROOT_OBJECT_ID, KEY_POSTED_REQUESTS, FieldType::MapArray.into());
    let request = host.get_object_id(requests, 0, FieldType::Map.into());
    let own = host.ctx().address.0;
    let mut memory = vec![0u8; 64];
    memory[..ADDRESS_LENGTH].copy_from_slice(&own);
    host.set_bytes(&memory, request, KEY_CONTRACT, 0, ADDRESS_LENGTH as u32);
    host.set_string(request, KEY_FUNCTION, "transfer");
    host.set_int(request, KEY_DELAY, 5);
    let params = host.get_object_id(request, KEY_PARAMS, FieldType::Map.into());
    let amount = host.intern_text("amount");
    host.set_int(params, amount, 500);
    assert!(!host.has_error());

    host.dispatch_posted_requests();
    let sink = env.sink.borrow();
    assert_eq!(sink.posted.len(), 1);
    let (code, params, delay) = &sink.posted[0];
    assert_eq!(*code, 42);
    assert_eq!(*delay, 5);
    let params = params.as_ref().expect("params were not empty");
    assert_eq!(params.get(b"amount".as_slice()), Some(&encode_int(500).to_vec()));
}

#[test]
fn posted_request_to_foreign_target_is_retained_but_not_dispatched() {
    let mut env = test_env();
    let host = &mut env.host;
    host.set_export(42, "transfer");
    let requests = host.get_object_id(ROOT_OBJECT_ID, KEY_POSTED_REQUESTS, FieldType::MapArray.into());
    let request = host.get_object_id(requests, 0, FieldType::Map.into());
    let mut memory = vec![0u8; 64];
    memory[..ADDRESS_LENGTH].copy_from_slice(&[9u8; ADDRESS_LENGTH]);
    host.set_bytes(&memory, request, KEY_CONTRACT, 0, ADDRESS_LENGTH as u32);
    host.set_string(request, KEY_FUNCTION, "transfer");
    host.dispatch_posted_requests();
    assert!(env.sink.borrow().posted.is_empty());
    // the request stays in the tree
    assert_eq!(env.host.get_int(requests, KEY_LENGTH), 1);
    let n = env.host.get_bytes(&mut memory, request, KEY_CONTRACT, 0, 64);
    assert_eq!(n as usize, ADDRESS_LENGTH);
    assert_eq!(&memory[..ADDRESS_LENGTH], &[9u8; ADDRESS_LENGTH]);
}

#[test]
fn posted_requests_flush_in_index_order_and_clear_by_length() {
    let mut env = test_env();
    let host = &mut env.host;
    host.set_export(1, "first");
    host.set_export(2, "second");
    let requests = host.get_object_id(ROOT_OBJECT_ID, KEY_POSTED_REQUESTS, FieldType::MapArray.into());
    let own = host.ctx().address.0;
    let mut memory = vec![0u8; 64];
    memory[..ADDRESS_LENGTH].copy_from_slice(&own);
    for (index, function) in ["first", "second"].iter().enumerate() {
        let request = host.get_object_id(requests, index as i32, FieldType::Map.into());
        host.set_bytes(&memory, request, KEY_CONTRACT, 0, ADDRESS_LENGTH as u32);
        host.set_string(request, KEY_FUNCTION, function);
    }
    host.dispatch_posted_requests();
    {
        let sink = env.sink.borrow();
        assert_eq!(sink.posted.len(), 2);
        assert_eq!(sink.posted[0].0, 1);
        assert_eq!(sink.posted[1].0, 2);
    }
    env.host.set_int(requests, KEY_LENGTH, 0);
    assert_eq!(env.host.get_int(requests, KEY_LENGTH), 0);
}

#[test]
fn unknown_function_name_faults() {
    let mut env = test_env();
    let host = &mut env.host;
    let requests = host.get_object_id(ROOT_OBJECT_ID, KEY_POSTED_REQUESTS, FieldType::MapArray.into());
    let request = host.get_object_id(requests, 0, FieldType::Map.into());
    host.set_string(request, KEY_FUNCTION, "missing");
    assert!(host.error().is_some_and(|e| e.contains("invalid function: missing")));
}

#[test]
fn duplicate_exports_fault() {
    let mut env = test_env();
    let host = &mut env.host;
    host.set_export(1, "transfer");
    host.set_export(1, "mint");
    assert!(host.error().is_some_and(|e| e.contains("duplicate code")));
    host.clear_error();
    host.set_export(2, "transfer");
    assert!(host.error().is_some_and(|e| e.contains("duplicate function")));
}

#[test]
/// Invocation N+1 observes memory byte-for-byte equal to the image captured
/// at load time, no matter what invocation N wrote.
fn memory_is_pristine_for_every_invocation() {
    let module = [0xDEu8, 0xAD, 0xBE, 0xEF];
    let on_invoke = Box::new(move |_host: &mut ObjectHost, memory: &mut [u8], _entry: &str| {
        // every call starts from the load-time image
        assert_eq!(&memory[..4], &[0u8; 4]);
        assert_eq!(&memory[256..260], &module);
        // scribble over both the zeroed range and the data section
        memory[0] = 0xAA;
        memory[256] = 0;
        Ok(())
    });
    let env = test_env();
    let mut runner = ModuleRunner::new(FakeSandbox::new(on_invoke), env.host);
    runner.load_module(&module).expect("load succeeds");
    runner.call_entry_point("step").expect("first call succeeds");
    runner.call_entry_point("step").expect("second call succeeds");
    assert_eq!(runner.sandbox().memory()[0], 0xAA);
}

#[test]
/// A fault in one invocation does not gate the next one.
fn error_latch_resets_at_the_call_boundary() {
    let on_invoke =
        Box::new(|host: &mut ObjectHost, _memory: &mut [u8], entry: &str| {
            if entry == "fail" {
                host.set_error("guest fault");
            } else {
                assert!(!host.has_error());
                let key = host.intern_text("counter");
                host.set_int(ROOT_OBJECT_ID, key, 1);
                assert_eq!(host.get_int(ROOT_OBJECT_ID, key), 1);
            }
            Ok(())
        });
    let env = test_env();
    let mut runner = ModuleRunner::new(FakeSandbox::new(on_invoke), env.host);
    runner.load_module(&[1, 2, 3]).expect("load succeeds");
    runner.call_entry_point("fail").expect("faults latch instead of erroring");
    assert!(runner.host().has_error());
    runner.call_entry_point("work").expect("second call succeeds");
    assert!(!runner.host().has_error());
}

#[test]
fn calling_before_load_is_an_error() {
    let env = test_env();
    let sandbox = FakeSandbox::new(Box::new(|_, _, _| Ok(())));
    let mut runner = ModuleRunner::new(sandbox, env.host);
    assert!(runner.call_entry_point("step").is_err());
}
