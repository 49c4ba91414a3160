//! Reserved ids of the host object protocol.
//!
//! Negative key ids form the fixed, host-defined key namespace; user-defined
//! keys are interned starting at 0 in first-seen order. Object ids 0 and 1 are
//! reserved for the null sentinel and the root object.

/// Object id of the null sentinel. Every operation on it faults.
pub const NULL_OBJECT_ID: i32 = 0;
/// Object id of the root object.
pub const ROOT_OBJECT_ID: i32 = 1;

pub const KEY_ERROR: i32 = -1;
pub const KEY_LENGTH: i32 = -2;
pub const KEY_LOG: i32 = -3;
pub const KEY_TRACE: i32 = -4;
pub const KEY_TRACE_HOST: i32 = -5;
pub const KEY_WARNING: i32 = -6;
pub const KEY_ACCOUNT: i32 = -7;
pub const KEY_ADDRESS: i32 = -8;
pub const KEY_BASE58: i32 = -9;
pub const KEY_CODE: i32 = -10;
pub const KEY_CONTRACT: i32 = -11;
pub const KEY_DELAY: i32 = -12;
pub const KEY_DESCRIPTION: i32 = -13;
pub const KEY_FUNCTION: i32 = -14;
pub const KEY_HASH: i32 = -15;
pub const KEY_ID: i32 = -16;
pub const KEY_NAME: i32 = -17;
pub const KEY_OWNER: i32 = -18;
pub const KEY_PARAMS: i32 = -19;
pub const KEY_POSTED_REQUESTS: i32 = -20;
pub const KEY_RANDOM: i32 = -21;
pub const KEY_REQUEST: i32 = -22;
pub const KEY_STATE: i32 = -23;
pub const KEY_UTILITY: i32 = -24;

/// Length, in bytes, of a contract address.
pub const ADDRESS_LENGTH: usize = 33;
/// Length, in bytes, of a request id.
pub const REQUEST_ID_LENGTH: usize = 34;
/// Length, in bytes, of the domain hash produced by the utility object.
pub const HASH_LENGTH: usize = 32;

/// Target for all log lines emitted by this crate.
pub const LOG_TARGET: &str = "sandbox_host";
