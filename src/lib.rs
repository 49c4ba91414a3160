//! Host-side object virtualization for sandboxed contract modules.
//!
//! A guest program never holds a real pointer into host structures: it
//! addresses chain state, outgoing requests and utility primitives through
//! small integer handles (key ids, object ids and type tags) that the host
//! resolves, type-checks and maps onto a persistent key-value store. Faults
//! never cross the sandbox boundary as errors; they latch on the host and
//! turn every further operation of the invocation into a typed no-op.

pub mod constants;
mod host;
mod objects;
mod runner;
mod store;
mod types;

#[cfg(test)]
mod tests;

pub use host::ObjectHost;
pub use objects::{
    ContractObject, HostArray, HostMap, HostObject, NullObject, PostedRequest, PostedRequests,
    RequestParamMap, RequestParams, RequestSink, RootObject, StateArrayObject, StateDictObject,
    StateObject, UtilityObject,
};
pub use runner::{MemoryImage, ModuleRunner, Sandbox};
pub use store::{MemoryStateStore, StateStore};
pub use types::{
    Address, ContractContext, FieldType, HostOptions, Key, RequestId, RunnerError, Value,
};

pub type ExecResult<A> = anyhow::Result<A>;
