//! Module loading and the pristine-memory-per-call discipline.

use crate::{host::ObjectHost, types::RunnerError, ExecResult};
use anyhow::ensure;

/// The bytecode execution engine this crate drives. The engine exposes its
/// linear memory and calls back into the [`ObjectHost`] passed to `invoke`
/// for every host call the guest makes.
pub trait Sandbox {
    fn load(&mut self, module: &[u8]) -> ExecResult<()>;

    fn invoke(&mut self, host: &mut ObjectHost, entry_point: &str) -> ExecResult<()>;

    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];
}

/// Copy of the non-zero byte range of the guest's linear memory, captured
/// once at load time. Restoring zeroes the whole memory and reinstates the
/// range, so every invocation starts from the same byte-exact initial state.
pub struct MemoryImage {
    start: usize,
    bytes: Vec<u8>,
}

impl MemoryImage {
    pub fn capture(memory: &[u8]) -> Self {
        match memory.iter().position(|&b| b != 0) {
            Some(first) => {
                let last = memory.iter().rposition(|&b| b != 0).unwrap_or(first);
                Self {
                    start: first,
                    bytes: memory[first..=last].to_vec(),
                }
            }
            None => Self {
                start: 0,
                bytes: Vec::new(),
            },
        }
    }

    pub fn restore(&self, memory: &mut [u8]) {
        memory.fill(0);
        let end = self.start + self.bytes.len();
        if end <= memory.len() {
            memory[self.start..end].copy_from_slice(&self.bytes);
        }
    }
}

/// Owns one loaded guest module and the host instance bound to it, and gives
/// each entry-point invocation the illusion of a freshly-initialized sandbox.
pub struct ModuleRunner<S> {
    sandbox: S,
    host:    ObjectHost,
    image:   Option<MemoryImage>,
    dirty:   bool,
}

impl<S: Sandbox> ModuleRunner<S> {
    pub fn new(sandbox: S, host: ObjectHost) -> Self {
        Self {
            sandbox,
            host,
            image: None,
            dirty: false,
        }
    }

    pub fn host(&self) -> &ObjectHost { &self.host }

    pub fn host_mut(&mut self) -> &mut ObjectHost { &mut self.host }

    pub fn sandbox(&self) -> &S { &self.sandbox }

    /// Loads the guest module and captures the initial memory image.
    pub fn load_module(&mut self, module: &[u8]) -> ExecResult<()> {
        ensure!(!module.is_empty(), RunnerError::EmptyModule);
        self.sandbox.load(module)?;
        self.image = Some(MemoryImage::capture(self.sandbox.memory()));
        self.dirty = false;
        Ok(())
    }

    /// Runs a guest entry point. Before every invocation after the first the
    /// linear memory is reset to the load-time image, and the error latch is
    /// cleared so a fault gates only the call that raised it. Posted requests
    /// are flushed after a fault-free run.
    pub fn call_entry_point(&mut self, entry_point: &str) -> ExecResult<()> {
        let image = self.image.as_ref().ok_or(RunnerError::ModuleNotLoaded)?;
        if self.dirty {
            image.restore(self.sandbox.memory_mut());
        }
        self.dirty = true;
        self.host.clear_error();
        self.sandbox.invoke(&mut self.host, entry_point)?;
        if !self.host.has_error() {
            self.host.dispatch_posted_requests();
        }
        Ok(())
    }
}
