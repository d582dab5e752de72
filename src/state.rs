use std::fmt;

use crate::{
    compile::Unit,
    config::HostConfig,
    diagnostics::{DiagnosticSink, Status},
    runtime::Runtime,
    value::{ObjectRef, Value},
};

/// One embedding session: the global scope, the abort channel, the lexer
/// scratch buffer and the most recently loaded unit.
///
/// Dropping the state (or calling [`State::destroy`]) releases everything
/// exactly once; ownership rules out a second teardown.
pub struct State {
    pub(crate) runtime: Runtime,
    pub(crate) sink: DiagnosticSink,
    pub(crate) loaded: Option<Unit>,
}

impl State {
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        let runtime = Runtime::new(&config);
        tracing::debug!(
            globals = runtime.global().borrow().len(),
            max_call_depth = config.max_call_depth,
            "state created"
        );
        Self {
            runtime,
            sink: DiagnosticSink::new(config.diagnostics),
            loaded: None,
        }
    }

    /// Consumes the state and releases its resources.
    pub fn destroy(self) {
        drop(self);
    }

    /// Writes `error: <message>` to the diagnostic stream and returns
    /// [`Status::Failure`].
    pub fn report(&mut self, message: impl fmt::Display) -> Status {
        self.sink.report(message)
    }

    pub fn global(&self) -> &ObjectRef {
        self.runtime.global()
    }

    /// Reads a top-level binding.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.runtime.global().borrow().get(name)
    }

    pub fn has_loaded_unit(&self) -> bool {
        self.loaded.is_some()
    }

    /// Name of the pending unit, if a load succeeded and it has not run yet.
    pub fn loaded_unit_name(&self) -> Option<&str> {
        self.loaded.as_ref().map(Unit::name)
    }

    /// Bytes currently held by the lexer scratch buffer.
    pub fn scratch_capacity(&self) -> usize {
        self.runtime.scratch_capacity()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.loaded = None;
        let scratch_bytes = self.runtime.teardown();
        tracing::debug!(scratch_bytes, "state destroyed");
    }
}
