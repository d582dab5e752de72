use std::path::Path;

use crate::{
    abort::Entry,
    diagnostics::Status,
    state::State,
    value::Value,
};

impl State {
    /// Loads `source` and runs it at top level.
    pub fn run_from_string(&mut self, source: &str) -> Status {
        if self.load_from_string(source).is_failure() {
            return Status::Failure;
        }
        self.call_loaded()
    }

    /// Loads the file at `path` and runs it at top level.
    pub fn run_from_file(&mut self, path: impl AsRef<Path>) -> Status {
        if self.load_from_file(path).is_failure() {
            return Status::Failure;
        }
        self.call_loaded()
    }

    /// Runs the pending unit with the global object as receiver and discards
    /// its result. A fault raised during the run is reported and turned into
    /// [`Status::Failure`]; the state stays usable either way.
    pub fn call_loaded(&mut self) -> Status {
        match self.run_loaded() {
            Some(_) => Status::Success,
            None => Status::Failure,
        }
    }

    /// Runs `source` and returns its completion value, or `None` after a
    /// reported load failure or fault.
    pub fn evaluate(&mut self, source: &str) -> Option<Value> {
        if self.load_from_string(source).is_failure() {
            return None;
        }
        self.run_loaded()
    }

    fn run_loaded(&mut self) -> Option<Value> {
        let Some(unit) = self.loaded.take() else {
            let _ = self.report("no compiled unit is loaded");
            return None;
        };
        match Entry::from(self.runtime.execute(&unit)) {
            Entry::Normal(value) => Some(value),
            Entry::Aborted(fault) => {
                tracing::debug!(unit = unit.name(), %fault, "run aborted");
                let _ = self.report(fault);
                None
            }
        }
    }
}
