//! Embeddable script execution host.
//!
//! A [`State`] owns a global scope with `print` and `eval` installed. Source
//! text is loaded from memory or from a file into a compiled unit, which is
//! then run at top level. Load failures come back as [`Status::Failure`]
//! after a diagnostic is written; faults raised while a unit runs abort to
//! the `run_*` call that started it and are reported the same way.

pub mod abort;
pub mod ast;
pub mod buffer;
pub mod builtins;
pub mod compile;
pub mod config;
pub mod diagnostics;
mod driver;
pub mod environment;
pub mod heap;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod repl;
pub mod runtime;
mod state;
pub mod value;

pub use abort::{Fault, FaultKind};
pub use config::{HostConfig, Output, SharedBuffer};
pub use diagnostics::{HostError, Status};
pub use loader::LoadError;
pub use repl::Repl;
pub use state::State;
pub use value::Value;
