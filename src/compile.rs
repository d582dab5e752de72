//! The `compile-and-bind` boundary: source text in, runnable unit out.

use std::rc::Rc;

use thiserror::Error;

use crate::{
    ast::FunctionBody,
    buffer::TextBuffer,
    diagnostics::Diagnostic,
    environment::EnvironmentRef,
    parser,
    value::{Closure, Value, ValueKind},
};

/// Unit name used for diagnostics of string-sourced loads.
pub const STRING_UNIT_NAME: &str = "(string)";
/// Unit name used for diagnostics of `eval` calls.
pub const EVAL_UNIT_NAME: &str = "(eval)";

/// A syntax error located within a named unit.
#[derive(Debug, Error)]
#[error("{location}: {}", .diagnostic.message)]
pub struct CompileError {
    /// `unit:line:column`, or just the unit name when no span is known.
    pub location: String,
    pub diagnostic: Diagnostic,
}

/// A compiled, zero-argument callable bound to an environment.
#[derive(Clone)]
pub struct Unit {
    name: Rc<str>,
    function: Value,
}

impl Unit {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &Value {
        &self.function
    }
}

/// Compiles `source` and closes the result over `env`.
///
/// Scanning stops at the end of `source` or at its first terminator, so
/// buffers read from files compile exactly like the same text passed in
/// directly. `scratch` is reused for string literal assembly.
pub fn compile_and_bind(
    name: &str,
    source: &str,
    env: &EnvironmentRef,
    scratch: &mut TextBuffer,
) -> Result<Unit, CompileError> {
    let program = parser::parse_program(source, scratch).map_err(|diagnostic| {
        let location = match diagnostic.span {
            Some(span) => {
                let (line, column) = span.line_column(source);
                format!("{name}:{line}:{column}")
            }
            None => name.to_string(),
        };
        CompileError {
            location,
            diagnostic,
        }
    })?;
    tracing::trace!(unit = name, statements = program.items.len(), "unit compiled");
    let body = Rc::new(FunctionBody {
        name: Some(name.to_string()),
        params: Vec::new(),
        body: program.items,
    });
    Ok(Unit {
        name: name.into(),
        function: Value::new(ValueKind::Function(Closure {
            body,
            env: Rc::clone(env),
            is_unit: true,
        })),
    })
}
