use std::io::Write;

use crate::{
    abort::{Fault, FaultKind},
    compile::EVAL_UNIT_NAME,
    runtime::Runtime,
    value::{NativeCallback, NativeFunction, ObjectRef, Value, ValueKind},
};

/// Installs `print` and `eval` into a fresh global object.
pub fn install(global: &ObjectRef) {
    let mut global = global.borrow_mut();
    global.set("print", native("print", print));
    global.set("eval", native("eval", eval));
}

fn native(name: &'static str, callback: NativeCallback) -> Value {
    Value::new(ValueKind::NativeFunction(NativeFunction {
        name,
        callback,
    }))
}

/// Writes the display strings of all arguments, space separated, plus a
/// newline, and flushes immediately.
fn print(runtime: &mut Runtime, args: &[Value]) -> Result<Value, Fault> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let written = {
        let out = runtime.stdout();
        writeln!(out, "{line}").and_then(|_| out.flush())
    };
    written.map_err(|err| runtime.fault(FaultKind::Internal, format!("print failed: {err}")))?;
    Ok(Value::undefined())
}

/// Compiles a string argument as a new unit and runs it, yielding its
/// completion value. Non-string arguments are returned unchanged.
///
/// The unit is always bound to the global environment, never to the caller's
/// scope, so `eval` inside a function cannot see that function's locals.
fn eval(runtime: &mut Runtime, args: &[Value]) -> Result<Value, Fault> {
    let Some(argument) = args.first() else {
        return Ok(Value::undefined());
    };
    let Some(source) = argument.as_str() else {
        return Ok(argument.clone());
    };
    let unit = runtime
        .compile(EVAL_UNIT_NAME, source)
        .map_err(|err| runtime.fault(FaultKind::Syntax, err.to_string()))?;
    let receiver = runtime.global_value();
    runtime.invoke(receiver, unit.function(), &[])
}
