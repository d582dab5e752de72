use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    abort::Fault,
    ast::FunctionBody,
    environment::EnvironmentRef,
    runtime::Runtime,
};

pub type ObjectRef = Rc<RefCell<Object>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    /// The root namespace of a state.
    Global,
    /// Created by object literals.
    Plain,
    /// Holds the parameters and `var` bindings of one function call.
    Scope,
}

#[derive(Debug)]
pub struct Object {
    class: ObjectClass,
    properties: IndexMap<String, Value>,
}

impl Object {
    pub fn new(class: ObjectClass) -> ObjectRef {
        Rc::new(RefCell::new(Self {
            class,
            properties: IndexMap::new(),
        }))
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.properties.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Removes every property, handing the bindings to the caller to drop.
    pub fn take_properties(&mut self) -> IndexMap<String, Value> {
        std::mem::take(&mut self.properties)
    }
}

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn undefined() -> Self {
        Self::new(ValueKind::Undefined)
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn string(value: impl Into<Rc<str>>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn object(object: ObjectRef) -> Self {
        Self::new(ValueKind::Object(object))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(&*self.0, ValueKind::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            &*self.0,
            ValueKind::Function(_) | ValueKind::NativeFunction(_)
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Undefined | ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Number(n) => *n != 0.0 && !n.is_nan(),
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Object(_) | ValueKind::Function(_) | ValueKind::NativeFunction(_) => true,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Undefined => "undefined",
            ValueKind::Null | ValueKind::Object(_) => "object",
            ValueKind::Bool(_) => "boolean",
            ValueKind::Number(_) => "number",
            ValueKind::String(_) => "string",
            ValueKind::Function(_) | ValueKind::NativeFunction(_) => "function",
        }
    }

    pub fn to_number(&self) -> f64 {
        match &*self.0 {
            ValueKind::Undefined => f64::NAN,
            ValueKind::Null => 0.0,
            ValueKind::Bool(b) => f64::from(u8::from(*b)),
            ValueKind::Number(n) => *n,
            ValueKind::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            ValueKind::Object(_) | ValueKind::Function(_) | ValueKind::NativeFunction(_) => {
                f64::NAN
            }
        }
    }

    /// Identity for objects and functions, value equality otherwise.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Undefined, ValueKind::Undefined) => true,
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Object(a), ValueKind::Object(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Function(_), ValueKind::Function(_))
            | (ValueKind::NativeFunction(_), ValueKind::NativeFunction(_)) => {
                Rc::ptr_eq(&self.0, &other.0)
            }
            _ => false,
        }
    }

    /// `==`: `null` and `undefined` are equal to each other, numbers compare
    /// against numeric strings and booleans, everything else is strict.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (
                ValueKind::Undefined | ValueKind::Null,
                ValueKind::Undefined | ValueKind::Null,
            ) => true,
            (ValueKind::Number(_), ValueKind::String(_) | ValueKind::Bool(_))
            | (ValueKind::String(_) | ValueKind::Bool(_), ValueKind::Number(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "{s:?}"),
            _ => write!(f, "{self}"),
        }
    }
}

/// Display strings, as `print` renders them.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Undefined => write!(f, "undefined"),
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write_number(f, *n),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Object(_) => write!(f, "[object Object]"),
            ValueKind::Function(fun) => write!(
                f,
                "function {}() {{ [code] }}",
                fun.body.name.as_deref().unwrap_or("")
            ),
            ValueKind::NativeFunction(fun) => {
                write!(f, "function {}() {{ [native code] }}", fun.name)
            }
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}Infinity", if n < 0.0 { "-" } else { "" })
    } else if n == 0.0 {
        // -0 renders as "0".
        write!(f, "0")
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{n:.0}")
    } else {
        write!(f, "{n}")
    }
}

pub enum ValueKind {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
    Function(Closure),
    NativeFunction(NativeFunction),
}

/// Script function closed over the environment it was created in.
///
/// Compiled units are closures too: they run directly in their environment
/// instead of a fresh call scope and yield their completion value.
pub struct Closure {
    pub body: Rc<FunctionBody>,
    pub env: EnvironmentRef,
    pub is_unit: bool,
}

pub type NativeCallback = fn(&mut Runtime, &[Value]) -> Result<Value, Fault>;

/// Host-provided callable installed into the global object.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn call(&self, runtime: &mut Runtime, args: &[Value]) -> Result<Value, Fault> {
        (self.callback)(runtime, args)
    }
}
