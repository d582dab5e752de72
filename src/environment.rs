use std::{cell::RefCell, rc::Rc};

use crate::value::{ObjectRef, Value};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One frame of the lexical scope chain.
///
/// Bindings live on the frame's scope object. The global environment wraps
/// the global object and has no parent.
#[derive(Debug)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    scope: ObjectRef,
}

impl Environment {
    pub fn global(global: ObjectRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: None,
            scope: global,
        }))
    }

    /// A call frame whose bindings live on `scope`.
    pub fn with_parent(parent: EnvironmentRef, scope: ObjectRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            scope,
        }))
    }

    pub fn parent(&self) -> Option<&EnvironmentRef> {
        self.parent.as_ref()
    }

    pub fn scope(&self) -> &ObjectRef {
        &self.scope
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.scope.borrow_mut().set(name, value);
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.scope.borrow().has(name)
    }

    pub fn lookup(env: &EnvironmentRef, name: &str) -> Option<Value> {
        let parent = {
            let frame = env.borrow();
            if let Some(value) = frame.scope.borrow().get(name) {
                return Some(value);
            }
            frame.parent.clone()
        };
        parent.and_then(|parent| Environment::lookup(&parent, name))
    }

    /// Updates the nearest binding of `name`; unbound names land on the root
    /// scope, which is the global object.
    pub fn assign(env: &EnvironmentRef, name: &str, value: Value) {
        let frame = env.borrow();
        let bound_here = frame.scope.borrow().has(name);
        match &frame.parent {
            Some(parent) if !bound_here => Environment::assign(parent, name, value),
            _ => frame.scope.borrow_mut().set(name, value),
        };
    }
}
