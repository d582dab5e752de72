use std::{mem, rc::Rc};

use crate::{
    abort::{AbortChannel, Fault, FaultKind},
    ast::{BinaryOp, Expr, ExprKind, FunctionBody, Literal, LogicalOp, Stmt, StmtKind, UnaryOp},
    buffer::TextBuffer,
    builtins,
    compile::{self, CompileError, Unit},
    config::{HostConfig, Output},
    environment::{Environment, EnvironmentRef},
    heap::Heap,
    value::{Closure, ObjectClass, ObjectRef, Value, ValueKind},
};

/// Evaluator frames (statements and expressions) that may be active at once.
/// Reaching it raises the same `RangeError` as exceeding the call depth.
const MAX_NESTING: usize = 320;

/// The object world of one state and the evaluator that runs units in it.
///
/// Every runtime error is a [`Fault`] raised through the state's abort
/// channel and propagated with `?` back to the run that armed it. Each call
/// frame restores the caller's environment and receiver on the way out, so
/// an aborted run leaves the runtime positioned at the global frame.
pub struct Runtime {
    global: ObjectRef,
    global_env: EnvironmentRef,
    env: EnvironmentRef,
    this: Value,
    depth: usize,
    max_call_depth: usize,
    nesting: usize,
    heap: Heap,
    stdout: Output,
    scratch: TextBuffer,
    abort: AbortChannel,
}

impl Runtime {
    pub(crate) fn new(config: &HostConfig) -> Self {
        let mut heap = Heap::new();
        let global = heap.allocate(ObjectClass::Global);
        let global_env = Environment::global(Rc::clone(&global));
        builtins::install(&global);
        Self {
            this: Value::object(Rc::clone(&global)),
            env: Rc::clone(&global_env),
            global,
            global_env,
            depth: 0,
            max_call_depth: config.max_call_depth,
            nesting: 0,
            heap,
            stdout: config.stdout.clone(),
            scratch: TextBuffer::new(),
            abort: AbortChannel::new(),
        }
    }

    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    pub fn global_env(&self) -> &EnvironmentRef {
        &self.global_env
    }

    /// The global object as a script value, the receiver of top-level calls.
    pub fn global_value(&self) -> Value {
        Value::object(Rc::clone(&self.global))
    }

    pub fn stdout(&mut self) -> &mut Output {
        &mut self.stdout
    }

    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    pub fn is_armed(&self) -> bool {
        self.abort.is_armed()
    }

    /// Compiles `source` against the global environment.
    pub fn compile(&mut self, name: &str, source: &str) -> Result<Unit, CompileError> {
        compile::compile_and_bind(name, source, &self.global_env, &mut self.scratch)
    }

    /// Builds a fault and routes it through the abort channel.
    pub fn fault(&self, kind: FaultKind, message: impl Into<String>) -> Fault {
        self.abort.raise(Fault::new(kind, message))
    }

    /// Runs `unit` as a top-level execution with the global object as
    /// receiver. The abort channel stays armed for the duration.
    pub(crate) fn execute(&mut self, unit: &Unit) -> Result<Value, Fault> {
        self.abort.arm()?;
        tracing::debug!(unit = unit.name(), "executing unit");
        let receiver = self.global_value();
        let result = self.invoke(receiver, unit.function(), &[]);
        self.abort.disarm();
        debug_assert_eq!(self.depth, 0);
        debug_assert_eq!(self.nesting, 0);
        result
    }

    /// Calls `callable` with `receiver` bound to `this`.
    pub fn invoke(&mut self, receiver: Value, callable: &Value, args: &[Value]) -> Result<Value, Fault> {
        match &*callable.0 {
            ValueKind::NativeFunction(native) => native.call(self, args),
            ValueKind::Function(closure) => self.call_closure(receiver, closure, args),
            _ => Err(self.fault(
                FaultKind::Type,
                format!("{} is not a function", callable.type_name()),
            )),
        }
    }

    /// Empties every object the runtime allocated and drops the scratch
    /// buffer, returning the number of scratch bytes released.
    pub(crate) fn teardown(&mut self) -> usize {
        self.env = Rc::clone(&self.global_env);
        self.this = Value::undefined();
        let objects = self.heap.clear();
        tracing::trace!(objects, "heap cleared");
        self.scratch.release()
    }

    fn call_closure(&mut self, receiver: Value, closure: &Closure, args: &[Value]) -> Result<Value, Fault> {
        if self.depth >= self.max_call_depth {
            return Err(self.fault(FaultKind::Range, "maximum call stack size exceeded"));
        }
        let env = if closure.is_unit {
            Rc::clone(&closure.env)
        } else {
            let scope = self.heap.allocate(ObjectClass::Scope);
            let env = Environment::with_parent(Rc::clone(&closure.env), scope);
            {
                let frame = env.borrow();
                for (idx, param) in closure.body.params.iter().enumerate() {
                    let value = args.get(idx).cloned().unwrap_or_else(Value::undefined);
                    frame.define(param.clone(), value);
                }
            }
            env
        };

        let prev_env = mem::replace(&mut self.env, env);
        let prev_this = mem::replace(&mut self.this, receiver);
        self.depth += 1;
        let result = self.execute_statements(&closure.body.body);
        self.depth -= 1;
        self.env = prev_env;
        self.this = prev_this;

        Ok(match result? {
            Completion::Return(value) => value,
            Completion::Normal(Some(value)) if closure.is_unit => value,
            Completion::Normal(_) => Value::undefined(),
        })
    }

    fn execute_statements(&mut self, statements: &[Stmt]) -> Result<Completion, Fault> {
        let mut last_value = None;
        for stmt in statements {
            match self.execute_statement(stmt)? {
                Completion::Normal(Some(value)) => last_value = Some(value),
                Completion::Normal(None) => {}
                ret @ Completion::Return(_) => return Ok(ret),
            }
        }
        Ok(Completion::Normal(last_value))
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Completion, Fault> {
        self.enter()?;
        let completion = self.execute_statement_kind(stmt);
        self.nesting -= 1;
        completion
    }

    fn execute_statement_kind(&mut self, stmt: &Stmt) -> Result<Completion, Fault> {
        match &stmt.kind {
            StmtKind::Var { name, initializer } => {
                match initializer {
                    Some(expr) => {
                        let value = self.evaluate(expr)?;
                        self.env.borrow().define(name.clone(), value);
                    }
                    None => {
                        let frame = self.env.borrow();
                        if !frame.has_own(name) {
                            frame.define(name.clone(), Value::undefined());
                        }
                    }
                }
                Ok(Completion::Normal(None))
            }
            StmtKind::Function(body) => {
                let function = self.closure(body);
                if let Some(name) = &body.name {
                    self.env.borrow().define(name.clone(), function);
                }
                Ok(Completion::Normal(None))
            }
            StmtKind::Expr(expr) => Ok(Completion::Normal(Some(self.evaluate(expr)?))),
            StmtKind::Block(statements) => self.execute_statements(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_statement(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_statement(branch)
                } else {
                    Ok(Completion::Normal(None))
                }
            }
            StmtKind::While { condition, body } => {
                let mut last_value = None;
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_statement(body)? {
                        Completion::Normal(Some(value)) => last_value = Some(value),
                        Completion::Normal(None) => {}
                        ret @ Completion::Return(_) => return Ok(ret),
                    }
                }
                Ok(Completion::Normal(last_value))
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::undefined(),
                };
                Ok(Completion::Return(value))
            }
            StmtKind::Empty => Ok(Completion::Normal(None)),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Fault> {
        self.enter()?;
        let value = self.evaluate_kind(expr);
        self.nesting -= 1;
        value
    }

    fn enter(&mut self) -> Result<(), Fault> {
        if self.nesting >= MAX_NESTING {
            return Err(self.fault(FaultKind::Range, "maximum call stack size exceeded"));
        }
        self.nesting += 1;
        Ok(())
    }

    fn evaluate_kind(&mut self, expr: &Expr) -> Result<Value, Fault> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal_value(literal)),
            ExprKind::Variable(name) => Environment::lookup(&self.env, name).ok_or_else(|| {
                self.fault(FaultKind::Reference, format!("{name} is not defined"))
                    .with_span(expr.span)
            }),
            ExprKind::This => Ok(self.this.clone()),
            ExprKind::Binary { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(binary(*op, &left, &right))
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.evaluate(left)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.evaluate(right),
                }
            }
            ExprKind::Unary { op, expr: operand } => {
                if let (UnaryOp::TypeOf, ExprKind::Variable(name)) = (op, &operand.kind) {
                    let value = Environment::lookup(&self.env, name).unwrap_or_else(Value::undefined);
                    return Ok(Value::string(value.type_name()));
                }
                let value = self.evaluate(operand)?;
                Ok(match op {
                    UnaryOp::Negate => Value::number(-value.to_number()),
                    UnaryOp::Not => Value::bool(!value.is_truthy()),
                    UnaryOp::TypeOf => Value::string(value.type_name()),
                })
            }
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                match &target.kind {
                    ExprKind::Variable(name) => {
                        Environment::assign(&self.env, name, value.clone());
                    }
                    ExprKind::Member {
                        target: owner,
                        property,
                    } => {
                        let owner = self.evaluate(owner)?;
                        match &*owner.0 {
                            ValueKind::Object(object) => {
                                object.borrow_mut().set(property.clone(), value.clone());
                            }
                            _ => {
                                return Err(self
                                    .fault(
                                        FaultKind::Type,
                                        format!("cannot set property `{property}` of {owner}"),
                                    )
                                    .with_span(target.span));
                            }
                        }
                    }
                    _ => {
                        return Err(self
                            .fault(FaultKind::Reference, "invalid assignment target")
                            .with_span(target.span));
                    }
                }
                Ok(value)
            }
            ExprKind::Call { callee, args } => {
                let (receiver, function) = match &callee.kind {
                    ExprKind::Member { target, property } => {
                        let owner = self.evaluate(target)?;
                        let function = self.member(&owner, property, callee)?;
                        (owner, function)
                    }
                    _ => (self.global_value(), self.evaluate(callee)?),
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }
                if !function.is_callable() {
                    return Err(self
                        .fault(
                            FaultKind::Type,
                            format!("{} is not a function", describe_callee(callee)),
                        )
                        .with_span(callee.span));
                }
                self.invoke(receiver, &function, &values)
                    .map_err(|fault| fault.with_span(expr.span))
            }
            ExprKind::Member { target, property } => {
                let owner = self.evaluate(target)?;
                self.member(&owner, property, expr)
            }
            ExprKind::ObjectLiteral(entries) => {
                let object = self.heap.allocate(ObjectClass::Plain);
                for (key, value_expr) in entries {
                    let value = self.evaluate(value_expr)?;
                    object.borrow_mut().set(key.clone(), value);
                }
                Ok(Value::object(object))
            }
            ExprKind::Function(body) => Ok(self.closure(body)),
        }
    }

    fn member(&self, owner: &Value, property: &str, expr: &Expr) -> Result<Value, Fault> {
        match &*owner.0 {
            ValueKind::Object(object) => {
                Ok(object.borrow().get(property).unwrap_or_else(Value::undefined))
            }
            ValueKind::String(s) if property == "length" => {
                Ok(Value::number(s.chars().count() as f64))
            }
            ValueKind::Undefined | ValueKind::Null => Err(self
                .fault(
                    FaultKind::Type,
                    format!("cannot read property `{property}` of {owner}"),
                )
                .with_span(expr.span)),
            _ => Ok(Value::undefined()),
        }
    }

    fn closure(&self, body: &Rc<FunctionBody>) -> Value {
        Value::new(ValueKind::Function(Closure {
            body: Rc::clone(body),
            env: Rc::clone(&self.env),
            is_unit: false,
        }))
    }
}

enum Completion {
    Normal(Option<Value>),
    Return(Value),
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::number(*n),
        Literal::String(s) => Value::string(Rc::clone(s)),
        Literal::Bool(b) => Value::bool(*b),
        Literal::Null => Value::null(),
        Literal::Undefined => Value::undefined(),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    use BinaryOp::*;
    match op {
        Add => match (&*left.0, &*right.0) {
            (ValueKind::String(_), _) | (_, ValueKind::String(_)) => {
                Value::string(format!("{left}{right}"))
            }
            _ => Value::number(left.to_number() + right.to_number()),
        },
        Sub => Value::number(left.to_number() - right.to_number()),
        Mul => Value::number(left.to_number() * right.to_number()),
        Div => Value::number(left.to_number() / right.to_number()),
        Mod => Value::number(left.to_number() % right.to_number()),
        Equal => Value::bool(left.loose_equals(right)),
        NotEqual => Value::bool(!left.loose_equals(right)),
        StrictEqual => Value::bool(left.strict_equals(right)),
        StrictNotEqual => Value::bool(!left.strict_equals(right)),
        Less | LessEqual | Greater | GreaterEqual => {
            let ordering = match (left.as_str(), right.as_str()) {
                (Some(a), Some(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let holds = ordering.is_some_and(|ordering| match op {
                Less => ordering.is_lt(),
                LessEqual => ordering.is_le(),
                Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            });
            Value::bool(holds)
        }
    }
}

fn describe_callee(callee: &Expr) -> String {
    match &callee.kind {
        ExprKind::Variable(name) => name.clone(),
        ExprKind::Member { target, property } => {
            format!("{}.{property}", describe_callee(target))
        }
        ExprKind::This => "this".into(),
        _ => "expression".into(),
    }
}
