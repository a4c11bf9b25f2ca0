//! The AST and the tree-walking evaluator.
//!
//! One sum type covers every node kind; `evaluate` dispatches with a match,
//! which is the moral equivalent of virtual dispatch without heap
//! polymorphism. The same tree is also the input of the bytecode lowering in
//! [`crate::bytecode`].

use std::{fmt, rc::Rc};

use crate::{
    builtins::{self, Builtin, ops},
    env::{Env, bind_args, compose_call_env},
    error::{Error, ErrorKind, RunResult},
    host::Host,
    io::{PrintWriter, ReadSource},
    tracer::Tracer,
    value::{ArgVec, FuncBody, Function, Ufunc, Value},
};

/// Unary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
}

impl UnaryOp {
    /// The builtin implementing this operator.
    #[must_use]
    pub fn builtin(self) -> Builtin {
        match self {
            Self::Pos => Builtin::Pos,
            Self::Neg => Builtin::Neg,
            Self::Not => Builtin::Not,
        }
    }

    fn node_name(self) -> &'static str {
        match self {
            Self::Pos => "Pos",
            Self::Neg => "Neg",
            Self::Not => "Not",
        }
    }
}

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Xor,
    Is,
}

impl BinaryOp {
    /// The builtin implementing this operator.
    #[must_use]
    pub fn builtin(self) -> Builtin {
        match self {
            Self::Add => Builtin::Add,
            Self::Sub => Builtin::Sub,
            Self::Mul => Builtin::Mul,
            Self::Div => Builtin::Div,
            Self::Mod => Builtin::Mod,
            Self::Pow => Builtin::Pow,
            Self::Eq => Builtin::Eq,
            Self::Ne => Builtin::Ne,
            Self::Lt => Builtin::Lt,
            Self::Gt => Builtin::Gt,
            Self::Le => Builtin::Le,
            Self::Ge => Builtin::Ge,
            Self::And => Builtin::And,
            Self::Or => Builtin::Or,
            Self::Xor => Builtin::Xor,
            Self::Is => Builtin::Is,
        }
    }

    fn node_name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::Mod => "Mod",
            Self::Pow => "Pow",
            Self::Eq => "Eq",
            Self::Ne => "Ne",
            Self::Lt => "Lt",
            Self::Gt => "Gt",
            Self::Le => "Le",
            Self::Ge => "Ge",
            Self::And => "And",
            Self::Or => "Or",
            Self::Xor => "Xor",
            Self::Is => "Is",
        }
    }
}

/// The callee of a `Call` node.
///
/// Nearly always a stored name; a nested call expression such as
/// `((f 1) 2)` produces an expression target.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Name(String),
    Expr(Box<Node>),
}

/// An AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal value.
    Atom(Value),
    Nil,
    True,
    False,
    /// A variable read.
    Var(String),
    /// A raw name; evaluates to its own text.
    Name(String),
    /// Sequential execution; the value is that of the last child, or nil.
    Suite(Vec<Node>),
    /// Assignment to the innermost frame.
    Set { name: String, expr: Box<Node> },
    /// Assignment to the outermost (global) frame.
    Setg { name: String, expr: Box<Node> },
    /// Assignment to the second-from-outermost frame.
    Setc { name: String, expr: Box<Node> },
    /// Explicit variable read; same contract as `Var`.
    Get(String),
    Unary {
        op: UnaryOp,
        arg: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Cons {
        car: Box<Node>,
        cdr: Box<Node>,
    },
    Car(Box<Node>),
    Cdr(Box<Node>),
    List(Vec<Node>),
    IfElse {
        cond: Box<Node>,
        then: Box<Node>,
        orelse: Option<Box<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },
    /// Raises a program error with the (lazily evaluated) message when the
    /// condition is false.
    Assert {
        cond: Box<Node>,
        msg: Box<Node>,
    },
    /// Invocation of a callable with already-parsed argument expressions.
    Call {
        target: CallTarget,
        args: Vec<Node>,
    },
    /// A call in tail position, executed by frame reuse in the VM.
    ///
    /// Produced by the tail-call optimizer, or written directly with the
    /// `^name` surface form.
    TailCall {
        name: String,
        args: Vec<Node>,
    },
    /// Wraps a return value; transparent except for tail classification.
    Ret(Box<Node>),
    /// Produces a user function value capturing the current closure frames.
    Lambda {
        params: Vec<String>,
        body: Rc<Node>,
    },
    /// A parameter list literal; evaluates to a list of name strings.
    Params(Vec<String>),
    Print(Vec<Node>),
    Printf(Vec<Node>),
    Printfs(Vec<Node>),
    Format(Box<Node>),
    Parse(Box<Node>),
    Eval(Box<Node>),
    Read,
    /// Inert annotation in hand-built trees; evaluates to nil.
    Comment(String),
    /// A form the AST builder refused to recognize; evaluation fails.
    NotImplemented(String),
}

impl Node {
    /// The node kind name used by tracing and the pretty-printer.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Atom(_) => "Atom",
            Self::Nil => "Nil",
            Self::True => "True",
            Self::False => "False",
            Self::Var(_) => "Var",
            Self::Name(_) => "Name",
            Self::Suite(_) => "Suite",
            Self::Set { .. } => "Set",
            Self::Setg { .. } => "Setg",
            Self::Setc { .. } => "Setc",
            Self::Get(_) => "Get",
            Self::Unary { op, .. } => op.node_name(),
            Self::Binary { op, .. } => op.node_name(),
            Self::Cons { .. } => "Cons",
            Self::Car(_) => "Car",
            Self::Cdr(_) => "Cdr",
            Self::List(_) => "List",
            Self::IfElse { .. } => "IfElse",
            Self::While { .. } => "While",
            Self::Assert { .. } => "Assert",
            Self::Call { .. } => "Call",
            Self::TailCall { .. } => "TailCall",
            Self::Ret(_) => "Ret",
            Self::Lambda { .. } => "Lambda",
            Self::Params(_) => "Params",
            Self::Print(_) => "Print",
            Self::Printf(_) => "Printf",
            Self::Printfs(_) => "Printfs",
            Self::Format(_) => "Format",
            Self::Parse(_) => "Parse",
            Self::Eval(_) => "Eval",
            Self::Read => "Read",
            Self::Comment(_) => "Comment",
            Self::NotImplemented(_) => "NotImplemented",
        }
    }

    /// Evaluates this node against an environment.
    pub fn evaluate<P: PrintWriter, R: ReadSource, T: Tracer>(
        &self,
        env: &Env,
        host: &mut Host<P, R, T>,
    ) -> RunResult<Value> {
        host.tracer.on_eval_enter(self.kind_name(), host.eval_depth);
        host.eval_depth += 1;
        let result = self.eval_inner(env, host);
        host.eval_depth -= 1;
        host.tracer.on_eval_leave(self.kind_name(), host.eval_depth);
        result
    }

    fn eval_inner<P: PrintWriter, R: ReadSource, T: Tracer>(
        &self,
        env: &Env,
        host: &mut Host<P, R, T>,
    ) -> RunResult<Value> {
        match self {
            Self::Atom(value) => Ok(value.clone()),
            Self::Nil => Ok(Value::Nil),
            Self::True => Ok(Value::Bool(true)),
            Self::False => Ok(Value::Bool(false)),
            Self::Var(name) | Self::Get(name) => env.get(name),
            Self::Name(name) => Ok(Value::str(name.as_str())),
            Self::Suite(children) => {
                let mut last = Value::Nil;
                for child in children {
                    last = child.evaluate(env, host)?;
                }
                Ok(last)
            }
            Self::Set { name, expr } => {
                let value = expr.evaluate(env, host)?;
                env.set(name, value.clone());
                Ok(value)
            }
            Self::Setg { name, expr } => {
                let value = expr.evaluate(env, host)?;
                env.set_global(name, value.clone());
                Ok(value)
            }
            Self::Setc { name, expr } => {
                let value = expr.evaluate(env, host)?;
                env.set_enclosing(name, value.clone());
                Ok(value)
            }
            Self::Unary { op, arg } => {
                let value = arg.evaluate(env, host)?;
                ops::unary(op.builtin(), &value)
            }
            Self::Binary { op, left, right } => {
                let lhs = left.evaluate(env, host)?;
                let rhs = right.evaluate(env, host)?;
                ops::binary(op.builtin(), &lhs, &rhs)
            }
            Self::Cons { car, cdr } => {
                let car = car.evaluate(env, host)?;
                let cdr = cdr.evaluate(env, host)?;
                Ok(Value::cell(car, cdr))
            }
            Self::Car(expr) => builtins::seq::first(&expr.evaluate(env, host)?),
            Self::Cdr(expr) => builtins::seq::rest(&expr.evaluate(env, host)?),
            Self::List(items) => {
                let values = items
                    .iter()
                    .map(|item| item.evaluate(env, host))
                    .collect::<RunResult<Vec<_>>>()?;
                Ok(Value::list(values))
            }
            Self::IfElse { cond, then, orelse } => {
                if cond.evaluate(env, host)?.truthy() {
                    then.evaluate(env, host)
                } else if let Some(orelse) = orelse {
                    orelse.evaluate(env, host)
                } else {
                    Ok(Value::Nil)
                }
            }
            Self::While { cond, body } => {
                let mut last = Value::Nil;
                while cond.evaluate(env, host)?.truthy() {
                    last = body.evaluate(env, host)?;
                }
                Ok(last)
            }
            Self::Assert { cond, msg } => {
                if cond.evaluate(env, host)?.truthy() {
                    Ok(Value::Nil)
                } else {
                    Err(Error::program(msg.evaluate(env, host)?.to_string()))
                }
            }
            Self::Call { target, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(env, host))
                    .collect::<RunResult<ArgVec>>()?;
                let callee = match target {
                    CallTarget::Name(name) => env.get(name)?,
                    CallTarget::Expr(expr) => expr.evaluate(env, host)?,
                };
                match callee {
                    Value::Func(func) => call_function(&func, values, env, host),
                    other => Err(Error::type_mismatch(format!(
                        "call target is not a function, got {}",
                        other.type_name()
                    ))),
                }
            }
            // The tree walker has no frames to reuse; a tail call behaves
            // like an ordinary call here.
            Self::TailCall { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(env, host))
                    .collect::<RunResult<ArgVec>>()?;
                match env.get(name)? {
                    Value::Func(func) => call_function(&func, values, env, host),
                    other => Err(Error::type_mismatch(format!(
                        "call target is not a function, got {}",
                        other.type_name()
                    ))),
                }
            }
            Self::Ret(expr) => expr.evaluate(env, host),
            Self::Lambda { params, body } => Ok(Value::Func(Function::User(Rc::new(Ufunc {
                params: params.clone(),
                body: FuncBody::Tree(Rc::clone(body)),
                closures: env.closure_frames(),
            })))),
            Self::Params(names) => Ok(Value::list(names.iter().map(|name| Value::str(name.as_str())))),
            Self::Print(args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(env, host))
                    .collect::<RunResult<Vec<_>>>()?;
                builtins::print::print_values(&values, &mut host.print)
            }
            Self::Printf(args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(env, host))
                    .collect::<RunResult<Vec<_>>>()?;
                builtins::print::printf(&values, &mut host.print)
            }
            Self::Printfs(args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(env, host))
                    .collect::<RunResult<Vec<_>>>()?;
                builtins::print::printfs(&values, &mut host.print)
            }
            Self::Format(expr) => Ok(builtins::print::format_value(&expr.evaluate(env, host)?)),
            Self::Parse(expr) => builtins::reflect::parse_quoted(&expr.evaluate(env, host)?),
            Self::Eval(expr) => {
                let value = expr.evaluate(env, host)?;
                builtins::reflect::eval_quoted(&value, env, host)
            }
            Self::Read => builtins::reflect::read_line(env, host),
            Self::Comment(_) => Ok(Value::Nil),
            Self::NotImplemented(form) => Err(Error::new(
                ErrorKind::NotImplemented,
                format!("unrecognized form: {form}"),
            )),
        }
    }
}

/// Invokes a callable with evaluated arguments.
///
/// Shared by the tree walker and the VM's non-frame call paths. User
/// functions with bytecode bodies run on a fresh VM; tree bodies evaluate
/// directly.
pub(crate) fn call_function<P: PrintWriter, R: ReadSource, T: Tracer>(
    func: &Function,
    args: ArgVec,
    caller_env: &Env,
    host: &mut Host<P, R, T>,
) -> RunResult<Value> {
    match func {
        Function::Builtin(builtin) => builtins::call_builtin(*builtin, args, caller_env, host),
        Function::LineSource(_) => {
            if !args.is_empty() {
                return Err(Error::arity("line source", 0, args.len()));
            }
            builtins::reflect::next_fed_line(func)
        }
        Function::User(ufunc) => {
            let frame = bind_args("function", &ufunc.params, args)?;
            let call_env = compose_call_env(frame, &ufunc.closures, caller_env, host.scoping);
            match &ufunc.body {
                FuncBody::Tree(body) => body.evaluate(&call_env, host),
                FuncBody::Code(code) => crate::bytecode::vm::run_function_body(code, call_env, host),
            }
        }
    }
}

impl fmt::Display for Node {
    /// Compact constructor-style rendering: `Add(Atom(1), Var(x))`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_children(f: &mut fmt::Formatter<'_>, name: &str, children: &[&Node]) -> fmt::Result {
            write!(f, "{name}(")?;
            for (idx, child) in children.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{child}")?;
            }
            write!(f, ")")
        }

        match self {
            Self::Atom(Value::Str(s)) => write!(f, "Atom({s:?})"),
            Self::Atom(value) => write!(f, "Atom({value})"),
            Self::Nil => write!(f, "Nil"),
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Var(name) => write!(f, "Var({name})"),
            Self::Name(name) => write!(f, "Name({name})"),
            Self::Get(name) => write!(f, "Get({name})"),
            Self::Suite(children) => write_children(f, "Suite", &children.iter().collect::<Vec<_>>()),
            Self::Set { name, expr } => write!(f, "Set({name}, {expr})"),
            Self::Setg { name, expr } => write!(f, "Setg({name}, {expr})"),
            Self::Setc { name, expr } => write!(f, "Setc({name}, {expr})"),
            Self::Unary { arg, .. } => write_children(f, self.kind_name(), &[arg]),
            Self::Binary { left, right, .. } => write_children(f, self.kind_name(), &[left, right]),
            Self::Cons { car, cdr } => write_children(f, "Cons", &[car, cdr]),
            Self::Car(expr) => write_children(f, "Car", &[expr]),
            Self::Cdr(expr) => write_children(f, "Cdr", &[expr]),
            Self::List(items) => write_children(f, "List", &items.iter().collect::<Vec<_>>()),
            Self::IfElse { cond, then, orelse } => {
                let mut children: Vec<&Node> = vec![cond, then];
                if let Some(orelse) = orelse {
                    children.push(orelse);
                }
                write_children(f, "IfElse", &children)
            }
            Self::While { cond, body } => write_children(f, "While", &[cond, body]),
            Self::Assert { cond, msg } => write_children(f, "Assert", &[cond, msg]),
            Self::Call { target, args } => {
                write!(f, "Call(")?;
                match target {
                    CallTarget::Name(name) => write!(f, "Name({name})")?,
                    CallTarget::Expr(expr) => write!(f, "{expr}")?,
                }
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                write!(f, ")")
            }
            Self::TailCall { name, args } => {
                write!(f, "TailCall(Name({name})")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                write!(f, ")")
            }
            Self::Ret(expr) => write_children(f, "Ret", &[expr]),
            Self::Lambda { params, body } => write!(f, "Lambda(Params({}), {body})", params.join(" ")),
            Self::Params(names) => write!(f, "Params({})", names.join(" ")),
            Self::Print(args) => write_children(f, "Print", &args.iter().collect::<Vec<_>>()),
            Self::Printf(args) => write_children(f, "Printf", &args.iter().collect::<Vec<_>>()),
            Self::Printfs(args) => write_children(f, "Printfs", &args.iter().collect::<Vec<_>>()),
            Self::Format(expr) => write_children(f, "Format", &[expr]),
            Self::Parse(expr) => write_children(f, "Parse", &[expr]),
            Self::Eval(expr) => write_children(f, "Eval", &[expr]),
            Self::Read => write!(f, "Read()"),
            Self::Comment(text) => write!(f, "Comment({text:?})"),
            Self::NotImplemented(form) => write!(f, "NotImplemented({form})"),
        }
    }
}
