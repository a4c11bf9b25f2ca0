//! Bytecode: instruction definitions, lowering, and the VM.
//!
//! The instruction set is structured rather than byte-encoded: operands are
//! carried inline and jump targets are symbolic labels resolved per frame.
//! This keeps lowered programs printable and directly assemblable in tests.

pub mod lower;
pub mod vm;

use std::{fmt, rc::Rc};

use crate::{builtins::Builtin, value::Value};

/// The lowered form of a lambda: parameter names plus a body that ends with
/// `PopFunc`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncTemplate {
    pub params: Vec<String>,
    pub body: Rc<[Inst]>,
}

/// One VM instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    Noop,
    /// Push a literal value.
    PushImm(Value),
    /// Look a name up in the frame environment and push it.
    PushVar(String),
    /// Pop the top of stack into the innermost environment frame.
    PopVar(String),
    /// Like `PopVar`, but leaves the value on the stack. Introduced by the
    /// peephole optimizer.
    StoreVar(String),
    /// Like `StoreVar`, targeting the outermost frame (`setg`).
    StoreGlobal(String),
    /// Like `StoreVar`, targeting the second-from-outermost frame (`setc`).
    StoreEnclosing(String),
    /// Pop `arity` values and call a host builtin; push the result.
    ///
    /// The first value popped is the first argument.
    CallBuiltin(Builtin, usize),
    /// Jump target marker; zero runtime cost.
    Label(String),
    JumpAlways(String),
    JumpIfTrue(String),
    JumpIfFalse(String),
    /// Build a function value capturing the current closure frames, push it.
    CreateFunc(Rc<FuncTemplate>),
    /// Look up a function by name, pop its arguments, push a callee frame.
    PushFunc(String),
    /// Like `PushFunc`, but reuses the current frame instead of growing the
    /// frame stack.
    PushTailFunc(String),
    /// Pop a callable value, then pop `arity` arguments and call it.
    ///
    /// Emitted for callable-expression targets such as `((f 1) 2)`.
    PushFuncVal(usize),
    /// Low-level frame push over a host-constructed instruction block.
    PushRawFunc { body: Rc<[Inst]>, params: Vec<String> },
    /// Return from the current frame.
    ///
    /// With a name, the return value is that binding in the frame
    /// environment; otherwise it is the top of stack (nil when empty).
    PopFunc(Option<String>),
    /// Clear the frame stack immediately.
    Halt(bool),
    /// Placeholder for an AST form lowering refused; fails when executed.
    Missing(String),
}

impl Inst {
    /// Short instruction name for tracing.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Noop => "Noop",
            Self::PushImm(_) => "PushImm",
            Self::PushVar(_) => "PushVar",
            Self::PopVar(_) => "PopVar",
            Self::StoreVar(_) => "StoreVar",
            Self::StoreGlobal(_) => "StoreGlobal",
            Self::StoreEnclosing(_) => "StoreEnclosing",
            Self::CallBuiltin(..) => "CallBuiltin",
            Self::Label(_) => "Label",
            Self::JumpAlways(_) => "JumpAlways",
            Self::JumpIfTrue(_) => "JumpIfTrue",
            Self::JumpIfFalse(_) => "JumpIfFalse",
            Self::CreateFunc(_) => "CreateFunc",
            Self::PushFunc(_) => "PushFunc",
            Self::PushTailFunc(_) => "PushTailFunc",
            Self::PushFuncVal(_) => "PushFuncVal",
            Self::PushRawFunc { .. } => "PushRawFunc",
            Self::PopFunc(_) => "PopFunc",
            Self::Halt(_) => "Halt",
            Self::Missing(_) => "Missing",
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => write!(f, "Noop()"),
            Self::PushImm(Value::Str(s)) => write!(f, "PushImm({s:?})"),
            Self::PushImm(value) => write!(f, "PushImm({value})"),
            Self::PushVar(name) => write!(f, "PushVar({name})"),
            Self::PopVar(name) => write!(f, "PopVar({name})"),
            Self::StoreVar(name) => write!(f, "StoreVar({name})"),
            Self::StoreGlobal(name) => write!(f, "StoreGlobal({name})"),
            Self::StoreEnclosing(name) => write!(f, "StoreEnclosing({name})"),
            Self::CallBuiltin(builtin, arity) => write!(f, "CallBuiltin({builtin}, {arity})"),
            Self::Label(name) => write!(f, "Label({name})"),
            Self::JumpAlways(label) => write!(f, "JumpAlways({label})"),
            Self::JumpIfTrue(label) => write!(f, "JumpIfTrue({label})"),
            Self::JumpIfFalse(label) => write!(f, "JumpIfFalse({label})"),
            Self::CreateFunc(template) => write!(f, "CreateFunc({})", template.params.join(" ")),
            Self::PushFunc(name) => write!(f, "PushFunc({name})"),
            Self::PushTailFunc(name) => write!(f, "PushTailFunc({name})"),
            Self::PushFuncVal(arity) => write!(f, "PushFuncVal({arity})"),
            Self::PushRawFunc { params, .. } => write!(f, "PushRawFunc({})", params.join(" ")),
            Self::PopFunc(None) => write!(f, "PopFunc()"),
            Self::PopFunc(Some(name)) => write!(f, "PopFunc({name})"),
            Self::Halt(catch_fire) => write!(f, "Halt({catch_fire})"),
            Self::Missing(form) => write!(f, "Missing({form})"),
        }
    }
}
