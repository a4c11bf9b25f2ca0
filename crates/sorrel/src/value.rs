use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

use smallvec::SmallVec;

use crate::{bytecode::Inst, decimal::Decimal, env::EnvFrame, nodes::Node};

/// Inline buffer for call arguments popped off a stack or evaluated in
/// order; guest calls rarely pass more than four.
pub type ArgVec = SmallVec<[Value; 4]>;

/// An immutable pair. Lists are chains of cells terminated by `Value::Nil`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub car: Value,
    pub cdr: Value,
}

/// The body of a user-defined function.
///
/// The tree-walking evaluator produces functions that carry their lambda body
/// as AST; the VM produces functions that carry lowered bytecode. Either
/// engine can call either kind (the mixed cases only arise through `eval` of
/// quoted code).
#[derive(Debug, Clone)]
pub enum FuncBody {
    Tree(Rc<Node>),
    Code(Rc<[Inst]>),
}

/// A user-defined function: parameters, body, and captured closure frames.
///
/// Closure frames are shared with the environment that created the function,
/// so mutation through either side stays visible to both.
#[derive(Debug, Clone)]
pub struct Ufunc {
    pub params: Vec<String>,
    pub body: FuncBody,
    pub closures: Vec<EnvFrame>,
}

/// A callable value.
#[derive(Debug, Clone)]
pub enum Function {
    /// A host operator from the fixed builtin table.
    Builtin(crate::builtins::Builtin),
    /// A user-defined function produced by `lambda`.
    User(Rc<Ufunc>),
    /// A host-injected feeder of input lines; calling it yields the next
    /// line, or the empty string once drained. Bound under `--stdin` for
    /// test input injection.
    LineSource(Rc<RefCell<VecDeque<String>>>),
}

impl Function {
    /// Creates a line feeder over the given lines.
    #[must_use]
    pub fn line_source(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::LineSource(Rc::new(RefCell::new(lines.into_iter().map(Into::into).collect())))
    }
}

impl PartialEq for Function {
    /// Functions compare by identity, not structure.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::User(a), Self::User(b)) => Rc::ptr_eq(a, b),
            (Self::LineSource(a), Self::LineSource(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A guest-language value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Arbitrary-precision decimal number.
    Number(Decimal),
    /// Immutable text.
    Str(Rc<str>),
    Bool(bool),
    /// The unit value; also the list terminator.
    Nil,
    /// An immutable pair.
    Cell(Rc<Cell>),
    /// A callable.
    Func(Function),
    /// A reified AST node carried as a first-class value, for `parse`/`eval`.
    Quoted(Rc<Node>),
}

impl Value {
    #[must_use]
    pub fn number(n: i64) -> Self {
        Self::Number(n.into())
    }

    #[must_use]
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    #[must_use]
    pub fn cell(car: Self, cdr: Self) -> Self {
        Self::Cell(Rc::new(Cell { car, cdr }))
    }

    /// Builds a proper list from the items, terminated by nil.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Self, IntoIter: DoubleEndedIterator>) -> Self {
        let mut list = Self::Nil;
        for item in items.into_iter().rev() {
            list = Self::cell(item, list);
        }
        list
    }

    /// Guest truthiness: nil, false, zero, and the empty string are falsy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Bool(b) => *b,
            Self::Number(n) => !n.is_zero(),
            Self::Str(s) => !s.is_empty(),
            Self::Cell(_) | Self::Func(_) | Self::Quoted(_) => true,
        }
    }

    /// The kind name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::Nil => "nil",
            Self::Cell(_) => "cell",
            Self::Func(_) => "function",
            Self::Quoted(_) => "quoted",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Bool(true) => write!(f, "true"),
            Self::Bool(false) => write!(f, "false"),
            Self::Nil => write!(f, "nil"),
            Self::Cell(cell) => {
                // Lisp notation: proper lists as (a b c), improper tails
                // dotted as (a . b).
                write!(f, "({}", cell.car)?;
                let mut rest = &cell.cdr;
                loop {
                    match rest {
                        Self::Nil => break,
                        Self::Cell(next) => {
                            write!(f, " {}", next.car)?;
                            rest = &next.cdr;
                        }
                        other => {
                            write!(f, " . {other}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Self::Func(Function::Builtin(b)) => write!(f, "<builtin {b}>"),
            Self::Func(Function::User(u)) => write!(f, "<ufunc ({})>", u.params.join(" ")),
            Self::Func(Function::LineSource(_)) => write!(f, "<line-source>"),
            Self::Quoted(node) => write!(f, "{node}"),
        }
    }
}
