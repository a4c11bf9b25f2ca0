//! The fixed table of host operators callable from guest code.
//!
//! Operators, cell/list construction, the print family, and the reflective
//! builtins (`parse`, `eval`, `read`) all dispatch through [`call_builtin`].
//! Both engines use the same dispatch: the tree-walking evaluator calls it
//! from the operator nodes, the VM from the `CallBuiltin` instruction.

pub mod ops;
pub mod print;
pub mod reflect;
pub mod seq;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    env::Env,
    error::{Error, RunResult},
    host::Host,
    io::{PrintWriter, ReadSource},
    tracer::Tracer,
    value::{ArgVec, Value},
};

/// Identifies one entry of the builtin table.
///
/// The string form is the kebab-case name (`build-list`, `printf`), used in
/// value displays and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Builtin {
    // unary operators
    Pos,
    Neg,
    Not,
    // binary operators
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
    // cells and lists
    Pair,
    First,
    Rest,
    BuildList,
    // output
    Print,
    Printf,
    Printfs,
    Format,
    // reflection and input
    Parse,
    Eval,
    Read,
    // assertions
    Assert,
}

/// Argument-count contract of a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinArity {
    Exact(usize),
    AtLeast(usize),
}

impl Builtin {
    /// The arity checked by [`call_builtin`] before dispatch.
    #[must_use]
    pub fn arity(self) -> BuiltinArity {
        match self {
            Self::Pos | Self::Neg | Self::Not | Self::First | Self::Rest | Self::Format | Self::Parse | Self::Eval => {
                BuiltinArity::Exact(1)
            }
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::Pow
            | Self::Eq
            | Self::Ne
            | Self::Lt
            | Self::Gt
            | Self::Le
            | Self::Ge
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Is
            | Self::Pair
            | Self::Assert => BuiltinArity::Exact(2),
            Self::Read => BuiltinArity::Exact(0),
            Self::Print | Self::BuildList => BuiltinArity::AtLeast(0),
            Self::Printf => BuiltinArity::AtLeast(1),
            Self::Printfs => BuiltinArity::AtLeast(2),
        }
    }

    fn check_arity(self, got: usize) -> RunResult<()> {
        let ok = match self.arity() {
            BuiltinArity::Exact(n) => got == n,
            BuiltinArity::AtLeast(n) => got >= n,
        };
        if ok {
            Ok(())
        } else {
            let expected = match self.arity() {
                BuiltinArity::Exact(n) | BuiltinArity::AtLeast(n) => n,
            };
            Err(Error::arity(self.into(), expected, got))
        }
    }
}

/// Calls a builtin with already-evaluated arguments in source order.
///
/// `env` is the environment of the call site; only the reflective builtins
/// (`eval`, `read`) consult it.
pub fn call_builtin<P: PrintWriter, R: ReadSource, T: Tracer>(
    builtin: Builtin,
    args: ArgVec,
    env: &Env,
    host: &mut Host<P, R, T>,
) -> RunResult<Value> {
    builtin.check_arity(args.len())?;
    match builtin {
        Builtin::Pos | Builtin::Neg | Builtin::Not => ops::unary(builtin, &args[0]),
        Builtin::Add
        | Builtin::Sub
        | Builtin::Mul
        | Builtin::Div
        | Builtin::Mod
        | Builtin::Pow
        | Builtin::Eq
        | Builtin::Ne
        | Builtin::Lt
        | Builtin::Gt
        | Builtin::Le
        | Builtin::Ge
        | Builtin::And
        | Builtin::Or
        | Builtin::Xor
        | Builtin::Is => ops::binary(builtin, &args[0], &args[1]),
        Builtin::Pair => Ok(Value::cell(args[0].clone(), args[1].clone())),
        Builtin::First => seq::first(&args[0]),
        Builtin::Rest => seq::rest(&args[0]),
        Builtin::BuildList => Ok(Value::list(args)),
        Builtin::Print => print::print_values(&args, &mut host.print),
        Builtin::Printf => print::printf(&args, &mut host.print),
        Builtin::Printfs => print::printfs(&args, &mut host.print),
        Builtin::Format => Ok(print::format_value(&args[0])),
        Builtin::Parse => reflect::parse_quoted(&args[0]),
        Builtin::Eval => reflect::eval_quoted(&args[0], env, host),
        Builtin::Read => reflect::read_line(env, host),
        Builtin::Assert => {
            if args[0].truthy() {
                Ok(Value::Nil)
            } else {
                Err(Error::program(args[1].to_string()))
            }
        }
    }
}
