#![doc = include_str!("../../../README.md")]

mod builtins;
mod bytecode;
mod decimal;
mod env;
mod error;
mod host;
mod io;
mod nodes;
mod optimizer;
mod parse;
mod run;
mod tracer;
mod value;

pub use crate::{
    builtins::{Builtin, BuiltinArity},
    bytecode::{
        FuncTemplate, Inst,
        lower::lower,
        vm::{Stats, execute},
    },
    decimal::{Decimal, PRECISION},
    env::{Env, EnvFrame, ScopeMode, new_frame},
    error::{Error, ErrorKind, RunResult},
    host::Host,
    io::{CollectString, NoPrint, PrintWriter, QueuedLines, ReadSource, StdPrint, StdinSource},
    nodes::{BinaryOp, CallTarget, Node, UnaryOp},
    optimizer::{constant_fold, identify_tail_calls, optimize_ast, optimize_bytecodes, remove_redundant_stack_ops},
    parse::{TokenTree, build_node, build_tree, parse_source, tokenize},
    run::{Interp, eval_source},
    tracer::{NoopTracer, StderrTracer, Tracer},
    value::{ArgVec, Cell, FuncBody, Function, Ufunc, Value},
};
