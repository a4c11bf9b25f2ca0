//! The reflective builtins: `parse`, `eval`, and `read`.

use std::rc::Rc;

use crate::{
    env::Env,
    error::{Error, RunResult},
    host::Host,
    io::{PrintWriter, ReadSource},
    nodes::call_function,
    tracer::Tracer,
    value::{Function, Value},
};

/// The environment key consulted by `read` for an injected line feeder.
pub const STDIN_KEY: &str = "--stdin";

/// `parse`: tokenizes and builds source text into a quoted AST value.
pub fn parse_quoted(value: &Value) -> RunResult<Value> {
    match value {
        Value::Str(source) => Ok(Value::Quoted(Rc::new(crate::parse::parse_source(source)?))),
        other => Err(Error::type_mismatch(format!(
            "parse expects a string, got {}",
            other.type_name()
        ))),
    }
}

/// `eval`: evaluates a quoted AST value in the current environment.
pub fn eval_quoted<P: PrintWriter, R: ReadSource, T: Tracer>(
    value: &Value,
    env: &Env,
    host: &mut Host<P, R, T>,
) -> RunResult<Value> {
    match value {
        Value::Quoted(node) => node.evaluate(env, host),
        other => Err(Error::program(format!(
            "eval expects a quoted ast value, got {}",
            other.type_name()
        ))),
    }
}

/// `read`: one line of input as a string.
///
/// If the environment binds `--stdin` to a callable, that callable supplies
/// the line; otherwise the host read source is used. End of input yields the
/// empty string.
pub fn read_line<P: PrintWriter, R: ReadSource, T: Tracer>(env: &Env, host: &mut Host<P, R, T>) -> RunResult<Value> {
    if let Some(Value::Func(feeder)) = env.lookup(STDIN_KEY) {
        return call_function(&feeder, crate::value::ArgVec::new(), env, host);
    }
    let line = host.read.read_line()?.unwrap_or_default();
    Ok(Value::str(line))
}

/// Calls an injected line feeder, yielding `""` once drained.
pub(crate) fn next_fed_line(feeder: &Function) -> RunResult<Value> {
    match feeder {
        Function::LineSource(queue) => {
            let line = queue.borrow_mut().pop_front().unwrap_or_default();
            Ok(Value::str(line))
        }
        _ => Err(Error::type_mismatch("line feeder must be a line source")),
    }
}
