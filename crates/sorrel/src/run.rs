//! Public interface for running programs.

use std::rc::Rc;

use crate::{
    bytecode::{Inst, lower::lower, vm},
    env::Env,
    error::RunResult,
    host::Host,
    io::{PrintWriter, ReadSource},
    nodes::Node,
    optimizer,
    parse::parse_source,
    tracer::Tracer,
    value::Value,
};

/// A parsed program, runnable any number of times on either engine.
///
/// # Example
/// ```
/// use sorrel::{Host, Interp};
///
/// let interp = Interp::new("(+ 3 (+ 4 (* 2 2)))").unwrap();
/// let value = interp.run_tree(&mut Host::silent()).unwrap();
/// assert_eq!(value.to_string(), "11");
/// ```
#[derive(Debug, Clone)]
pub struct Interp {
    ast: Node,
}

impl Interp {
    /// Parses source text into a runnable program.
    pub fn new(source: &str) -> RunResult<Self> {
        Ok(Self {
            ast: parse_source(source)?,
        })
    }

    /// Wraps an already-built AST.
    #[must_use]
    pub fn from_ast(ast: Node) -> Self {
        Self { ast }
    }

    /// Applies the AST optimizer (constant folding, tail-call marking).
    #[must_use]
    pub fn optimize(self) -> Self {
        Self {
            ast: optimizer::optimize_ast(&self.ast),
        }
    }

    #[must_use]
    pub fn ast(&self) -> &Node {
        &self.ast
    }

    /// Lowers the program to bytecode.
    #[must_use]
    pub fn bytecode(&self) -> Vec<Inst> {
        lower(&self.ast)
    }

    /// Runs on the tree-walking evaluator in a fresh environment.
    pub fn run_tree<P: PrintWriter, R: ReadSource, T: Tracer>(&self, host: &mut Host<P, R, T>) -> RunResult<Value> {
        self.run_tree_in(&Env::new(), host)
    }

    /// Runs on the tree-walking evaluator in the given environment.
    pub fn run_tree_in<P: PrintWriter, R: ReadSource, T: Tracer>(
        &self,
        env: &Env,
        host: &mut Host<P, R, T>,
    ) -> RunResult<Value> {
        self.ast.evaluate(env, host)
    }

    /// Lowers and runs on the VM in a fresh environment.
    pub fn run_vm<P: PrintWriter, R: ReadSource, T: Tracer>(
        &self,
        host: &mut Host<P, R, T>,
    ) -> RunResult<(Value, vm::Stats)> {
        self.run_vm_in(Env::new(), host)
    }

    /// Lowers and runs on the VM in the given environment.
    pub fn run_vm_in<P: PrintWriter, R: ReadSource, T: Tracer>(
        &self,
        env: Env,
        host: &mut Host<P, R, T>,
    ) -> RunResult<(Value, vm::Stats)> {
        let insts: Rc<[Inst]> = self.bytecode().into();
        vm::execute(insts, env, host)
    }
}

/// Parses and tree-evaluates source with a silent host; for tests and quick
/// embedding.
pub fn eval_source(source: &str) -> RunResult<Value> {
    Interp::new(source)?.run_tree(&mut Host::silent())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn runs_the_same_source_twice() {
        let interp = Interp::new("(+ 1 2)").unwrap();
        let mut host = Host::silent();
        assert_eq!(interp.run_tree(&mut host).unwrap(), Value::number(3));
        assert_eq!(interp.run_tree(&mut host).unwrap(), Value::number(3));
    }

    #[test]
    fn both_engines_agree_on_a_simple_program() {
        let interp = Interp::new("(set x 2) (* x 21)").unwrap();
        let mut host = Host::silent();
        let tree = interp.run_tree(&mut host).unwrap();
        let (vm, _) = interp.run_vm(&mut host).unwrap();
        assert_eq!(tree, vm);
        assert_eq!(tree, Value::number(42));
    }

    #[test]
    fn eval_source_returns_the_final_value() {
        assert_eq!(eval_source("(+ (* (- 3) 3) (* 4 4))").unwrap(), Value::number(7));
    }
}
