//! The frame-stack virtual machine.
//!
//! Execution is single-threaded and deterministic: fetch the current frame's
//! next instruction, advance the program counter, execute. A frame whose pc
//! runs off the end is popped; function bodies end with `PopFunc`, so only
//! the top-level frame normally exits that way. Tail calls reuse the current
//! frame in place instead of growing the frame stack.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use super::Inst;
use crate::{
    builtins::{self, BuiltinArity},
    env::{Env, bind_args, compose_call_env},
    error::{Error, ErrorKind, RunResult},
    host::Host,
    io::{PrintWriter, ReadSource},
    tracer::Tracer,
    value::{ArgVec, FuncBody, Function, Ufunc, Value},
};

/// Non-semantic execution counters carried through a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    /// Instructions executed.
    pub num_insts: u64,
    /// Function invocations (user functions, raw blocks, named builtins).
    pub func_calls: u64,
    /// Frames ever created (tail reuse does not count).
    pub num_frames: u64,
    /// Maximum concurrent frame-stack depth.
    pub max_frame_depth: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats(num_insts={}, func_calls={}, num_frames={}, max_frame_depth={})",
            self.num_insts, self.func_calls, self.num_frames, self.max_frame_depth
        )
    }
}

/// A call record: instructions, program counter, value stack, environment,
/// and the label table precomputed from the instructions.
#[derive(Debug)]
pub struct Frame {
    insts: Rc<[Inst]>,
    pc: usize,
    stack: Vec<Value>,
    env: Env,
    labels: AHashMap<String, usize>,
}

impl Frame {
    #[must_use]
    pub fn new(insts: Rc<[Inst]>, env: Env) -> Self {
        let labels = collect_labels(&insts);
        Self {
            insts,
            pc: 0,
            stack: Vec::new(),
            env,
            labels,
        }
    }

    fn pop(&mut self) -> RunResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow, "pop from an empty value stack"))
    }

    fn peek(&self) -> RunResult<Value> {
        self.stack
            .last()
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow, "peek at an empty value stack"))
    }

    fn jump(&mut self, label: &str) -> RunResult<()> {
        match self.labels.get(label) {
            Some(&target) => {
                self.pc = target;
                Ok(())
            }
            None => Err(Error::new(ErrorKind::MissingLabel, format!("no label {label:?} in frame"))),
        }
    }

    /// Tail reuse: swap in the callee body and environment, keep the frame.
    ///
    /// The value stack intentionally survives; the trailing `PopFunc` of the
    /// callee body returns its own top of stack.
    fn replace_body(&mut self, insts: Rc<[Inst]>, env: Env) {
        self.labels = collect_labels(&insts);
        self.insts = insts;
        self.pc = 0;
        self.env = env;
    }
}

fn collect_labels(insts: &[Inst]) -> AHashMap<String, usize> {
    insts
        .iter()
        .enumerate()
        .filter_map(|(idx, inst)| match inst {
            Inst::Label(name) => Some((name.clone(), idx)),
            _ => None,
        })
        .collect()
}

/// Runs a bytecode sequence against an environment.
///
/// Returns the final value (the top of the root frame's stack when it exits,
/// or the value delivered by a root-frame `PopFunc`) together with the run
/// statistics.
pub fn execute<P: PrintWriter, R: ReadSource, T: Tracer>(
    insts: Rc<[Inst]>,
    env: Env,
    host: &mut Host<P, R, T>,
) -> RunResult<(Value, Stats)> {
    let mut vm = Vm {
        frames: Vec::new(),
        stats: Stats::default(),
        host,
    };
    vm.push_frame(Frame::new(insts, env), "<main>");
    let result = vm.run()?;
    Ok((result, vm.stats))
}

/// Runs a lowered function body to its return value.
///
/// Used when the tree-walking evaluator calls a function whose body is
/// bytecode; the inner run keeps its own statistics.
pub(crate) fn run_function_body<P: PrintWriter, R: ReadSource, T: Tracer>(
    code: &Rc<[Inst]>,
    env: Env,
    host: &mut Host<P, R, T>,
) -> RunResult<Value> {
    execute(Rc::clone(code), env, host).map(|(value, _)| value)
}

struct Vm<'h, P, R, T> {
    frames: Vec<Frame>,
    stats: Stats,
    host: &'h mut Host<P, R, T>,
}

impl<P: PrintWriter, R: ReadSource, T: Tracer> Vm<'_, P, R, T> {
    fn current(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is non-empty during execution")
    }

    fn push_frame(&mut self, frame: Frame, name: &str) {
        self.frames.push(frame);
        self.stats.num_frames += 1;
        self.stats.max_frame_depth = self.stats.max_frame_depth.max(self.frames.len());
        self.host.tracer.on_frame_push(name, self.frames.len());
    }

    /// Pops `arity` values; the first popped is the first argument.
    fn pop_args(&mut self, arity: usize) -> RunResult<ArgVec> {
        let frame = self.current();
        let mut args = ArgVec::with_capacity(arity);
        for _ in 0..arity {
            args.push(frame.pop()?);
        }
        Ok(args)
    }

    fn run(&mut self) -> RunResult<Value> {
        loop {
            let Some(frame) = self.frames.last() else {
                return Ok(Value::Nil);
            };
            if frame.pc >= frame.insts.len() {
                let finished = self.frames.pop().expect("frame checked above");
                self.host.tracer.on_frame_pop(self.frames.len());
                if self.frames.is_empty() {
                    return Ok(finished.stack.last().cloned().unwrap_or(Value::Nil));
                }
                continue;
            }

            let frame = self.frames.last_mut().expect("frame checked above");
            let pc = frame.pc;
            let inst = frame.insts[pc].clone();
            frame.pc += 1;
            let stack_depth = frame.stack.len();
            let frame_depth = self.frames.len();
            self.stats.num_insts += 1;
            self.host.tracer.on_inst(pc, inst.name(), stack_depth, frame_depth);

            if let Some(result) = self.exec(inst)? {
                return Ok(result);
            }
        }
    }

    /// Executes one instruction. `Some(value)` ends the run.
    fn exec(&mut self, inst: Inst) -> RunResult<Option<Value>> {
        match inst {
            Inst::Noop | Inst::Label(_) => {}
            Inst::Missing(form) => {
                return Err(Error::new(
                    ErrorKind::NotImplemented,
                    format!("unimplemented bytecode for {form}"),
                ));
            }
            Inst::PushImm(value) => self.current().stack.push(value),
            Inst::PushVar(name) => {
                let value = self.current().env.get(&name)?;
                self.current().stack.push(value);
            }
            Inst::PopVar(name) => {
                let value = self.current().pop()?;
                self.current().env.set(&name, value);
            }
            Inst::StoreVar(name) => {
                let value = self.current().peek()?;
                self.current().env.set(&name, value);
            }
            Inst::StoreGlobal(name) => {
                let value = self.current().peek()?;
                self.current().env.set_global(&name, value);
            }
            Inst::StoreEnclosing(name) => {
                let value = self.current().peek()?;
                self.current().env.set_enclosing(&name, value);
            }
            Inst::CallBuiltin(builtin, arity) => {
                let args = self.pop_args(arity)?;
                let env = self.current().env.clone();
                let result = builtins::call_builtin(builtin, args, &env, self.host)?;
                self.current().stack.push(result);
            }
            Inst::JumpAlways(label) => self.current().jump(&label)?,
            Inst::JumpIfTrue(label) => {
                let value = self.current().pop()?;
                if value.truthy() {
                    self.current().jump(&label)?;
                }
            }
            Inst::JumpIfFalse(label) => {
                let value = self.current().pop()?;
                if !value.truthy() {
                    self.current().jump(&label)?;
                }
            }
            Inst::CreateFunc(template) => {
                let frame = self.current();
                let func = Ufunc {
                    params: template.params.clone(),
                    body: FuncBody::Code(Rc::clone(&template.body)),
                    closures: frame.env.closure_frames(),
                };
                frame.stack.push(Value::Func(Function::User(Rc::new(func))));
            }
            Inst::PushFunc(name) => {
                let callee = self.current().env.get(&name)?;
                self.invoke(&name, callee, None, false)?;
            }
            Inst::PushTailFunc(name) => {
                let callee = self.current().env.get(&name)?;
                self.invoke(&name, callee, None, true)?;
            }
            Inst::PushFuncVal(arity) => {
                let callee = self.current().pop()?;
                self.invoke("<expr>", callee, Some(arity), false)?;
            }
            Inst::PushRawFunc { body, params } => {
                let args = self.pop_args(params.len())?;
                let args_frame = bind_args("raw function", &params, args)?;
                let env = Env::from_frames(vec![args_frame, self.current().env.global_frame()]);
                self.stats.func_calls += 1;
                self.push_frame(Frame::new(body, env), "<raw>");
            }
            Inst::PopFunc(name) => {
                let value = {
                    let frame = self.current();
                    match name {
                        Some(name) => frame.env.get(&name)?,
                        None => frame.stack.pop().unwrap_or(Value::Nil),
                    }
                };
                self.frames.pop();
                self.host.tracer.on_frame_pop(self.frames.len());
                match self.frames.last_mut() {
                    Some(caller) => caller.stack.push(value),
                    None => return Ok(Some(value)),
                }
            }
            Inst::Halt(_) => {
                self.frames.clear();
                return Ok(Some(Value::Nil));
            }
        }
        Ok(None)
    }

    /// Calls a function value: user functions get a frame (or reuse the
    /// current one on tail calls); builtins and line feeders execute inline.
    fn invoke(&mut self, name: &str, callee: Value, expect_arity: Option<usize>, tail: bool) -> RunResult<()> {
        let func = match callee {
            Value::Func(func) => func,
            other => {
                return Err(Error::type_mismatch(format!(
                    "call target {name:?} is not a function, got {}",
                    other.type_name()
                )));
            }
        };
        match func {
            Function::User(ufunc) => {
                if let Some(expected) = expect_arity
                    && expected != ufunc.params.len()
                {
                    return Err(Error::arity(name, ufunc.params.len(), expected));
                }
                let args = self.pop_args(ufunc.params.len())?;
                let args_frame = bind_args(name, &ufunc.params, args)?;
                let scoping = self.host.scoping;
                let call_env = compose_call_env(args_frame, &ufunc.closures, &self.current().env, scoping);
                self.stats.func_calls += 1;
                match &ufunc.body {
                    FuncBody::Code(code) => {
                        if tail {
                            self.current().replace_body(Rc::clone(code), call_env);
                            self.stats.max_frame_depth = self.stats.max_frame_depth.max(self.frames.len());
                            self.host.tracer.on_frame_push(name, self.frames.len());
                        } else {
                            self.push_frame(Frame::new(Rc::clone(code), call_env), name);
                        }
                    }
                    // Tree-bodied functions only reach the VM through `eval`
                    // of quoted code; evaluate the body directly.
                    FuncBody::Tree(node) => {
                        let value = node.evaluate(&call_env, self.host)?;
                        self.current().stack.push(value);
                    }
                }
            }
            Function::Builtin(builtin) => {
                let BuiltinArity::Exact(arity) = builtin.arity() else {
                    return Err(Error::new(
                        ErrorKind::BadInstruction,
                        format!("builtin {builtin} cannot be called through a function value"),
                    ));
                };
                if let Some(expected) = expect_arity
                    && expected != arity
                {
                    return Err(Error::arity(name, arity, expected));
                }
                let args = self.pop_args(arity)?;
                let env = self.current().env.clone();
                let value = builtins::call_builtin(builtin, args, &env, self.host)?;
                self.stats.func_calls += 1;
                self.current().stack.push(value);
            }
            Function::LineSource(_) => {
                if let Some(expected) = expect_arity
                    && expected != 0
                {
                    return Err(Error::arity(name, 0, expected));
                }
                let value = builtins::reflect::next_fed_line(&func)?;
                self.stats.func_calls += 1;
                self.current().stack.push(value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(insts: Vec<Inst>) -> (Value, Stats) {
        let mut host = Host::silent();
        execute(insts.into(), Env::new(), &mut host).unwrap()
    }

    #[test]
    fn push_and_pop_variables() {
        let (value, stats) = run(vec![
            Inst::PushImm(Value::number(7)),
            Inst::PopVar("x".to_owned()),
            Inst::PushVar("x".to_owned()),
        ]);
        assert_eq!(value, Value::number(7));
        assert_eq!(stats.num_insts, 3);
        assert_eq!(stats.num_frames, 1);
    }

    #[test]
    fn store_var_leaves_value_on_stack() {
        let (value, _) = run(vec![Inst::PushImm(Value::number(3)), Inst::StoreVar("x".to_owned())]);
        assert_eq!(value, Value::number(3));
    }

    #[test]
    fn jumps_resolve_labels() {
        let (value, _) = run(vec![
            Inst::PushImm(Value::Bool(true)),
            Inst::JumpIfTrue("skip".to_owned()),
            Inst::PushImm(Value::number(1)),
            Inst::Label("skip".to_owned()),
            Inst::PushImm(Value::number(2)),
        ]);
        assert_eq!(value, Value::number(2));
    }

    #[test]
    fn missing_labels_are_host_errors() {
        let mut host = Host::silent();
        let err = execute(vec![Inst::JumpAlways("nowhere".to_owned())].into(), Env::new(), &mut host).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingLabel);
    }

    #[test]
    fn stack_underflow_is_a_host_error() {
        let mut host = Host::silent();
        let err = execute(vec![Inst::PopVar("x".to_owned())].into(), Env::new(), &mut host).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StackUnderflow);
    }

    #[test]
    fn halt_clears_the_frame_stack() {
        let (value, stats) = run(vec![
            Inst::PushImm(Value::number(1)),
            Inst::Halt(false),
            Inst::PushImm(Value::number(2)),
        ]);
        assert_eq!(value, Value::Nil);
        assert_eq!(stats.num_insts, 2);
    }

    #[test]
    fn raw_function_frames_bind_popped_args() {
        let body: Rc<[Inst]> = vec![
            Inst::PushVar("x".to_owned()),
            Inst::PushImm(Value::number(10)),
            Inst::CallBuiltin(crate::builtins::Builtin::Mul, 2),
            Inst::PopFunc(None),
        ]
        .into();
        let (value, stats) = run(vec![
            Inst::PushImm(Value::number(4)),
            Inst::PushRawFunc {
                body,
                params: vec!["x".to_owned()],
            },
        ]);
        assert_eq!(value, Value::number(40));
        assert_eq!(stats.func_calls, 1);
        assert_eq!(stats.num_frames, 2);
        assert_eq!(stats.max_frame_depth, 2);
    }
}
