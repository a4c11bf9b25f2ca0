//! Lowering from AST to bytecode.
//!
//! Argument sequences are emitted in reverse so the callee pops values in
//! source order. Labels are made unique with a per-lowering counter so the
//! same construct can be lowered any number of times into one instruction
//! stream.

use std::rc::Rc;

use super::{FuncTemplate, Inst};
use crate::{
    builtins::Builtin,
    nodes::{CallTarget, Node},
    value::Value,
};

/// Lowers an AST to a bytecode sequence.
#[must_use]
pub fn lower(node: &Node) -> Vec<Inst> {
    let mut lowerer = Lowerer::default();
    let mut out = Vec::new();
    lowerer.emit(node, &mut out);
    out
}

#[derive(Debug, Default)]
struct Lowerer {
    next_label: usize,
}

impl Lowerer {
    /// Returns a fresh label of the form `stem-N-part`.
    fn fresh(&mut self, stem: &str, part: &str) -> String {
        let id = self.next_label;
        self.next_label += 1;
        format!("{stem}-{id}-{part}")
    }

    fn function_body(&mut self, body: &Node) -> Rc<[Inst]> {
        let mut out = Vec::new();
        self.emit(body, &mut out);
        out.push(Inst::PopFunc(None));
        out.into()
    }

    /// Emits arguments so the callee pops them in source order.
    fn emit_reversed(&mut self, args: &[Node], out: &mut Vec<Inst>) {
        for arg in args.iter().rev() {
            self.emit(arg, out);
        }
    }

    fn emit(&mut self, node: &Node, out: &mut Vec<Inst>) {
        match node {
            Node::Atom(value) => out.push(Inst::PushImm(value.clone())),
            Node::Nil => out.push(Inst::PushImm(Value::Nil)),
            Node::True => out.push(Inst::PushImm(Value::Bool(true))),
            Node::False => out.push(Inst::PushImm(Value::Bool(false))),
            Node::Var(name) | Node::Get(name) => out.push(Inst::PushVar(name.clone())),
            Node::Name(name) => out.push(Inst::PushImm(Value::str(name.as_str()))),
            Node::Suite(children) => {
                for child in children {
                    self.emit(child, out);
                }
            }
            // The value stays on the stack as the expression result; the
            // peephole pass fuses the pair into StoreVar.
            Node::Set { name, expr } => {
                self.emit(expr, out);
                out.push(Inst::PopVar(name.clone()));
                out.push(Inst::PushVar(name.clone()));
            }
            Node::Setg { name, expr } => {
                self.emit(expr, out);
                out.push(Inst::StoreGlobal(name.clone()));
            }
            Node::Setc { name, expr } => {
                self.emit(expr, out);
                out.push(Inst::StoreEnclosing(name.clone()));
            }
            Node::Unary { op, arg } => {
                self.emit(arg, out);
                out.push(Inst::CallBuiltin(op.builtin(), 1));
            }
            Node::Binary { op, left, right } => {
                self.emit(right, out);
                self.emit(left, out);
                out.push(Inst::CallBuiltin(op.builtin(), 2));
            }
            Node::Cons { car, cdr } => {
                self.emit(cdr, out);
                self.emit(car, out);
                out.push(Inst::CallBuiltin(Builtin::Pair, 2));
            }
            Node::Car(expr) => {
                self.emit(expr, out);
                out.push(Inst::CallBuiltin(Builtin::First, 1));
            }
            Node::Cdr(expr) => {
                self.emit(expr, out);
                out.push(Inst::CallBuiltin(Builtin::Rest, 1));
            }
            Node::List(items) => {
                self.emit_reversed(items, out);
                out.push(Inst::CallBuiltin(Builtin::BuildList, items.len()));
            }
            Node::IfElse { cond, then, orelse } => {
                let end = self.fresh("if", "end");
                self.emit(cond, out);
                match orelse {
                    Some(orelse) => {
                        let els = self.fresh("if", "else");
                        out.push(Inst::JumpIfFalse(els.clone()));
                        self.emit(then, out);
                        out.push(Inst::JumpAlways(end.clone()));
                        out.push(Inst::Label(els));
                        self.emit(orelse, out);
                    }
                    None => {
                        out.push(Inst::JumpIfFalse(end.clone()));
                        self.emit(then, out);
                    }
                }
                out.push(Inst::Label(end));
            }
            Node::While { cond, body } => {
                let start = self.fresh("while", "start");
                let end = self.fresh("while", "end");
                out.push(Inst::Label(start.clone()));
                self.emit(cond, out);
                out.push(Inst::JumpIfFalse(end.clone()));
                self.emit(body, out);
                out.push(Inst::JumpAlways(start));
                out.push(Inst::Label(end));
            }
            Node::Assert { cond, msg } => {
                self.emit(msg, out);
                self.emit(cond, out);
                out.push(Inst::CallBuiltin(Builtin::Assert, 2));
            }
            Node::Call { target, args } => {
                self.emit_reversed(args, out);
                match target {
                    CallTarget::Name(name) => out.push(Inst::PushFunc(name.clone())),
                    CallTarget::Expr(expr) => {
                        self.emit(expr, out);
                        out.push(Inst::PushFuncVal(args.len()));
                    }
                }
            }
            Node::TailCall { name, args } => {
                self.emit_reversed(args, out);
                out.push(Inst::PushTailFunc(name.clone()));
            }
            Node::Ret(expr) => self.emit(expr, out),
            Node::Lambda { params, body } => {
                let template = FuncTemplate {
                    params: params.clone(),
                    body: self.function_body(body),
                };
                out.push(Inst::CreateFunc(Rc::new(template)));
            }
            Node::Params(names) => {
                let value = Value::list(names.iter().map(|name| Value::str(name.as_str())));
                out.push(Inst::PushImm(value));
            }
            Node::Print(args) => {
                self.emit_reversed(args, out);
                out.push(Inst::CallBuiltin(Builtin::Print, args.len()));
            }
            Node::Printf(args) => {
                self.emit_reversed(args, out);
                out.push(Inst::CallBuiltin(Builtin::Printf, args.len()));
            }
            Node::Printfs(args) => {
                self.emit_reversed(args, out);
                out.push(Inst::CallBuiltin(Builtin::Printfs, args.len()));
            }
            Node::Format(expr) => {
                self.emit(expr, out);
                out.push(Inst::CallBuiltin(Builtin::Format, 1));
            }
            Node::Parse(expr) => {
                self.emit(expr, out);
                out.push(Inst::CallBuiltin(Builtin::Parse, 1));
            }
            Node::Eval(expr) => {
                self.emit(expr, out);
                out.push(Inst::CallBuiltin(Builtin::Eval, 1));
            }
            Node::Read => out.push(Inst::CallBuiltin(Builtin::Read, 0)),
            Node::Comment(_) => out.push(Inst::Noop),
            Node::NotImplemented(form) => out.push(Inst::Missing(form.clone())),
        }
    }
}
