//! AST and bytecode optimizers.
//!
//! All passes are pure: they return rewritten copies and leave the input
//! valid. The AST passes are constant folding and tail-call identification;
//! the bytecode pass fuses redundant stack traffic.

use std::rc::Rc;

use crate::{
    builtins::ops,
    bytecode::{FuncTemplate, Inst},
    nodes::{CallTarget, Node},
    value::Value,
};

/// Runs the AST passes in order: constant folding, then tail-call
/// identification.
#[must_use]
pub fn optimize_ast(node: &Node) -> Node {
    identify_tail_calls(&constant_fold(node))
}

/// Runs the bytecode passes.
#[must_use]
pub fn optimize_bytecodes(insts: &[Inst]) -> Vec<Inst> {
    remove_redundant_stack_ops(insts)
}

/// The literal value of a node, if it has one.
fn literal(node: &Node) -> Option<Value> {
    match node {
        Node::Atom(value) => Some(value.clone()),
        Node::Nil => Some(Value::Nil),
        Node::True => Some(Value::Bool(true)),
        Node::False => Some(Value::Bool(false)),
        _ => None,
    }
}

/// Folds operators over literal operands into atoms.
///
/// Children fold first, so nested constant expressions collapse bottom-up to
/// a fixed point in one pass. Operands are required to be literals (not
/// merely non-variables) so folding can never execute effects or observe the
/// environment; an application that would fail at runtime is left in place.
#[must_use]
pub fn constant_fold(node: &Node) -> Node {
    let folded = map_children(node, &constant_fold);
    match &folded {
        Node::Unary { op, arg } => {
            if let Some(value) = literal(arg)
                && let Ok(result) = ops::unary(op.builtin(), &value)
            {
                return Node::Atom(result);
            }
            folded
        }
        Node::Binary { op, left, right } => {
            if let (Some(lhs), Some(rhs)) = (literal(left), literal(right))
                && let Ok(result) = ops::binary(op.builtin(), &lhs, &rhs)
            {
                return Node::Atom(result);
            }
            folded
        }
        _ => folded,
    }
}

/// Rewrites self-calls in return position into tail calls.
///
/// While traversing, the name bound by an enclosing `set name (lambda …)`
/// definition is tracked; a `(ret (name …))` whose callee equals that name
/// becomes a `TailCall`, which the VM executes by frame reuse.
#[must_use]
pub fn identify_tail_calls(node: &Node) -> Node {
    mark_tail_calls(node, None)
}

fn mark_tail_calls(node: &Node, enclosing: Option<&str>) -> Node {
    match node {
        Node::Set { name, expr } => {
            if let Node::Lambda { params, body } = expr.as_ref() {
                return Node::Set {
                    name: name.clone(),
                    expr: Box::new(Node::Lambda {
                        params: params.clone(),
                        body: Rc::new(mark_tail_calls(body, Some(name))),
                    }),
                };
            }
            map_children(node, &|child| mark_tail_calls(child, enclosing))
        }
        Node::Ret(inner) => {
            if let Node::Call {
                target: CallTarget::Name(callee),
                args,
            } = inner.as_ref()
                && Some(callee.as_str()) == enclosing
            {
                return Node::Ret(Box::new(Node::TailCall {
                    name: callee.clone(),
                    args: args.iter().map(|arg| mark_tail_calls(arg, enclosing)).collect(),
                }));
            }
            map_children(node, &|child| mark_tail_calls(child, enclosing))
        }
        _ => map_children(node, &|child| mark_tail_calls(child, enclosing)),
    }
}

/// Rebuilds a node with every direct child mapped through `f`.
fn map_children(node: &Node, f: &dyn Fn(&Node) -> Node) -> Node {
    let map_box = |child: &Node| Box::new(f(child));
    match node {
        Node::Atom(_)
        | Node::Nil
        | Node::True
        | Node::False
        | Node::Var(_)
        | Node::Name(_)
        | Node::Get(_)
        | Node::Params(_)
        | Node::Read
        | Node::Comment(_)
        | Node::NotImplemented(_) => node.clone(),
        Node::Suite(children) => Node::Suite(children.iter().map(f).collect()),
        Node::Set { name, expr } => Node::Set {
            name: name.clone(),
            expr: map_box(expr),
        },
        Node::Setg { name, expr } => Node::Setg {
            name: name.clone(),
            expr: map_box(expr),
        },
        Node::Setc { name, expr } => Node::Setc {
            name: name.clone(),
            expr: map_box(expr),
        },
        Node::Unary { op, arg } => Node::Unary {
            op: *op,
            arg: map_box(arg),
        },
        Node::Binary { op, left, right } => Node::Binary {
            op: *op,
            left: map_box(left),
            right: map_box(right),
        },
        Node::Cons { car, cdr } => Node::Cons {
            car: map_box(car),
            cdr: map_box(cdr),
        },
        Node::Car(expr) => Node::Car(map_box(expr)),
        Node::Cdr(expr) => Node::Cdr(map_box(expr)),
        Node::List(items) => Node::List(items.iter().map(f).collect()),
        Node::IfElse { cond, then, orelse } => Node::IfElse {
            cond: map_box(cond),
            then: map_box(then),
            orelse: orelse.as_ref().map(|node| map_box(node)),
        },
        Node::While { cond, body } => Node::While {
            cond: map_box(cond),
            body: map_box(body),
        },
        Node::Assert { cond, msg } => Node::Assert {
            cond: map_box(cond),
            msg: map_box(msg),
        },
        Node::Call { target, args } => Node::Call {
            target: match target {
                CallTarget::Name(name) => CallTarget::Name(name.clone()),
                CallTarget::Expr(expr) => CallTarget::Expr(map_box(expr)),
            },
            args: args.iter().map(f).collect(),
        },
        Node::TailCall { name, args } => Node::TailCall {
            name: name.clone(),
            args: args.iter().map(f).collect(),
        },
        Node::Ret(expr) => Node::Ret(map_box(expr)),
        Node::Lambda { params, body } => Node::Lambda {
            params: params.clone(),
            body: Rc::new(f(body)),
        },
        Node::Print(args) => Node::Print(args.iter().map(f).collect()),
        Node::Printf(args) => Node::Printf(args.iter().map(f).collect()),
        Node::Printfs(args) => Node::Printfs(args.iter().map(f).collect()),
        Node::Format(expr) => Node::Format(map_box(expr)),
        Node::Parse(expr) => Node::Parse(map_box(expr)),
        Node::Eval(expr) => Node::Eval(map_box(expr)),
    }
}

/// Fuses `PopVar(x); PushVar(x)` pairs into `StoreVar(x)`, to a fixed point.
///
/// Replacements apply from the rightmost match inward so earlier indices
/// stay valid within a pass. Nested function bodies (`CreateFunc`,
/// `PushRawFunc`) are rewritten recursively.
#[must_use]
pub fn remove_redundant_stack_ops(insts: &[Inst]) -> Vec<Inst> {
    let mut out: Vec<Inst> = insts
        .iter()
        .map(|inst| match inst {
            Inst::CreateFunc(template) => Inst::CreateFunc(Rc::new(FuncTemplate {
                params: template.params.clone(),
                body: remove_redundant_stack_ops(&template.body).into(),
            })),
            Inst::PushRawFunc { body, params } => Inst::PushRawFunc {
                body: remove_redundant_stack_ops(body).into(),
                params: params.clone(),
            },
            _ => inst.clone(),
        })
        .collect();

    loop {
        let mut matches = Vec::new();
        for idx in 0..out.len().saturating_sub(1) {
            if let (Inst::PopVar(popped), Inst::PushVar(pushed)) = (&out[idx], &out[idx + 1])
                && popped == pushed
            {
                matches.push(idx);
            }
        }
        if matches.is_empty() {
            return out;
        }
        for &idx in matches.iter().rev() {
            let Inst::PopVar(name) = out[idx].clone() else {
                continue;
            };
            out.splice(idx..idx + 2, [Inst::StoreVar(name)]);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parse::parse_source;

    #[test]
    fn nested_constants_fold_to_a_single_atom() {
        let ast = parse_source("(- (* 2 (+ 3 4)))").unwrap();
        let folded = constant_fold(&ast);
        assert_eq!(folded, Node::Atom(Value::number(-14)));
    }

    #[test]
    fn folding_stops_at_variables() {
        let ast = parse_source("(* x (+ 1 2))").unwrap();
        let folded = constant_fold(&ast);
        assert_eq!(folded.to_string(), "Mul(Var(x), Atom(3))");
    }

    #[test]
    fn folding_leaves_failing_applications_alone() {
        // adding a number to a string fails at runtime; the optimizer must
        // not turn that into a crash of its own
        let ast = parse_source(r#"(+ 1 "x")"#).unwrap();
        let folded = constant_fold(&ast);
        assert_eq!(folded.to_string(), r#"Add(Atom(1), Atom("x"))"#);
    }

    #[test]
    fn self_call_in_return_position_becomes_a_tail_call() {
        let ast = parse_source("(set loop (lambda (n) (ret (loop (- n 1)))))").unwrap();
        let marked = identify_tail_calls(&ast);
        assert_eq!(
            marked.to_string(),
            "Set(loop, Lambda(Params(n), Ret(TailCall(Name(loop), Sub(Var(n), Atom(1))))))"
        );
    }

    #[test]
    fn calls_to_other_functions_are_not_marked() {
        let ast = parse_source("(set f (lambda (n) (ret (g n))))").unwrap();
        let marked = identify_tail_calls(&ast);
        assert!(!marked.to_string().contains("TailCall"));
    }

    #[test]
    fn calls_outside_ret_are_not_marked() {
        let ast = parse_source("(set f (lambda (n) (f (- n 1))))").unwrap();
        let marked = identify_tail_calls(&ast);
        assert!(!marked.to_string().contains("TailCall"));
    }

    #[test]
    fn pop_push_pairs_fuse_to_store() {
        let insts = vec![
            Inst::PushImm(Value::number(1)),
            Inst::PopVar("x".to_owned()),
            Inst::PushVar("x".to_owned()),
        ];
        assert_eq!(
            remove_redundant_stack_ops(&insts),
            vec![Inst::PushImm(Value::number(1)), Inst::StoreVar("x".to_owned())]
        );
    }

    #[test]
    fn mismatched_names_do_not_fuse() {
        let insts = vec![Inst::PopVar("x".to_owned()), Inst::PushVar("y".to_owned())];
        assert_eq!(remove_redundant_stack_ops(&insts), insts);
    }

    #[test]
    fn fusion_reaches_lambda_bodies() {
        let ast = parse_source("(set f (lambda (x) (set y x)))").unwrap();
        let insts = remove_redundant_stack_ops(&crate::bytecode::lower::lower(&ast));
        let Some(Inst::CreateFunc(template)) = insts.first() else {
            panic!("expected CreateFunc first, got {insts:?}");
        };
        assert!(template.body.iter().any(|inst| matches!(inst, Inst::StoreVar(_))));
    }

    #[test]
    fn optimizers_return_copies() {
        let ast = parse_source("(+ 1 2)").unwrap();
        let _ = optimize_ast(&ast);
        assert_eq!(ast.to_string(), "Add(Atom(1), Atom(2))");
    }
}
