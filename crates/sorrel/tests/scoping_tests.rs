//! Scoping semantics: lexical capture, the set/setg/setc targets, and the
//! dynamic scoping mode.

use pretty_assertions::assert_eq;
use sorrel::{CollectString, ErrorKind, Host, Interp, NoopTracer, QueuedLines, ScopeMode, Value};

fn run_with(source: &str, scoping: ScopeMode) -> Result<(Value, String), sorrel::Error> {
    let interp = Interp::new(source)?;
    let mut host = Host::new(CollectString::new(), QueuedLines::default(), NoopTracer, scoping);
    let value = interp.run_tree(&mut host)?;
    Ok((value, host.print.into_output()))
}

fn run_lexical(source: &str) -> (Value, String) {
    run_with(source, ScopeMode::Lexical).unwrap()
}

#[test]
fn set_shadows_locally_while_setg_reaches_the_global_frame() {
    let (value, _) = run_lexical(r#"
        (set y 10)
        (set f (lambda (x) (
            (assert (and (== x 10) (== y 10)) "scoping before failed!")
            (set x 100)
            (setg y 100)
            (assert (and (== x 100) (== y 100)) "scoping after failed!")
        )))
        (set x 10)
        (f x)
        (assert (== x 10) "caller x must be untouched")
        (assert (== y 100) "global y must be updated")
        (list x y)
    "#);
    assert_eq!(value, Value::list([Value::number(10), Value::number(100)]));
}

#[test]
fn setc_writes_the_enclosing_frame_through_a_closure() {
    let (value, _) = run_lexical(r#"
        (set make (lambda (z) (
            (set bump (lambda () (
                (setc z (+ z 1))
            )))
            (bump)
            (bump)
            (ret z)
        )))
        (make 10)
    "#);
    assert_eq!(value, Value::number(12));
}

#[test]
fn set_variants_collapse_in_a_single_frame_environment() {
    let (value, _) = run_lexical(r#"
        (set a 1)
        (setg b 2)
        (setc c 3)
        (list a b c)
    "#);
    assert_eq!(
        value,
        Value::list([Value::number(1), Value::number(2), Value::number(3)])
    );
}

#[test]
fn closures_capture_their_creator_bindings() {
    let (value, _) = run_lexical(r#"
        (set create-closure-fun (lambda (z) (
            (set closure-fun (lambda () (
                (ret z)
            )))
        )))
        (set fun1 (create-closure-fun 10))
        (set fun2 (create-closure-fun 100))
        (list (fun1) (fun2))
    "#);
    assert_eq!(value, Value::list([Value::number(10), Value::number(100)]));
}

#[test]
fn dynamic_scoping_exposes_caller_locals() {
    let source = r#"
        (set h (lambda () (
            (ret secret)
        )))
        (set g (lambda () (
            (set secret 42)
            (h)
        )))
        (g)
    "#;

    // Lexically, h never sees g's locals.
    let err = run_with(source, ScopeMode::Lexical).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownName);

    let (value, _) = run_with(source, ScopeMode::Dynamic).unwrap();
    assert_eq!(value, Value::number(42));
}

#[test]
fn dynamic_scoping_agrees_between_engines() {
    let source = r#"
        (set h (lambda () (
            (ret secret)
        )))
        (set g (lambda (x) (
            (set secret (* x 2))
            (h)
        )))
        (g 21)
    "#;
    let interp = Interp::new(source).unwrap();
    let mut host = Host::new(
        CollectString::new(),
        QueuedLines::default(),
        NoopTracer,
        ScopeMode::Dynamic,
    );
    let tree = interp.run_tree(&mut host).unwrap();
    let (vm, _) = interp.run_vm(&mut host).unwrap();
    assert_eq!(tree, vm);
    assert_eq!(tree, Value::number(42));
}

#[test]
fn lexical_capture_survives_the_creator_returning() {
    let (value, _) = run_lexical(r#"
        (set make-adder (lambda (n) (
            (lambda (x) (+ x n))
        )))
        (set add5 (make-adder 5))
        (set add7 (make-adder 7))
        (list (add5 10) (add7 10))
    "#);
    assert_eq!(value, Value::list([Value::number(15), Value::number(17)]));
}
