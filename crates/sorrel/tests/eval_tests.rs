//! Tree-walking evaluator tests over complete guest programs.

use pretty_assertions::assert_eq;
use sorrel::{
    CollectString, Env, ErrorKind, Function, Host, Interp, NoopTracer, QueuedLines, ScopeMode, Value, eval_source,
};

fn host() -> Host<CollectString, QueuedLines, NoopTracer> {
    Host::new(CollectString::new(), QueuedLines::default(), NoopTracer, ScopeMode::Lexical)
}

fn run(source: &str) -> (Value, String) {
    let interp = Interp::new(source).unwrap();
    let mut host = host();
    let value = interp.run_tree(&mut host).unwrap();
    (value, host.print.into_output())
}

#[test]
fn nested_arithmetic() {
    assert_eq!(eval_source("(+ 3 (+ 4 (* 2 2)))").unwrap(), Value::number(11));
    assert_eq!(eval_source("(+ (* (- 3) 3) (* 4 4))").unwrap(), Value::number(7));
    assert_eq!(eval_source("(+ (* 3 3) (* 4 4))").unwrap(), Value::number(25));
}

#[test]
fn division_is_decimal() {
    assert_eq!(eval_source("(/ 10 4)").unwrap().to_string(), "2.5");
    assert_eq!(eval_source("(/ 1 3)").unwrap().to_string(), "0.33333333333");
}

#[test]
fn cons_car_cdr_and_list_equality() {
    let (value, _) = run(r#"
        (set x (cons 1 (cons 2 (cons 3 nil))))
        (set y (list 1 2 3))
        (assert (== (car x) 1) "(car x) failed")
        (assert (== (car (cdr x)) 2) "(car (cdr x)) failed")
        (assert (== (car (cdr (cdr x))) 3) "(car (cdr (cdr x))) failed")
        (assert (== x y) "(eq x y) failed")
        (car x)
    "#);
    assert_eq!(value, Value::number(1));
}

#[test]
fn car_of_nil_is_a_type_error() {
    let err = eval_source("(car nil)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn fizzbuzz_builds_the_expected_list() {
    let (_, output) = run(r#"
        (set x 0)
        (set n 20)
        (set rv nil)
        (while (< x n) (
            (set x (+ x 1))
            (if (== (% x 15) 0)
                (set rv (cons "fizzbuzz" rv))
                (if (== (% x 5) 0)
                    (set rv (cons "buzz" rv))
                    (if (== (% x 3) 0)
                        (set rv (cons "fizz" rv))
                        (set rv (cons x rv))
                    )
                )
            )
        ))
        (assert
            (== rv (list "buzz" 19 "fizz" 17 16 "fizzbuzz" 14 13 "fizz" 11
                         "buzz" "fizz" 8 7 "fizz" "buzz" 4 "fizz" 2 1))
            "(fizzbuzz 20) failed!"
        )
        (print "All control flow tests passed!")
    "#);
    assert_eq!(output, "All control flow tests passed!\n");
}

#[test]
fn fibonacci() {
    let (value, _) = run(r#"
        (set fib (lambda (n) (
            (if (or (== n 0) (== n 1))
                (ret 1)
                (ret (+ (fib (- n 1)) (fib (- n 2))))
            )
        )))
        (assert (== (fib 10) 89) "(fib 10) failed!")
        (fib 10)
    "#);
    assert_eq!(value, Value::number(89));
}

#[test]
fn factorial_through_an_accumulator() {
    let (value, _) = run(r#"
        (set fac (lambda (n) (
            (fac-tr 1 n)
        )))
        (set fac-tr (lambda (acc n) (
            (if (< n 2)
                (ret acc)
                (ret (fac-tr (* acc n) (- n 1)))
            )
        )))
        (fac 10)
    "#);
    assert_eq!(value, Value::number(3_628_800));
}

#[test]
fn closure_chain_produces_the_triple() {
    let (value, _) = run(r#"
        (set f (lambda (x) (
            (lambda (y) (
                (lambda (z) (list x y z))
            ))
        )))
        (((f 1) 2) 10)
    "#);
    assert_eq!(
        value,
        Value::list([Value::number(1), Value::number(2), Value::number(10)])
    );
}

#[test]
fn collatz_and_string_join() {
    let (_, output) = run(r#"
        (set f (lambda (n) (
            (set rv nil)
            (while (<> n 1) (
                (set rv (cons n rv))
                (if (% n 2)
                    (set n (+ (* 3 n) 1))
                    (set n (/ n 2))
                )
            ))
            (set rv (cons n rv))
        )))
        (set join (lambda (sep lst) (
            (set rv "")
            (while (<> lst nil) (
                (set rv (+ rv (+ sep (format (car lst)))))
                (set lst (cdr lst))
            ))
            (ret rv)
        )))
        (printf "(collatz 12) -> {}\n" (join " " (f 12)))
    "#);
    assert_eq!(output, "(collatz 12) ->  1 2 4 8 16 5 10 3 6 12\n");
}

#[test]
fn quoted_forms_evaluate_through_eval() {
    let (value, _) = run(r#"
        (set node '(+ 1 2))
        (assert (== (eval node) 3) "eval of a quoted form failed")
        (set code (parse "(* 6 7)"))
        (eval code)
    "#);
    assert_eq!(value, Value::number(42));
}

#[test]
fn parse_eval_round_trip_matches_direct_execution() {
    let direct = eval_source("(+ (* 3 3) (* 4 4))").unwrap();
    let round_trip = eval_source(r#"(eval (parse "(+ (* 3 3) (* 4 4))"))"#).unwrap();
    assert_eq!(direct, round_trip);
}

#[test]
fn read_prefers_the_injected_line_feeder() {
    let interp = Interp::new(r#"
        (set name (read))
        (printf "hello, {}\n" name)
        (set code (parse (read)))
        (print (eval code))
    "#)
    .unwrap();
    let env = Env::new();
    env.set("--stdin", Value::Func(Function::line_source(["Bob", "(+ 1 2)"])));
    let mut host = host();
    interp.run_tree_in(&env, &mut host).unwrap();
    assert_eq!(host.print.output(), "hello, Bob\n3\n");
}

#[test]
fn read_falls_back_to_the_host_source() {
    let interp = Interp::new(r#"(printf "got {}\n" (read))"#).unwrap();
    let mut host = Host::new(
        CollectString::new(),
        QueuedLines::new(["a line"]),
        NoopTracer,
        ScopeMode::Lexical,
    );
    interp.run_tree(&mut host).unwrap();
    assert_eq!(host.print.output(), "got a line\n");
}

#[test]
fn failing_assert_carries_its_message() {
    let err = eval_source(r#"(assert (== 1 2) "one is not two")"#).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProgramError);
    assert_eq!(err.message, "one is not two");
}

#[test]
fn calling_an_unbound_name_is_an_unknown_name_error() {
    let err = eval_source("(missing 1 2)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownName);
}

#[test]
fn wrong_argument_count_is_an_arity_error() {
    let err = eval_source("(set f (lambda (x y) (+ x y))) (f 1)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArityMismatch);
}

#[test]
fn print_formats_values() {
    let (_, output) = run(r#"(print "a" 1 true nil (list 1 2))"#);
    assert_eq!(output, "a 1 true nil (1 2)\n");
}

#[test]
fn printfs_joins_formatted_items() {
    let (_, output) = run(r#"(printfs "{}" " " 1 2 3)"#);
    assert_eq!(output, "1 2 3");
}
