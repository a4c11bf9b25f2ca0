//! Numeric, comparison, and boolean operators.

use std::rc::Rc;

use super::Builtin;
use crate::{
    decimal::Decimal,
    error::{Error, RunResult},
    value::{Function, Value},
};

/// Applies a unary operator to an unwrapped value.
pub fn unary(op: Builtin, arg: &Value) -> RunResult<Value> {
    match op {
        Builtin::Pos => match arg {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            other => Err(mismatch(op, other)),
        },
        Builtin::Neg => match arg {
            Value::Number(n) => Ok(Value::Number(n.neg())),
            other => Err(mismatch(op, other)),
        },
        // `not` accepts anything and negates truthiness.
        Builtin::Not => Ok(Value::Bool(!arg.truthy())),
        _ => Err(Error::new(
            crate::ErrorKind::BadInstruction,
            format!("{op} is not a unary operator"),
        )),
    }
}

/// Applies a binary operator to unwrapped values.
pub fn binary(op: Builtin, left: &Value, right: &Value) -> RunResult<Value> {
    match op {
        Builtin::Add => add(left, right),
        Builtin::Sub => numeric(op, left, right, |a, b| Ok(a.sub(b))),
        Builtin::Mul => numeric(op, left, right, |a, b| Ok(a.mul(b))),
        Builtin::Div => numeric(op, left, right, Decimal::div),
        Builtin::Mod => numeric(op, left, right, Decimal::rem),
        Builtin::Pow => numeric(op, left, right, Decimal::pow),
        Builtin::Eq => Ok(Value::Bool(left == right)),
        Builtin::Ne => Ok(Value::Bool(left != right)),
        Builtin::Lt => ordering(op, left, right, |ord| ord.is_lt()),
        Builtin::Gt => ordering(op, left, right, |ord| ord.is_gt()),
        Builtin::Le => ordering(op, left, right, |ord| ord.is_le()),
        Builtin::Ge => ordering(op, left, right, |ord| ord.is_ge()),
        Builtin::And => boolean(op, left, right, |a, b| a && b),
        Builtin::Or => boolean(op, left, right, |a, b| a || b),
        Builtin::Xor => boolean(op, left, right, |a, b| a ^ b),
        Builtin::Is => Ok(Value::Bool(is_identical(left, right))),
        _ => Err(Error::new(
            crate::ErrorKind::BadInstruction,
            format!("{op} is not a binary operator"),
        )),
    }
}

/// `+` adds numbers and concatenates strings.
fn add(left: &Value, right: &Value) -> RunResult<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.add(b))),
        (Value::Str(a), Value::Str(b)) => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::str(joined))
        }
        _ => Err(mismatch2(Builtin::Add, left, right)),
    }
}

fn numeric(
    op: Builtin,
    left: &Value,
    right: &Value,
    apply: impl FnOnce(&Decimal, &Decimal) -> RunResult<Decimal>,
) -> RunResult<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(apply(a, b)?)),
        _ => Err(mismatch2(op, left, right)),
    }
}

/// Ordering comparisons: numbers with numbers, strings with strings.
fn ordering(op: Builtin, left: &Value, right: &Value, test: impl FnOnce(std::cmp::Ordering) -> bool) -> RunResult<Value> {
    let ord = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => return Err(mismatch2(op, left, right)),
    };
    Ok(Value::Bool(test(ord)))
}

/// `and`/`or`/`xor` operate on booleans; both operands are already evaluated,
/// so there is no short-circuiting to preserve.
fn boolean(op: Builtin, left: &Value, right: &Value, apply: impl FnOnce(bool, bool) -> bool) -> RunResult<Value> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(apply(*a, *b))),
        _ => Err(mismatch2(op, left, right)),
    }
}

/// Identity comparison: reference identity for shared values, value identity
/// for immediates.
fn is_identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
        (Value::Cell(a), Value::Cell(b)) => Rc::ptr_eq(a, b),
        (Value::Quoted(a), Value::Quoted(b)) => Rc::ptr_eq(a, b),
        (Value::Func(a), Value::Func(b)) => Function::eq(a, b),
        _ => false,
    }
}

fn mismatch(op: Builtin, arg: &Value) -> Error {
    Error::type_mismatch(format!("{op} cannot be applied to {}", arg.type_name()))
}

fn mismatch2(op: Builtin, left: &Value, right: &Value) -> Error {
    Error::type_mismatch(format!(
        "{op} cannot be applied to {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn num(n: i64) -> Value {
        Value::number(n)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(binary(Builtin::Add, &num(3), &num(4)).unwrap(), num(7));
        assert_eq!(binary(Builtin::Sub, &num(3), &num(4)).unwrap(), num(-1));
        assert_eq!(binary(Builtin::Mul, &num(3), &num(4)).unwrap(), num(12));
        assert_eq!(binary(Builtin::Mod, &num(20), &num(15)).unwrap(), num(5));
        assert_eq!(binary(Builtin::Pow, &num(2), &num(5)).unwrap(), num(32));
        assert_eq!(unary(Builtin::Neg, &num(3)).unwrap(), num(-3));
    }

    #[test]
    fn string_concat() {
        let joined = binary(Builtin::Add, &Value::str("ab"), &Value::str("cd")).unwrap();
        assert_eq!(joined, Value::str("abcd"));
    }

    #[test]
    fn comparisons() {
        assert_eq!(binary(Builtin::Lt, &num(1), &num(2)).unwrap(), Value::Bool(true));
        assert_eq!(binary(Builtin::Ge, &num(1), &num(2)).unwrap(), Value::Bool(false));
        assert_eq!(
            binary(Builtin::Lt, &Value::str("a"), &Value::str("b")).unwrap(),
            Value::Bool(true)
        );
        assert!(binary(Builtin::Lt, &num(1), &Value::str("b")).is_err());
    }

    #[test]
    fn equality_across_kinds_is_false_not_an_error() {
        assert_eq!(binary(Builtin::Eq, &num(1), &Value::str("1")).unwrap(), Value::Bool(false));
        assert_eq!(binary(Builtin::Ne, &num(1), &Value::Nil).unwrap(), Value::Bool(true));
    }

    #[test]
    fn boolean_ops_require_bools() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(binary(Builtin::And, &t, &f).unwrap(), Value::Bool(false));
        assert_eq!(binary(Builtin::Or, &t, &f).unwrap(), Value::Bool(true));
        assert_eq!(binary(Builtin::Xor, &t, &t).unwrap(), Value::Bool(false));
        assert!(binary(Builtin::And, &t, &num(1)).is_err());
    }

    #[test]
    fn not_negates_truthiness() {
        assert_eq!(unary(Builtin::Not, &Value::Nil).unwrap(), Value::Bool(true));
        assert_eq!(unary(Builtin::Not, &num(5)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn is_compares_identity() {
        let cell = Value::cell(num(1), Value::Nil);
        assert_eq!(binary(Builtin::Is, &cell, &cell.clone()).unwrap(), Value::Bool(true));
        let other = Value::cell(num(1), Value::Nil);
        assert_eq!(binary(Builtin::Is, &cell, &other).unwrap(), Value::Bool(false));
        // structural equality still holds
        assert_eq!(binary(Builtin::Eq, &cell, &other).unwrap(), Value::Bool(true));
    }
}
