//! Cell accessors and list construction.

use crate::{
    error::{Error, RunResult},
    value::Value,
};

/// `car`: the first component of a cell. Nil is not a cell.
pub fn first(value: &Value) -> RunResult<Value> {
    match value {
        Value::Cell(cell) => Ok(cell.car.clone()),
        other => Err(Error::type_mismatch(format!("car expects a cell, got {}", other.type_name()))),
    }
}

/// `cdr`: the second component of a cell. Nil is not a cell.
pub fn rest(value: &Value) -> RunResult<Value> {
    match value {
        Value::Cell(cell) => Ok(cell.cdr.clone()),
        other => Err(Error::type_mismatch(format!("cdr expects a cell, got {}", other.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn car_and_cdr_walk_a_list() {
        let list = Value::list([Value::number(1), Value::number(2), Value::number(3)]);
        assert_eq!(first(&list).unwrap(), Value::number(1));
        let tail = rest(&list).unwrap();
        assert_eq!(first(&tail).unwrap(), Value::number(2));
    }

    #[test]
    fn car_of_nil_is_an_error() {
        assert!(first(&Value::Nil).is_err());
        assert!(rest(&Value::Nil).is_err());
    }
}
