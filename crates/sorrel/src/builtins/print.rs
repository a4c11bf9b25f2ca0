//! The `print`/`printf`/`printfs`/`format` builtins.

use crate::{
    error::{Error, RunResult},
    io::PrintWriter,
    value::Value,
};

/// `print`: space-separated displays followed by a newline. Returns nil.
pub fn print_values<P: PrintWriter>(args: &[Value], print: &mut P) -> RunResult<Value> {
    for (idx, value) in args.iter().enumerate() {
        if idx > 0 {
            print.push_char(' ')?;
        }
        print.write_text(&value.to_string())?;
    }
    print.push_char('\n')?;
    Ok(Value::Nil)
}

/// `printf fmt args…`: `{}` substitution, no trailing newline. Returns nil.
pub fn printf<P: PrintWriter>(args: &[Value], print: &mut P) -> RunResult<Value> {
    let fmt = template_arg(&args[0])?;
    print.write_text(&format_template(fmt, &args[1..])?)?;
    Ok(Value::Nil)
}

/// `printfs fmt sep args…`: formats each argument with `fmt` and joins the
/// results with `sep`, no trailing newline. Returns nil.
pub fn printfs<P: PrintWriter>(args: &[Value], print: &mut P) -> RunResult<Value> {
    let fmt = template_arg(&args[0])?;
    let sep = template_arg(&args[1])?;
    for (idx, value) in args[2..].iter().enumerate() {
        if idx > 0 {
            print.write_text(sep)?;
        }
        print.write_text(&format_template(fmt, std::slice::from_ref(value))?)?;
    }
    Ok(Value::Nil)
}

/// `format`: the display string of a value.
#[must_use]
pub fn format_value(value: &Value) -> Value {
    Value::str(value.to_string())
}

fn template_arg(value: &Value) -> RunResult<&str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Error::type_mismatch(format!(
            "format string must be a string, got {}",
            other.type_name()
        ))),
    }
}

/// Expands `{}` placeholders with successive argument displays.
///
/// A `{:spec}` placeholder is accepted and substituted the same way; the
/// format spec itself is not interpreted. `{{` and `}}` escape literal
/// braces.
pub fn format_template(fmt: &str, args: &[Value]) -> RunResult<String> {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut next_arg = 0;
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                // consume up to the closing brace, ignoring any format spec
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(_) => {}
                        None => return Err(Error::program("unmatched '{' in format string")),
                    }
                }
                let Some(value) = args.get(next_arg) else {
                    return Err(Error::program("not enough arguments for format string"));
                };
                next_arg += 1;
                out.push_str(&value.to_string());
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::io::CollectString;

    #[test]
    fn print_joins_with_spaces_and_newline() {
        let mut out = CollectString::new();
        print_values(&[Value::str("x ="), Value::number(3)], &mut out).unwrap();
        assert_eq!(out.output(), "x = 3\n");
    }

    #[test]
    fn printf_substitutes_placeholders() {
        let mut out = CollectString::new();
        printf(
            &[Value::str("x = {}, y = {}\n"), Value::number(1), Value::number(2)],
            &mut out,
        )
        .unwrap();
        assert_eq!(out.output(), "x = 1, y = 2\n");
    }

    #[test]
    fn printf_accepts_format_specs() {
        assert_eq!(
            format_template("x = {:5f}!", &[Value::number(7)]).unwrap(),
            "x = 7!"
        );
        assert_eq!(format_template("{{}}", &[]).unwrap(), "{}");
    }

    #[test]
    fn printf_rejects_missing_arguments() {
        assert!(format_template("{} {}", &[Value::number(1)]).is_err());
        assert!(format_template("{", &[]).is_err());
    }

    #[test]
    fn printfs_formats_each_and_joins() {
        let mut out = CollectString::new();
        printfs(
            &[
                Value::str("<{}>"),
                Value::str(", "),
                Value::number(1),
                Value::number(2),
                Value::number(3),
            ],
            &mut out,
        )
        .unwrap();
        assert_eq!(out.output(), "<1>, <2>, <3>");
    }
}
