//! Surface syntax: tokenizer, paren-tree builder, and AST builder.
//!
//! Tokens are names, string literals, and parentheses; `'(` opens a quoted
//! form equivalent to `(quoted …)`. `/* … */` block comments nest and are
//! stripped before tokenization. The paren-tree builder produces a nested
//! tree of raw token strings, which the AST builder maps to typed nodes.

use std::{fmt, rc::Rc, sync::LazyLock};

use regex::Regex;

use crate::{
    error::{Error, RunResult},
    nodes::{BinaryOp, CallTarget, Node, UnaryOp},
    value::Value,
};

/// One token alternative per branch: string literal, quoted or plain open
/// paren, close paren, bare name.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|'?\(|\)|[^"'()\s]+"#).expect("token regex is valid"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("number regex is valid"));

/// A nested tree of raw tokens: the output of the paren-tree builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenTree {
    Leaf(String),
    List(Vec<TokenTree>),
}

impl fmt::Display for TokenTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(token) => write!(f, "{token}"),
            Self::List(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Replaces nestable `/* … */` comments with spaces, leaving strings intact.
fn strip_comments(source: &str) -> RunResult<String> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut depth = 0usize;
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if depth > 0 {
            match c {
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    depth += 1;
                }
                '*' if chars.peek() == Some(&'/') => {
                    chars.next();
                    depth -= 1;
                    if depth == 0 {
                        out.push(' ');
                    }
                }
                _ => {}
            }
            continue;
        }
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                depth = 1;
            }
            _ => out.push(c),
        }
    }
    if depth > 0 {
        return Err(Error::syntax("unterminated block comment"));
    }
    Ok(out)
}

/// Splits source text into tokens.
///
/// Fails when a non-whitespace character is not part of any token (for
/// example an unterminated string literal).
pub fn tokenize(source: &str) -> RunResult<Vec<String>> {
    let stripped = strip_comments(source)?;
    let mut tokens = Vec::new();
    let mut last_end = 0;
    for found in TOKEN_RE.find_iter(&stripped) {
        let gap = &stripped[last_end..found.start()];
        if !gap.trim().is_empty() {
            return Err(Error::syntax(format!("unexpected characters: {:?}", gap.trim())));
        }
        tokens.push(found.as_str().to_owned());
        last_end = found.end();
    }
    let tail = &stripped[last_end..];
    if !tail.trim().is_empty() {
        return Err(Error::syntax(format!("unexpected characters: {:?}", tail.trim())));
    }
    Ok(tokens)
}

/// Builds the nested paren tree for a token stream.
///
/// Returns the list of top-level forms. `'(` wraps its form in
/// `(quoted …)`.
pub fn build_tree(tokens: impl IntoIterator<Item = String>) -> RunResult<Vec<TokenTree>> {
    // Each stack entry is (collected items, was opened by '().
    let mut stack: Vec<(Vec<TokenTree>, bool)> = vec![(Vec::new(), false)];
    for token in tokens {
        match token.as_str() {
            "(" => stack.push((Vec::new(), false)),
            "'(" => stack.push((Vec::new(), true)),
            ")" => {
                let (items, quoted) = stack.pop().expect("stack is never empty");
                if stack.is_empty() {
                    return Err(Error::syntax("unbalanced ')'"));
                }
                let tree = if quoted {
                    TokenTree::List(vec![TokenTree::Leaf("quoted".to_owned()), TokenTree::List(items)])
                } else {
                    TokenTree::List(items)
                };
                stack
                    .last_mut()
                    .expect("stack still has the root entry")
                    .0
                    .push(tree);
            }
            _ => stack
                .last_mut()
                .expect("stack is never empty")
                .0
                .push(TokenTree::Leaf(token)),
        }
    }
    if stack.len() != 1 {
        return Err(Error::syntax("unclosed '('"));
    }
    Ok(stack.pop().expect("root entry remains").0)
}

/// Parses source text into an AST.
///
/// A top-level bare sequence of forms becomes an implicit suite.
pub fn parse_source(source: &str) -> RunResult<Node> {
    let tokens = tokenize(source)?;
    let mut forms = build_tree(tokens)?;
    if forms.len() == 1 {
        build_node(&forms.pop().expect("one form present"))
    } else {
        build_node(&TokenTree::List(forms))
    }
}

/// Interprets the escape sequences of a string literal body.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn build_leaf(token: &str) -> RunResult<Node> {
    if NUMBER_RE.is_match(token) {
        let number = token
            .parse()
            .map_err(|err: String| Error::syntax(format!("bad number literal: {err}")))?;
        return Ok(Node::Atom(Value::Number(number)));
    }
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        return Ok(Node::Atom(Value::str(unescape(&token[1..token.len() - 1]))));
    }
    match token {
        "nil" => Ok(Node::Nil),
        "true" => Ok(Node::True),
        "false" => Ok(Node::False),
        _ => Ok(Node::Var(token.to_owned())),
    }
}

/// True for leaves usable as binding or call names.
fn is_plain_name(token: &str) -> bool {
    !NUMBER_RE.is_match(token) && !token.starts_with('"') && !matches!(token, "nil" | "true" | "false")
}

/// Head words with dedicated forms; a malformed use of one is a sentinel,
/// not a call.
fn is_reserved(token: &str) -> bool {
    matches!(
        token,
        "set"
            | "setg"
            | "setc"
            | "get"
            | "lambda"
            | "if"
            | "while"
            | "assert"
            | "list"
            | "cons"
            | "car"
            | "cdr"
            | "parse"
            | "eval"
            | "read"
            | "quoted"
            | "ret"
            | "print"
            | "printf"
            | "printfs"
            | "format"
            | "not"
            | "and"
            | "or"
            | "xor"
            | "is"
            | "+"
            | "-"
            | "*"
            | "/"
            | "%"
            | "**"
            | "=="
            | "<>"
            | "<"
            | ">"
            | "<="
            | ">="
    )
}

fn build_all(items: &[TokenTree]) -> RunResult<Vec<Node>> {
    items.iter().map(build_node).collect()
}

/// One body form is used as is; several become a suite.
fn build_body(name: &str, items: &[TokenTree]) -> RunResult<Node> {
    match items {
        [] => Err(Error::syntax(format!("{name} needs a body"))),
        [single] => build_node(single),
        _ => Ok(Node::Suite(build_all(items)?)),
    }
}

fn param_names(tree: &TokenTree) -> Option<Vec<String>> {
    let TokenTree::List(items) = tree else { return None };
    items
        .iter()
        .map(|item| match item {
            TokenTree::Leaf(token) if is_plain_name(token) => Some(token.clone()),
            _ => None,
        })
        .collect()
}

/// Maps a token tree to a typed AST node.
///
/// Unrecognized forms become a `NotImplemented` sentinel that fails at
/// evaluation time rather than here.
pub fn build_node(tree: &TokenTree) -> RunResult<Node> {
    let TokenTree::List(items) = tree else {
        let TokenTree::Leaf(token) = tree else { unreachable!() };
        return build_leaf(token);
    };

    // A list of lists is a suite of sequential forms.
    if items.iter().all(|item| matches!(item, TokenTree::List(_))) {
        return Ok(Node::Suite(build_all(items)?));
    }

    let (head, rest) = items.split_first().expect("non-suite lists are non-empty");

    if let TokenTree::List(_) = head {
        // Callable-expression target, e.g. ((f 1) 2).
        return Ok(Node::Call {
            target: CallTarget::Expr(Box::new(build_node(head)?)),
            args: build_all(rest)?,
        });
    }
    let TokenTree::Leaf(head) = head else { unreachable!() };

    let node = match (head.as_str(), rest) {
        ("set", [TokenTree::Leaf(name), expr]) if is_plain_name(name) => Node::Set {
            name: name.clone(),
            expr: Box::new(build_node(expr)?),
        },
        ("setg", [TokenTree::Leaf(name), expr]) if is_plain_name(name) => Node::Setg {
            name: name.clone(),
            expr: Box::new(build_node(expr)?),
        },
        ("setc", [TokenTree::Leaf(name), expr]) if is_plain_name(name) => Node::Setc {
            name: name.clone(),
            expr: Box::new(build_node(expr)?),
        },
        ("get", [TokenTree::Leaf(name)]) if is_plain_name(name) => Node::Get(name.clone()),
        ("lambda", [params, body @ ..]) if param_names(params).is_some() => Node::Lambda {
            params: param_names(params).expect("checked by the guard"),
            body: Rc::new(build_body("lambda", body)?),
        },
        ("if", [cond, then]) => Node::IfElse {
            cond: Box::new(build_node(cond)?),
            then: Box::new(build_node(then)?),
            orelse: None,
        },
        ("if", [cond, then, orelse]) => Node::IfElse {
            cond: Box::new(build_node(cond)?),
            then: Box::new(build_node(then)?),
            orelse: Some(Box::new(build_node(orelse)?)),
        },
        ("while", [cond, body @ ..]) if !body.is_empty() => Node::While {
            cond: Box::new(build_node(cond)?),
            body: Box::new(build_body("while", body)?),
        },
        ("assert", [cond, msg]) => Node::Assert {
            cond: Box::new(build_node(cond)?),
            msg: Box::new(build_node(msg)?),
        },
        ("list", args) => Node::List(build_all(args)?),
        ("cons", [car, cdr]) => Node::Cons {
            car: Box::new(build_node(car)?),
            cdr: Box::new(build_node(cdr)?),
        },
        ("car", [cell]) => Node::Car(Box::new(build_node(cell)?)),
        ("cdr", [cell]) => Node::Cdr(Box::new(build_node(cell)?)),
        ("parse", [expr]) => Node::Parse(Box::new(build_node(expr)?)),
        ("eval", [expr]) => Node::Eval(Box::new(build_node(expr)?)),
        ("read", []) => Node::Read,
        ("quoted", [form]) => Node::Atom(Value::Quoted(Rc::new(build_node(form)?))),
        ("ret", [expr]) => Node::Ret(Box::new(build_node(expr)?)),
        ("print", args) => Node::Print(build_all(args)?),
        ("printf", args) if !args.is_empty() => Node::Printf(build_all(args)?),
        ("printfs", args) if args.len() >= 2 => Node::Printfs(build_all(args)?),
        ("format", [expr]) => Node::Format(Box::new(build_node(expr)?)),

        ("+", [arg]) => unary(UnaryOp::Pos, arg)?,
        ("-", [arg]) => unary(UnaryOp::Neg, arg)?,
        ("not", [arg]) => unary(UnaryOp::Not, arg)?,
        ("+", [left, right]) => binary(BinaryOp::Add, left, right)?,
        ("-", [left, right]) => binary(BinaryOp::Sub, left, right)?,
        ("*", [left, right]) => binary(BinaryOp::Mul, left, right)?,
        ("/", [left, right]) => binary(BinaryOp::Div, left, right)?,
        ("%", [left, right]) => binary(BinaryOp::Mod, left, right)?,
        ("**", [left, right]) => binary(BinaryOp::Pow, left, right)?,
        ("==", [left, right]) => binary(BinaryOp::Eq, left, right)?,
        ("<>", [left, right]) => binary(BinaryOp::Ne, left, right)?,
        ("<", [left, right]) => binary(BinaryOp::Lt, left, right)?,
        (">", [left, right]) => binary(BinaryOp::Gt, left, right)?,
        ("<=", [left, right]) => binary(BinaryOp::Le, left, right)?,
        (">=", [left, right]) => binary(BinaryOp::Ge, left, right)?,
        ("and", [left, right]) => binary(BinaryOp::And, left, right)?,
        ("or", [left, right]) => binary(BinaryOp::Or, left, right)?,
        ("xor", [left, right]) => binary(BinaryOp::Xor, left, right)?,
        ("is", [left, right]) => binary(BinaryOp::Is, left, right)?,

        (name, args) if name.starts_with('^') && name.len() > 1 => Node::TailCall {
            name: name[1..].to_owned(),
            args: build_all(args)?,
        },
        (name, args) if is_plain_name(name) && !is_reserved(name) => Node::Call {
            target: CallTarget::Name(name.to_owned()),
            args: build_all(args)?,
        },
        _ => Node::NotImplemented(tree.to_string()),
    };
    Ok(node)
}

fn unary(op: UnaryOp, arg: &TokenTree) -> RunResult<Node> {
    Ok(Node::Unary {
        op,
        arg: Box::new(build_node(arg)?),
    })
}

fn binary(op: BinaryOp, left: &TokenTree, right: &TokenTree) -> RunResult<Node> {
    Ok(Node::Binary {
        op,
        left: Box::new(build_node(left)?),
        right: Box::new(build_node(right)?),
    })
}
