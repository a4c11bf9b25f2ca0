use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, Error>;

/// Error kinds raised by the interpreter.
///
/// Guest kinds describe conditions a guest program can trigger through its own
/// source; host kinds (`StackUnderflow`, `MissingLabel`, `BadInstruction`) only
/// arise from malformed hand-assembled bytecode and indicate a bug in whatever
/// produced the instruction sequence. Nothing here is catchable from guest
/// code.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and
/// `Into<&'static str>` implementations; the string form matches the variant
/// name exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ErrorKind {
    /// A variable or call target is not bound in any environment frame.
    UnknownName,
    /// Raised by a failing `assert`, a reflective failure, or division by zero.
    ProgramError,
    /// An operator was applied to values of an incompatible kind.
    TypeMismatch,
    /// A builtin or user function was called with the wrong argument count.
    ArityMismatch,
    /// The AST builder refused to recognize a form.
    NotImplemented,
    /// The tokenizer or paren-tree builder rejected the source text.
    SyntaxError,

    // --- host-level kinds (bytecode bugs, not guest conditions) ---
    /// An instruction popped from an empty value stack.
    StackUnderflow,
    /// A jump referenced a label absent from the current frame.
    MissingLabel,
    /// An instruction could not be executed in the current frame state.
    BadInstruction,
}

impl ErrorKind {
    /// Returns true for kinds a guest program can trigger from source.
    ///
    /// Host kinds signal malformed bytecode rather than guest behavior.
    #[must_use]
    pub fn is_guest(self) -> bool {
        !matches!(self, Self::StackUnderflow | Self::MissingLabel | Self::BadInstruction)
    }
}

/// An interpreter error: a kind plus a human-readable message.
///
/// All errors abort the current evaluation; there is no guest-level catch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// An unbound-name error naming the missing binding.
    pub fn unknown_name(name: &str) -> Self {
        Self::new(ErrorKind::UnknownName, format!("name '{name}' is not bound"))
    }

    pub fn program(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProgramError, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    /// An arity error in the standard `expected N, got M` form.
    pub fn arity(what: &str, expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::ArityMismatch,
            format!("{what} expects {expected} argument(s), got {got}"),
        )
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}
