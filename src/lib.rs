//! Pegovka - lazy combinator-calculus interpreter
//!
//! This crate interprets programs written in a lazy, graph-reduction
//! combinator calculus, exchanges values with a remote stateful endpoint
//! over a custom binary wire format, and drives a request/response
//! interaction loop that alternates between local evaluation and remote
//! calls.
//!
//! ## Language
//!
//! A module is one definition per line, `name = token token ...`, with no
//! operator precedence: `ap` is a binary prefix application operator that
//! consumes exactly the next two sub-expressions, integer tokens match
//! `-?[0-9]+`, and any other token is a symbol reference.
//!
//! ```text
//! galaxy = :1338
//! :1338 = ap ap cons 42 nil
//! ```
//!
//! Evaluation is lazy: applications pass argument graphs unevaluated, and
//! every application node caches its forced result so shared sub-graphs are
//! reduced at most once. Lists are a naming convention over right-nested
//! `cons`/`nil` pairs; there is no native sequence type.
//!
//! ## Modules
//!
//! - `ast`: the expression graph (`Node`, `Value`) and construction helpers
//! - `combinators`: the fixed builtin library and its reduction rules
//! - `evaluator`: environment plus the lazy, memoizing `force`/`apply` core
//! - `parser`: module-source and expression parsing
//! - `modem`: the modulate/demodulate binary codec
//! - `protocol`: the remote transport and the recursive interaction driver
//! - `render`: picture decoding and the frame renderer

use std::fmt;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed definitions)
    InvalidSyntax,
    /// Input ended before the expression was complete
    Incomplete,
    /// Extra input found after a complete, valid expression
    TrailingContent,
}

/// A structured error describing a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
        }
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    /// A symbol did not resolve to any environment entry
    UnboundSymbol(String),
    /// An application forced its function position to a non-callable value
    NotCallable(String),
    /// A coercion expected an integer, pair or list and found something else
    TypeError(String),
    DivisionByZero,
    /// A forced value was neither an integer nor a pair/nil structure
    UnmodulatableValue(String),
    /// Demodulation hit an invalid tag, a truncated length run or too few bits
    MalformedEncoding(String),
    /// The transport was invoked without the credential it needs
    ConfigurationError(String),
    /// The remote endpoint answered with a non-success status
    TransportFailure { status: u16, body: String },
    /// A transformed point fell outside the drawing canvas
    RenderBounds { x: i64, y: i64 },
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => write!(f, "ParseError: {}", e.message),
            Error::UnboundSymbol(name) => write!(f, "Unbound symbol: {name}"),
            Error::NotCallable(what) => write!(f, "Cannot apply non-callable value: {what}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::DivisionByZero => write!(f, "Division by zero"),
            Error::UnmodulatableValue(what) => write!(f, "Cannot modulate value: {what}"),
            Error::MalformedEncoding(msg) => write!(f, "Malformed signal: {msg}"),
            Error::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            Error::TransportFailure { status, body } => {
                write!(f, "Transport failure (HTTP {status}): {body}")
            }
            Error::RenderBounds { x, y } => write!(f, "No canvas space for pixel ({x}, {y})"),
            Error::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod combinators;
pub mod evaluator;
pub mod modem;
pub mod parser;
pub mod protocol;
pub mod render;
