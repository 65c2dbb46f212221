use std::path::PathBuf;

use thiserror::Error;

use crate::ast::Position;

pub type ScriptResult<T> = std::result::Result<T, EngineError>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ParseErrorKind {
    #[error("Parser stop at here, unexpected {found}")]
    UnexpectedToken { found: String },
    #[error("Illegal character '{0}'")]
    IllegalCharacter(char),
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Unterminated block comment")]
    UnterminatedComment,
    #[error("Invalid escape sequence in string literal")]
    InvalidEscape,
    #[error("Invalid number literal '{literal}'")]
    InvalidNumber { literal: String },
    #[error("Variable '{name}' is not declared")]
    UndeclaredVariable { name: String },
    #[error("Variable '{name}' is already declared in this scope")]
    DuplicateVariable { name: String },
    #[error("Unknown loop label '{label}'")]
    UnknownLabel { label: String },
    #[error("'{keyword}' used outside of a loop")]
    NotInLoop { keyword: String },
    #[error("Unknown loop status 'for.{property}', expected 'for.iter'")]
    InvalidLoopStatus { property: String },
    /// The parser tables or the semantic actions disagree with each other.
    /// This is never caused by template input.
    #[error("Parser tables are inconsistent: {0}")]
    CorruptTables(String),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("Parse error at line {line}, column {column}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    #[source]
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub const fn new(line: usize, column: usize, kind: ParseErrorKind) -> Self {
        Self { line, column, kind }
    }
}

/// Failure raised while executing a template, before a source position has
/// been attached to it.
#[derive(Debug, Error)]
pub enum RuntimeErrorKind {
    #[error("Unsupported operand types for '{op}': {left} and {right}")]
    UnsupportedOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("Unsupported operand type for '{op}': {operand}")]
    UnsupportedOperand {
        op: &'static str,
        operand: &'static str,
    },
    #[error("Divide by zero")]
    DivideByZero,
    #[error("Integer overflow in '{op}'")]
    IntegerOverflow { op: &'static str },
    #[error("Not iterable: {type_name}")]
    NotIterable { type_name: String },
    #[error("Not a function but a [{type_name}]")]
    NotFunction { type_name: String },
    #[error("no more next")]
    NoSuchElement,
    #[error("Invalid property or can't read: {type_name}#{property}")]
    NoSuchProperty { type_name: String, property: String },
    #[error("Invalid property or can't write: {type_name}#{property}")]
    PropertyNotWritable { type_name: String, property: String },
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("{name}: {message}")]
    Native { name: String, message: String },
    /// A positioned error raised deeper in the tree (for example inside a
    /// loop filter function). Its original position is kept.
    #[error(transparent)]
    Nested(Box<RuntimeError>),
}

impl From<RuntimeError> for RuntimeErrorKind {
    fn from(error: RuntimeError) -> Self {
        Self::Nested(Box::new(error))
    }
}

#[derive(Debug, Error)]
#[error("Runtime error at line {line}, column {column}: {kind}")]
pub struct RuntimeError {
    pub line: usize,
    pub column: usize,
    #[source]
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    /// Attaches `pos` to `kind`. A nested error already carries the position
    /// of the node that raised it and is returned unchanged.
    pub fn at(pos: Position, kind: RuntimeErrorKind) -> Self {
        match kind {
            RuntimeErrorKind::Nested(inner) => *inner,
            kind => Self {
                line: pos.line,
                column: pos.column,
                kind,
            },
        }
    }

    pub const fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Template already exists: {template_name}")]
    TemplateExists { template_name: String },
    #[error("Template not found: {template_name}")]
    MissingTemplate { template_name: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Errors reading or writing persisted parser tables.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to access parser table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parser table resource {name} not found")]
    MissingResource { name: String },
    #[error("Malformed parser table {table}: {reason}")]
    Malformed { table: &'static str, reason: String },
}

/// Errors compiling a grammar into parser tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("Grammar has no productions")]
    Empty,
    #[error("Production {production} refers to unknown symbol {symbol}")]
    UnknownSymbol { production: usize, symbol: String },
    #[error("Grammar produces more than {limit} states or symbols")]
    TooLarge { limit: usize },
}
