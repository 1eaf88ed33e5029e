use thiserror::Error;

use crate::asm::lexer::Span;

/// Top-level error type for the codec and the `qgate` binary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("[syntax error] {0}")]
    Parse(#[from] ParseError),

    #[error("[print error] {0}")]
    Print(#[from] PrintError),

    #[error("[construction error] {0}")]
    Construction(#[from] ConstructionError),

    #[error("[config error] {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// --- parse errors ---

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },

    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("invalid literal '{text}'")]
    InvalidLiteral { text: String, span: Span },

    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unknown type '{keyword}'")]
    UnknownType { keyword: String, span: Span },

    #[error("malformed '{keyword}' type")]
    MalformedType { keyword: String, span: Span },

    #[error("invalid base type '{base}' for controlled gate, expected gate1, gate2 or circuit")]
    InvalidBaseType { base: String, span: Span },

    #[error("{source}")]
    InvalidType {
        #[source]
        source: ConstructionError,
        span: Span,
    },

    #[error("expected value reference or integer, found '{found}'")]
    ExpectedOperandOrInteger { found: String, span: Span },

    #[error("number of provided operand types ({got}) doesn't match expected ({expected})")]
    OperandTypeCountMismatch {
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("missing '{delimiter}', found '{found}'")]
    MissingDelimiter {
        delimiter: char,
        found: String,
        span: Span,
    },

    #[error("'{mnemonic}' is missing its rotation parameter")]
    MissingRotationParameter { mnemonic: String, span: Span },

    #[error("unknown instruction '{name}'")]
    UnknownInstruction { name: String, span: Span },

    #[error("'{mnemonic}' takes at most {max} operands")]
    TooManyOperands {
        mnemonic: String,
        max: usize,
        span: Span,
    },

    #[error("'{mnemonic}' needs at least {required} operands, found {found}")]
    MissingOperands {
        mnemonic: String,
        required: usize,
        found: usize,
        span: Span,
    },

    #[error("tag '{name}' is reserved for operand bookkeeping")]
    ReservedTag { name: String, span: Span },

    #[error("tag '{name}' is given more than once")]
    DuplicateTag { name: String, span: Span },

    #[error("{names} result names bound to {types} result types")]
    ResultCountMismatch {
        names: usize,
        types: usize,
        span: Span,
    },

    #[error("'%{name}' is used as '{found}' but was first seen as '{expected}'")]
    ValueTypeMismatch {
        name: String,
        expected: String,
        found: String,
        span: Span,
    },

    #[error("'%{name}' is defined more than once")]
    DuplicateDefinition { name: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedChar { span, .. }
            | ParseError::UnterminatedString { span }
            | ParseError::InvalidLiteral { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnknownType { span, .. }
            | ParseError::MalformedType { span, .. }
            | ParseError::InvalidBaseType { span, .. }
            | ParseError::InvalidType { span, .. }
            | ParseError::ExpectedOperandOrInteger { span, .. }
            | ParseError::OperandTypeCountMismatch { span, .. }
            | ParseError::MissingDelimiter { span, .. }
            | ParseError::MissingRotationParameter { span, .. }
            | ParseError::UnknownInstruction { span, .. }
            | ParseError::TooManyOperands { span, .. }
            | ParseError::MissingOperands { span, .. }
            | ParseError::ReservedTag { span, .. }
            | ParseError::DuplicateTag { span, .. }
            | ParseError::ResultCountMismatch { span, .. }
            | ParseError::ValueTypeMismatch { span, .. }
            | ParseError::DuplicateDefinition { span, .. } => *span,
        }
    }

    /// Stable diagnostic code, printed by the CLI next to the message.
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            ParseError::UnexpectedChar { .. } => "E0001",
            ParseError::UnterminatedString { .. } => "E0002",
            ParseError::InvalidLiteral { .. } => "E0003",
            ParseError::UnexpectedToken { .. } => "E0004",
            ParseError::UnknownType { .. } => "E0100",
            ParseError::MalformedType { .. } => "E0101",
            ParseError::InvalidBaseType { .. } => "E0102",
            ParseError::InvalidType { .. } => "E0103",
            ParseError::ExpectedOperandOrInteger { .. } => "E0200",
            ParseError::OperandTypeCountMismatch { .. } => "E0201",
            ParseError::MissingDelimiter { .. } => "E0202",
            ParseError::MissingRotationParameter { .. } => "E0203",
            ParseError::UnknownInstruction { .. } => "E0204",
            ParseError::TooManyOperands { .. } => "E0205",
            ParseError::MissingOperands { .. } => "E0206",
            ParseError::ReservedTag { .. } => "E0300",
            ParseError::DuplicateTag { .. } => "E0301",
            ParseError::ResultCountMismatch { .. } => "E0400",
            ParseError::ValueTypeMismatch { .. } => "E0401",
            ParseError::DuplicateDefinition { .. } => "E0402",
        }
    }
}

// --- construction errors ---

/// Raised when a type or instruction is built with arguments that violate its
/// invariants. These indicate a caller bug rather than bad input text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("invalid {what}: {detail}")]
    InvalidConstructionInvariant { what: &'static str, detail: String },

    #[error("'{mnemonic}' is not a {expected} instruction")]
    WrongForm {
        mnemonic: String,
        expected: &'static str,
    },

    #[error("'{mnemonic}' takes at most {max} operands")]
    TooManyOperands { mnemonic: String, max: usize },
}

impl ConstructionError {
    pub fn invariant(what: &'static str, detail: impl Into<String>) -> Self {
        ConstructionError::InvalidConstructionInvariant {
            what,
            detail: detail.into(),
        }
    }
}

// --- print errors ---

/// Raised when an instruction record is internally inconsistent and cannot be
/// printed. Records produced by the parser or the builders never trigger these.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("'{mnemonic}' is missing structural tag '{name}'")]
    MissingTag { mnemonic: String, name: String },

    #[error("'{mnemonic}' has tag '{name}' of the wrong kind")]
    WrongTagKind { mnemonic: String, name: String },

    #[error("'{mnemonic}' ran out of operands while printing")]
    OperandUnderflow { mnemonic: String },

    #[error("'{mnemonic}' has {extra} operands not covered by its segment sizes")]
    OperandOverflow { mnemonic: String, extra: usize },

    #[error("'{mnemonic}' has {operands} operands but {types} operand types")]
    TypeCountMismatch {
        mnemonic: String,
        operands: usize,
        types: usize,
    },

    #[error("formatter failed: {0}")]
    Fmt(#[from] std::fmt::Error),
}

// --- config errors ---

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("instruction '{name}' is defined twice")]
    DuplicateOp { name: String },

    #[error("instruction '{name}': {detail}")]
    InvalidOp { name: String, detail: String },
}
