use thiserror::Error;

/// Rejections raised while compiling a query specification.
///
/// Every variant is surfaced before any document is evaluated; a malformed
/// predicate never degrades into an always-true or always-false filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("$not requires a regex or an operator document")]
    NotRequiresDocument,

    #[error("$not operand must not be empty")]
    EmptyNot,

    #[error("$not cannot be nested")]
    NestedNot,

    #[error("operator {0} is not allowed inside $not")]
    DisallowedInNot(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("field {0} mixes operators and plain keys")]
    MixedOperatorDocument(String),

    #[error("$options requires $regex")]
    OptionsWithoutRegex,

    #[error("bad operand for {op}: {reason}")]
    BadOperand { op: String, reason: String },

    #[error("invalid regex: {0}")]
    InvalidRegex(String),
}

impl CompileError {
    pub(crate) fn bad_operand(op: &str, reason: impl Into<String>) -> Self {
        Self::BadOperand { op: op.to_string(), reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Query compile error: {0}")]
    Compile(#[from] CompileError),
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
