use thiserror::Error;

/// A path string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,
    #[error("empty segment at byte {at} in path '{path}'")]
    EmptySegment { path: String, at: usize },
    #[error("unclosed '[' at byte {at} in path '{path}'")]
    UnclosedBracket { path: String, at: usize },
    #[error("unterminated quote at byte {at} in path '{path}'")]
    UnterminatedQuote { path: String, at: usize },
}

/// A single path-keyed validation message, as reported by a schema or a
/// validator that fails with structured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by a validator.
///
/// `Invalid` is an ordinary validation failure and is merged into the errors
/// tree. `Crashed` means the validator itself is broken; it rejects the whole
/// validation run and reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    #[error("validation failed with {} issue(s)", .0.len())]
    Invalid(Vec<Issue>),
    #[error("validator crashed: {0}")]
    Crashed(String),
}

impl ValidatorError {
    pub fn crashed(msg: impl Into<String>) -> Self {
        Self::Crashed(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Path(#[from] PathError),
    /// The container was driven in a way its contract forbids.
    #[error("usage error: {0}")]
    Usage(String),
    #[error("validation aborted: {0}")]
    Validator(String),
    #[error("submit handler failed")]
    Submit(#[source] anyhow::Error),
    #[error("reset handler failed")]
    Reset(#[source] anyhow::Error),
}

impl From<ValidatorError> for FormError {
    fn from(err: ValidatorError) -> Self {
        match err {
            ValidatorError::Crashed(msg) => FormError::Validator(msg),
            invalid @ ValidatorError::Invalid(_) => FormError::Validator(invalid.to_string()),
        }
    }
}

pub type FormResult<T> = Result<T, FormError>;
