use tabula_core::TabulaError;
use tabula_grid::GridError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A local required/pattern/range check failed; nothing was sent
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The store rejected a statement or matched no rows
    #[error("Mutation failed: {0}")]
    Mutation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// The row had no usable key and inserting it failed too
    #[error("Could not resolve row: {0}")]
    Resolution(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Grid(#[from] GridError),
}

impl From<TabulaError> for ServiceError {
    fn from(err: TabulaError) -> Self {
        match err {
            TabulaError::Timeout(msg) => ServiceError::Timeout(msg),
            TabulaError::NotFound(msg) => ServiceError::NotFound(msg),
            TabulaError::Parse(msg) => ServiceError::Parse(msg),
            other => ServiceError::Gateway(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Transient message for the host's status area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == StatusLevel::Error
    }
}

impl From<&ServiceError> for StatusMessage {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::Validation(_) | ServiceError::Parse(_) => {
                StatusMessage::warning(err.to_string())
            }
            _ => StatusMessage::error(err.to_string()),
        }
    }
}
