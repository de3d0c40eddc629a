use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Command already exists with different content: {0}")]
    CommandConflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Outcome class a request router maps onto its own status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Conflict,
    InvalidArgument,
    Storage,
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::DeviceNotFound(_) | DomainError::CommandNotFound(_) => ErrorKind::NotFound,
            DomainError::Unauthorized | DomainError::InvalidToken(_) => ErrorKind::Unauthorized,
            DomainError::CommandConflict(_) => ErrorKind::Conflict,
            DomainError::ValidationError(_) => ErrorKind::InvalidArgument,
            DomainError::StorageError(_) => ErrorKind::Storage,
        }
    }
}
