use thiserror::Error;

/// Tagged error kind shared by every layer above the persistence boundary.
///
/// Each handler maps a kind to its HTTP status explicitly instead of
/// matching on a thrown exception's message substring.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Infra(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        AppError::Auth(msg.into())
    }

    pub fn infra(msg: impl Into<String>) -> Self {
        AppError::Infra(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation(m)
            | AppError::Auth(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::Infra(m) => m,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
