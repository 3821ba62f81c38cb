use thiserror::Error;

use crate::auth::ValidationErrors;
use crate::client::error_messages;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Client error: {0}")]
    ClientError(#[from] ClientError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(ValidationErrors),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Coarse classification of every failure the crate can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCredentials,
    EmailTaken,
    UserNotFound,
    ValidationFailed,
    StorageUnavailable,
    Unauthorized,
    Busy,
    Unexpected,
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError(errors)
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
                AuthError::EmailTaken => ErrorKind::EmailTaken,
                AuthError::UserNotFound => ErrorKind::UserNotFound,
                AuthError::Unauthorized => ErrorKind::Unauthorized,
                AuthError::InFlight | AuthError::NotReady => ErrorKind::Busy,
            },
            AppError::StorageError(_) => ErrorKind::StorageUnavailable,
            AppError::ClientError(ClientError::Api { status: 401, .. }) => ErrorKind::Unauthorized,
            AppError::ValidationError(_) => ErrorKind::ValidationFailed,
            AppError::ClientError(_) | AppError::ConfigError(_) | AppError::Unexpected(_) => {
                ErrorKind::Unexpected
            }
        }
    }

    /// Text suitable for showing to the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError(_) => "Please fix the errors in the form".to_string(),
            AppError::ClientError(ClientError::Api {
                status,
                error,
                message,
            }) => error_messages::describe(*status, error.as_deref(), message.as_deref()),
            AppError::StorageError(_) => "Local storage is not available".to_string(),
            _ => error_messages::UNEXPECTED.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("This email is already registered")]
    EmailTaken,

    #[error("This user does not exist")]
    UserNotFound,

    #[error("Session expired or invalid")]
    Unauthorized,

    #[error("Another authentication request is already in progress")]
    InFlight,

    #[error("Authentication state has not been loaded yet")]
    NotReady,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Quota exceeded writing {key}: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::StorageError(err.into())
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        error: Option<String>,
        message: Option<String>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::RequestFailed(err.to_string())
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ClientError(err.into())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ClientError(err.into())
    }
}
