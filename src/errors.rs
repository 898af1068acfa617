use serde::Serialize;
use thiserror::Error;

/// Application-wide error types that serialize cleanly to JSON for CLI and log consumers.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Connectivity failures that are worth retrying on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Unreachable(_))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AppError::Unreachable(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            AppError::NotLoggedIn
        } else {
            AppError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<notify::Error> for AppError {
    fn from(err: notify::Error) -> Self {
        AppError::Io(format!("File watcher error: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Io(format!("Background task failed: {}", err))
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;
