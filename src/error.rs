//! Error types for the Food Roulette game engine

use serde::Serialize;
use thiserror::Error;

/// Stable error codes exposed to callers of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum ErrorCode {
    InvalidInput = 1,
    InvalidLocation = 2,
    NotFound = 3,
    GameSessionNotFound = 4,
    Forbidden = 5,
    Unauthorized = 6,
    Conflict = 7,
    GameAlreadyComplete = 8,
    NoCandidatesFound = 9,
    InvalidPeriod = 10,
    ExternalServiceUnavailable = 11,
    Timeout = 12,
    Internal = 13,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid location: latitude {latitude}, longitude {longitude}")]
    InvalidLocation { latitude: f64, longitude: f64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Game session {0} not found")]
    GameSessionNotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Game session {0} is already complete")]
    GameAlreadyComplete(String),

    #[error("No restaurants found for this round")]
    NoCandidatesFound,

    #[error("Invalid statistics period: {0}")]
    InvalidPeriod(String),

    #[error("External service unavailable: {0}")]
    ExternalService(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body handed to the transport layer
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::InvalidLocation { .. } => ErrorCode::InvalidLocation,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::GameSessionNotFound(_) => ErrorCode::GameSessionNotFound,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::Authentication(_) => ErrorCode::Unauthorized,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::GameAlreadyComplete(_) => ErrorCode::GameAlreadyComplete,
            AppError::NoCandidatesFound => ErrorCode::NoCandidatesFound,
            AppError::InvalidPeriod(_) => ErrorCode::InvalidPeriod,
            AppError::ExternalService(_) => ErrorCode::ExternalServiceUnavailable,
            AppError::Timeout(_) => ErrorCode::Timeout,
            AppError::Database(_) | AppError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Build the user-visible error body. Persistence details never leak.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let code = self.code();
        ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        }
    }

    /// True when the error is a unique-constraint violation reported by Postgres
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Conflict(_) => true,
            AppError::Database(sqlx::Error::Database(db)) => db.code().as_deref() == Some("23505"),
            _ => false,
        }
    }

    /// Turn a unique-constraint violation into `Conflict`, leaving other errors untouched
    pub fn or_conflict(self, message: impl FnOnce() -> String) -> Self {
        if self.is_unique_violation() {
            AppError::Conflict(message())
        } else {
            self
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(errors.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::ExternalService(format!("Redis: {}", e))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::ExternalService(format!("Place lookup: {}", e))
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
