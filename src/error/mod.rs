use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Invalid scenario: {message}")]
    Scenario { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Risk engine errors.
///
/// Numeric inputs outside [0, 1] are never errors (they are clamped), and an
/// infeasible escape is a normal analysis result, so this only covers caller
/// contract violations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session already exists: {session_id}")]
    SessionExists { session_id: String },

    #[error("Unknown escape protocol: {name}")]
    UnknownProtocol { name: String },

    #[error("Invalid protocol catalog: {message}")]
    InvalidCatalog { message: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
