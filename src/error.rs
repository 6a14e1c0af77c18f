use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application-level error taxonomy.
///
/// `Validation` and `NotFound` are caller mistakes and map to 4xx at the
/// transport layer; everything else is a 5xx. Transfer-level rule failures
/// (including insufficient funds) are NOT errors: they travel back inside
/// `TransferOutcome` so the caller gets the full accumulated rule list.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("source error: {0}")]
    SourceIo(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn source_io(msg: impl Into<String>) -> Self {
        AppError::SourceIo(msg.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::SourceIo(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::SourceIo(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::SourceIo(err.to_string())
    }
}
