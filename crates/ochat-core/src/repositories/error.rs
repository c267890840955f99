use thiserror::Error;

#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Repository initialization failed: {message}")]
    InitializationError { message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Storage quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("Storage access denied: {message}")]
    AccessDenied { message: String },

    #[error("Invalid storage key: {key:?}")]
    InvalidKey { key: String },
}

impl RepositoryError {
    /// Sort an I/O failure into quota, permission or plain I/O.
    pub fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::PermissionDenied => RepositoryError::AccessDenied {
                message: err.to_string(),
            },
            ErrorKind::StorageFull | ErrorKind::QuotaExceeded => RepositoryError::QuotaExceeded {
                message: err.to_string(),
            },
            _ => RepositoryError::IoError(err),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
