use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Worker error: {0}")]
    WorkerError(String),
}

pub type Result<T> = std::result::Result<T, SaveError>;

impl<T> From<std::sync::PoisonError<T>> for SaveError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl SaveError {
    /// Wraps an `std::io::Error` with the operation and path it failed on.
    pub fn io(action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        Self::IoError(format!("Failed to {} '{}': {}", action, path.display(), err))
    }
}
