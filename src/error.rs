//! Error types for blobkv

use thiserror::Error;

/// Result type alias for blobkv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blobkv operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Key {0} not found.")]
    KeyNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Config error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category, for callers that branch on failure type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    KeyNotFound,
    InvalidKey,
    BackendUnavailable,
    PermissionDenied,
    Deserialization,
    Configuration,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::KeyNotFound(_) | Error::ObjectNotFound(_) => ErrorKind::KeyNotFound,
            Error::InvalidKey(_) => ErrorKind::InvalidKey,
            Error::BackendUnavailable(_) | Error::Io(_) => ErrorKind::BackendUnavailable,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::Deserialization(_) => ErrorKind::Deserialization,
            Error::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// True when the failure means "nothing stored under that name"
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::KeyNotFound
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Deserialization(e.to_string())
    }
}
