use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlansyncError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not a readable file: {0}")]
    NotAFile(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register filesystem watch on {path}: {reason}")]
    WatchRegistration { path: String, reason: String },

    #[error("invalid lifecycle state: {0}")]
    InvalidLifecycle(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),
}

pub type Result<T> = std::result::Result<T, PlansyncError>;
