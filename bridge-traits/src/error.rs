use thiserror::Error;

/// Failure reported by a host bridge. The core treats all of these as
/// recoverable: it logs them and carries on with defaults.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Nothing to offer for this input, e.g. no cover art exists
    #[error("Not available: {0}")]
    NotAvailable(String),

    /// The bridge cannot make sense of the file it was handed
    #[error("Unreadable file {path}: {reason}")]
    UnreadableFile { path: String, reason: String },

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn unreadable(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::UnreadableFile {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
