use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Cover pool error: {0}")]
    Metadata(#[from] core_metadata::MetadataError),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sync cancelled")]
    Cancelled,
}

impl From<notify::Error> for SyncError {
    fn from(err: notify::Error) -> Self {
        SyncError::Watcher(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
