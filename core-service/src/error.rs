use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("A sync is already in progress")]
    SyncInProgress,

    #[error("Service has been shut down")]
    ShutDown,

    #[error("Configuration error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] core_metadata::MetadataError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
