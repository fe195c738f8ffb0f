use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    /// The pool is stopping or stopped and accepts no new jobs.
    #[error("Cover fetch pool is closed")]
    PoolClosed,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
