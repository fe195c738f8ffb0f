use thiserror::Error;

/// Errors raised while wiring the core: configuration and logging setup.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator bridge was neither supplied nor available as a default
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging already initialized or unavailable: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
