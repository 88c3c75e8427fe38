//! Error types for tandem-slam.

use thiserror::Error;

/// Crate-level error type.
#[derive(Error, Debug)]
pub enum TandemError {
    /// Invalid configuration detected at startup. Fatal: the pipeline
    /// refuses to start rather than run with a broken sensor setup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure (trajectory dump, config file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker thread could not be spawned.
    #[error("Thread error: {0}")]
    Thread(String),
}

impl From<toml::de::Error> for TandemError {
    fn from(e: toml::de::Error) -> Self {
        TandemError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TandemError>;
