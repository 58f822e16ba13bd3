//! Error handling for Redfire DTMF

use std::collections::TryReserveError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid WAV format: {0}")]
    FormatInvalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn format_invalid<S: Into<String>>(msg: S) -> Self {
        Self::FormatInvalid(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Process exit status for this error, errno style
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidArgument(_)
            | Self::FormatInvalid(_)
            | Self::Config(_)
            | Self::Parse(_) => 22, // EINVAL
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => 2, // ENOENT
            Self::Io(_) => 5, // EIO
            Self::OutOfMemory(_) => 12, // ENOMEM
            Self::Serialization(_) | Self::Internal(_) => 1,
        }
    }
}

impl From<TryReserveError> for Error {
    fn from(e: TryReserveError) -> Self {
        Self::OutOfMemory(e.to_string())
    }
}
