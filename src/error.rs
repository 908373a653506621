//! Error types for the partition manager.

use thiserror::Error;

/// Result type alias for partition manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the partition manager.
#[derive(Error, Debug)]
pub enum Error {
    /// A collaborator passed an argument the algorithms cannot work with
    /// (empty member list, empty bucket table).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A trigger message carried an operation code this node does not know.
    #[error("unknown trigger operation: {0}")]
    UnknownOperation(u8),

    /// Encoding or decoding of a value stored in a region failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The definitions service could not enumerate triggers.
    #[error("definitions service error: {0}")]
    Definitions(String),

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}
