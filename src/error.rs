use std::{string::FromUtf8Error, sync::PoisonError};

use thiserror::Error;

/// Custom Result type for obsql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for obsql
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Mistake in the query itself: unknown or ambiguous names, missing FROM, bad shifts
    #[error("user error: {0}")]
    User(String),
    /// Internal invariant violation
    #[error("serious bug: {0}")]
    SeriousBug(String),
    /// Documented gap in the engine
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// Operand kinds that cannot be combined
    #[error("bad value: {0}")]
    BadValue(String),
    /// Internal error (I/O, locks, serialization, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(value: bincode::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(value: regex::Error) -> Self {
        Error::User(value.to_string())
    }
}
