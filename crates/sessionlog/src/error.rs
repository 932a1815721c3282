//! Crate-wide error type.

use thiserror::Error;

use crate::binutil::FormatError;

/// Result alias used by fallible `sessionlog` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the decoders, the follower loop and configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Truncated or corrupt session bytes.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Reading the session file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// The now-playing queue bookkeeping is inconsistent. This is a bug in
    /// the caller or in the model, never a data-quality problem.
    #[error("now-playing queue invariant violated: {0}")]
    QueueInvariant(String),
}
