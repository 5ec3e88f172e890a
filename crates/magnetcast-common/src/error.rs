//! Error taxonomy shared across magnetcast.
//!
//! Failures are contained at segment granularity: an [`Error::ArtifactCreation`]
//! aborts a single publish cycle and an [`Error::Retrieval`] drops a single
//! payload. Neither is allowed to stop the pipeline as a whole.

use std::fmt;
use std::path::{Path, PathBuf};

/// Unified error type for magnetcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A segment's distributable artifact could not be built.
    #[error("Artifact creation failed for {path}: {message}")]
    ArtifactCreation {
        /// Source file the artifact was being built from.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// A segment's payload could not be fetched or failed verification.
    #[error("Retrieval failed for {content_id}: {message}")]
    Retrieval {
        /// Identifier that was being retrieved.
        content_id: String,
        /// Human-readable error description.
        message: String,
    },

    /// The live playlist could not be read or understood.
    #[error("Playlist error: {0}")]
    Playlist(String),

    /// A content identifier was malformed.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The append sink refused a write.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Configuration was rejected.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An HTTP exchange failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::ArtifactCreation`].
    pub fn artifact(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Error::ArtifactCreation {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Retrieval`].
    pub fn retrieval(content_id: impl fmt::Display, message: impl fmt::Display) -> Self {
        Error::Retrieval {
            content_id: content_id.to_string(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Playlist`].
    pub fn playlist(msg: impl Into<String>) -> Self {
        Error::Playlist(msg.into())
    }

    /// Convenience constructor for [`Error::Sink`].
    pub fn sink(msg: impl Into<String>) -> Self {
        Error::Sink(msg.into())
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether this error only affects the segment it was raised for.
    pub fn is_segment_scoped(&self) -> bool {
        matches!(
            self,
            Error::ArtifactCreation { .. } | Error::Retrieval { .. }
        )
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
