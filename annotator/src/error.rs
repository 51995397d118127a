//! Error types for the annotator library.

use std::path::PathBuf;
use thiserror::Error;

use crate::way::WayId;

/// Errors that can occur while annotating a route.
#[derive(Error, Debug)]
pub enum AnnotatorError {
    /// The request payload is missing, malformed or non-numeric.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The engine could not resolve the route into way ids.
    #[error("Route resolution failed: {reason}")]
    ResolutionFailed { reason: String },

    /// A single way's tag lookup failed.
    #[error("Tag fetch failed for way {way_id}: {reason}")]
    TagFetchFailed { way_id: WayId, reason: String },

    /// The extract has not finished loading.
    #[error("Extract not loaded yet")]
    NotReady,

    /// An engine call did not complete in time.
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u64 },

    /// IO error when reading the extract or the tag file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The extract snapshot could not be decoded.
    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The extract file does not exist.
    #[error("Extract file not found: {path}")]
    ExtractNotFound { path: PathBuf },

    /// Startup configuration is missing or malformed.
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

impl AnnotatorError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn resolution(reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            reason: reason.into(),
        }
    }

    /// Whether the error is caused by the request rather than the process.
    ///
    /// Both validation and resolution failures are reported to the caller as
    /// a rejected request; everything else is an operator problem.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::ResolutionFailed { .. }
                | Self::NotReady
                | Self::Timeout { .. }
        )
    }
}

/// Result type alias using [`AnnotatorError`].
pub type Result<T> = std::result::Result<T, AnnotatorError>;
