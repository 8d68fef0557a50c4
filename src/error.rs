//! Error types for the chart fetch command.
//!
//! Every failure terminates processing of the remaining references, so the
//! variants here carry enough context (the failing reference or path) to be
//! printed directly to the user.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::download::DownloadError;
use crate::extraction::ExtractionError;

/// Errors that can occur while fetching charts.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The command was invoked without any chart reference.
    #[error("this command needs at least one argument, url or repo/name of the chart")]
    Usage,

    /// The ephemeral staging directory could not be created.
    #[error("failed to untar: could not create staging directory: {source}")]
    Staging {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Downloading or verifying the chart failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Expanding the downloaded archive failed.
    #[error("failed to untar into {path}: {source}")]
    Extraction {
        /// The resolved untar target directory.
        path: Utf8PathBuf,
        /// The underlying extraction failure.
        #[source]
        source: ExtractionError,
    },

    /// A default path could not be determined or is unusable.
    #[error("configuration error: {reason}")]
    Config {
        /// Description of what could not be resolved.
        reason: String,
    },

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`FetchError`].
pub type Result<T> = std::result::Result<T, FetchError>;
