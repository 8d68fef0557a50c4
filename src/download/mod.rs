//! Chart download and provenance retrieval.
//!
//! [`ChartDownloader`] is the capability the fetch workflow consumes: given
//! a reference, a version, a directory, and a [`VerificationMode`], it
//! leaves the chart archive in that directory and reports what happened to
//! its provenance. [`RepositoryDownloader`] is the production implementation
//! built on a [`Transport`] and a [`ProvenanceVerifier`].
//!
//! Archives are written to a temporary file inside the target directory and
//! only renamed into place once any required verification has passed, so a
//! chart that fails verification never appears in the destination.

mod transport;

pub use transport::{HttpTransport, Transport};

#[cfg(test)]
pub use transport::MockTransport;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::fs;
use tempfile::NamedTempFile;

use crate::provenance::{MinisignVerifier, ProvenanceVerifier, VerifyError, file_sha256};
use crate::repository::{
    ChartIndex, ChartReference, INDEX_FILE, REPOSITORIES_FILE, RepositoryConfig, join_url,
    url_file_name,
};
use crate::verification::{Verification, VerificationMode};

/// Suffix appended to a chart URL to locate its provenance file.
pub const PROVENANCE_SUFFIX: &str = ".prov";

/// The result of a successful chart download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Where the chart archive was saved.
    pub saved: Utf8PathBuf,
    /// What happened to the provenance; `None` when it was not fetched.
    pub verification: Option<Verification>,
}

/// Trait for downloading charts, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ChartDownloader {
    /// Download `reference` at `version` (empty for latest) into `dest`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] when the chart cannot be resolved or
    /// fetched, or when `mode` is [`VerificationMode::Always`] and the
    /// provenance is missing or does not verify against `keyring`.
    fn download_to(
        &self,
        reference: &str,
        version: &str,
        dest: &Utf8Path,
        mode: VerificationMode,
        keyring: &Utf8Path,
    ) -> Result<DownloadOutcome, DownloadError>;
}

/// Errors arising from chart download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("could not fetch {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("chart not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),

    /// The chart reference is neither a URL nor `repo/name`.
    #[error("invalid chart reference \"{reference}\": {reason}")]
    InvalidReference {
        /// The rejected reference.
        reference: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The repositories file could not be read or parsed.
    #[error("invalid repositories file {path}: {reason}")]
    RepositoryConfig {
        /// Path of the repositories file.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// The reference names a repository that is not configured.
    #[error("no repository named \"{name}\" in {REPOSITORIES_FILE}")]
    UnknownRepository {
        /// The unknown repository name.
        name: String,
    },

    /// The repository index could not be parsed.
    #[error("invalid repository index {url}: {reason}")]
    InvalidIndex {
        /// The index URL.
        url: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// The chart or version is not listed in the repository index.
    #[error("chart {chart} version {version} not found in repository index")]
    ChartNotFound {
        /// The chart name.
        chart: String,
        /// The requested version, or `latest`.
        version: String,
    },

    /// Provenance was required but could not be fetched.
    #[error("failed to fetch provenance {url}: {reason}")]
    ProvenanceMissing {
        /// The provenance URL.
        url: String,
        /// Why it could not be fetched.
        reason: String,
    },

    /// The provenance did not verify.
    #[error("verification failed for {reference}: {source}")]
    Verification {
        /// The chart reference being verified.
        reference: String,
        /// The underlying verification failure.
        #[source]
        source: VerifyError,
    },
}

/// Downloads charts from URLs and configured repositories.
#[derive(Debug)]
pub struct RepositoryDownloader<T = HttpTransport, V = MinisignVerifier> {
    home: Option<Utf8PathBuf>,
    transport: T,
    verifier: V,
}

impl RepositoryDownloader {
    /// Create a downloader using HTTP and minisign verification.
    ///
    /// `home` holds `repositories.toml`; without it only URL references can
    /// be resolved.
    #[must_use]
    pub const fn new(home: Option<Utf8PathBuf>) -> Self {
        Self::with_parts(home, HttpTransport, MinisignVerifier)
    }
}

impl<T, V> RepositoryDownloader<T, V> {
    /// Create a downloader from explicit collaborators.
    #[must_use]
    pub const fn with_parts(home: Option<Utf8PathBuf>, transport: T, verifier: V) -> Self {
        Self {
            home,
            transport,
            verifier,
        }
    }
}

impl<T: Transport, V: ProvenanceVerifier> RepositoryDownloader<T, V> {
    /// Resolve a reference to the URL of a chart archive.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] when the reference is malformed, the
    /// repository is unknown, or the index does not list the chart.
    pub fn resolve_url(&self, reference: &str, version: &str) -> Result<String, DownloadError> {
        match ChartReference::parse(reference)? {
            ChartReference::Url(url) => {
                if !version.is_empty() {
                    debug!("ignoring version {version} for direct URL {url}");
                }
                Ok(url)
            }
            ChartReference::Named { repo, chart } => {
                let home = self
                    .home
                    .as_deref()
                    .ok_or_else(|| DownloadError::RepositoryConfig {
                        path: REPOSITORIES_FILE.to_owned(),
                        reason: "could not determine chart-fetch home directory".to_owned(),
                    })?;
                let config = RepositoryConfig::load(home)?;
                let repository = config.find(&repo)?;
                let index_url = join_url(&repository.url, INDEX_FILE);
                debug!("reading index {index_url}");
                let index = ChartIndex::parse(&self.transport.get_text(&index_url)?, &index_url)?;
                let entry = index.select(&chart, version)?;
                let url = entry
                    .urls
                    .first()
                    .ok_or_else(|| DownloadError::InvalidIndex {
                        url: index_url.clone(),
                        reason: format!("{chart} {} has no download URL", entry.version),
                    })?;
                Ok(join_url(&repository.url, url))
            }
        }
    }

    /// Fetch the provenance for `url` into a temporary file in `dest`.
    ///
    /// Returns `None` when the file is unavailable and `mode` tolerates
    /// that.
    fn fetch_provenance(
        &self,
        reference: &str,
        url: &str,
        dest: &Utf8Path,
        mode: VerificationMode,
    ) -> Result<Option<NamedTempFile>, DownloadError> {
        let prov_url = format!("{url}{PROVENANCE_SUFFIX}");
        let file = partial_file(dest)?;
        match self.transport.get_file(&prov_url, file.path()) {
            Ok(()) => Ok(Some(file)),
            Err(e) if mode == VerificationMode::Always => Err(DownloadError::ProvenanceMissing {
                url: prov_url,
                reason: e.to_string(),
            }),
            Err(e) => {
                warn!("provenance not found for {reference}: {e}");
                Ok(None)
            }
        }
    }
}

impl<T: Transport, V: ProvenanceVerifier> ChartDownloader for RepositoryDownloader<T, V> {
    fn download_to(
        &self,
        reference: &str,
        version: &str,
        dest: &Utf8Path,
        mode: VerificationMode,
        keyring: &Utf8Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        let url = self.resolve_url(reference, version)?;
        let file_name = url_file_name(&url)
            .ok_or_else(|| DownloadError::InvalidReference {
                reference: reference.to_owned(),
                reason: format!("cannot determine a file name from {url}"),
            })?
            .to_owned();

        fs::create_dir_all(dest)?;
        let saved = dest.join(&file_name);
        let archive = partial_file(dest)?;
        debug!("downloading {url} to {saved}");
        self.transport.get_file(&url, archive.path())?;

        let provenance = if mode.fetches_provenance() {
            self.fetch_provenance(reference, &url, dest, mode)?
        } else {
            None
        };

        let verification = match (&provenance, mode) {
            (Some(prov), VerificationMode::Always) => Some(
                self.verifier
                    .verify(archive.path(), prov.path(), keyring.as_std_path())
                    .map_err(|source| DownloadError::Verification {
                        reference: reference.to_owned(),
                        source,
                    })?,
            ),
            (Some(_), _) => Some(Verification::unchecked(file_sha256(archive.path())?)),
            (None, _) => None,
        };

        // The archive is moved into place last; any failure before that
        // leaves no archive in `dest`.
        let prov_path = match provenance {
            Some(prov) => {
                let prov_path = dest.join(format!("{file_name}{PROVENANCE_SUFFIX}"));
                prov.persist(&prov_path)
                    .map_err(|e| DownloadError::Io(e.error))?;
                Some(prov_path)
            }
            None => None,
        };
        if let Err(e) = archive.persist(&saved) {
            if let Some(prov_path) = prov_path {
                if let Err(remove_err) = fs::remove_file(&prov_path) {
                    warn!("failed to remove {prov_path}: {remove_err}");
                }
            }
            return Err(DownloadError::Io(e.error));
        }

        Ok(DownloadOutcome {
            saved,
            verification,
        })
    }
}

/// Create a hidden temporary file in `dir` that is removed unless persisted.
fn partial_file(dir: &Utf8Path) -> Result<NamedTempFile, DownloadError> {
    Ok(tempfile::Builder::new()
        .prefix(".chart-fetch-")
        .suffix(".part")
        .tempfile_in(dir)?)
}

#[cfg(test)]
#[path = "download_tests.rs"]
mod tests;
