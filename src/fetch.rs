//! Fetch orchestration.
//!
//! [`Fetcher`] drives one [`FetchRequest`] at a time through staging,
//! download, verification reporting, and optional expansion. References are
//! processed strictly in order and the first failure stops the run.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::io::Write;
use std::path::PathBuf;

use crate::download::ChartDownloader;
use crate::error::{FetchError, Result};
use crate::extraction::{ArchiveExpander, ensure_and_expand};
use crate::output::{fetched_message, verification_message, write_stderr_line, write_stdout_line};
use crate::paths::resolve_untar_dir;
use crate::staging::prepare_staging_in;
use crate::verification::{VerificationMode, resolve_mode};

/// Everything needed to fetch a single chart reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// A chart URL or `repo/name`.
    pub reference: String,
    /// Requested chart version; empty selects the latest.
    pub version: String,
    /// Directory the archive is saved to, and the anchor for `untar_dir`.
    pub destination: Utf8PathBuf,
    /// Expand the archive after download.
    pub untar: bool,
    /// Where to expand the archive when `untar` is set.
    pub untar_dir: Utf8PathBuf,
    /// Require a valid provenance before keeping the chart.
    pub verify: bool,
    /// Fetch the provenance without checking it.
    pub verify_later: bool,
    /// Keyring holding the trusted public keys.
    pub keyring: Utf8PathBuf,
}

impl FetchRequest {
    /// The verification mode implied by this request's flags.
    #[must_use]
    pub const fn mode(&self) -> VerificationMode {
        resolve_mode(self.verify, self.verify_later)
    }
}

/// Runs fetch requests against injected download and expansion backends.
pub struct Fetcher<'a> {
    downloader: &'a dyn ChartDownloader,
    expander: &'a dyn ArchiveExpander,
    scratch_root: PathBuf,
    quiet: bool,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher that stages under the system temporary directory.
    #[must_use]
    pub fn new(downloader: &'a dyn ChartDownloader, expander: &'a dyn ArchiveExpander) -> Self {
        Self {
            downloader,
            expander,
            scratch_root: std::env::temp_dir(),
            quiet: false,
        }
    }

    /// Create scratch directories under `root` instead.
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    /// Suppress progress lines on stderr.
    #[must_use]
    pub const fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Fetch every request in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Usage`] when `requests` is empty, otherwise the
    /// first error raised by [`Fetcher::fetch`].
    pub fn fetch_all(
        &self,
        requests: &[FetchRequest],
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<()> {
        if requests.is_empty() {
            return Err(FetchError::Usage);
        }
        for request in requests {
            self.fetch(request, stdout, stderr)?;
        }
        Ok(())
    }

    /// Fetch a single chart.
    ///
    /// The scratch directory used for `untar` requests is removed before
    /// this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Staging`] if the scratch directory cannot be
    /// created, [`FetchError::Download`] if the download or its
    /// verification fails, [`FetchError::Extraction`] if expansion fails,
    /// and [`FetchError::WriteFailed`] if the verification report cannot be
    /// written.
    pub fn fetch(
        &self,
        request: &FetchRequest,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<()> {
        let mode = request.mode();
        debug!("fetching {} with verification {mode}", request.reference);

        let staging = prepare_staging_in(request.untar, &request.destination, &self.scratch_root)?;
        let outcome = self.downloader.download_to(
            &request.reference,
            &request.version,
            staging.path(),
            mode,
            &request.keyring,
        )?;

        let report = outcome
            .verification
            .as_ref()
            .filter(|_| mode != VerificationMode::Never);
        if let Some(verification) = report {
            write_stdout_line(stdout, verification_message(verification))?;
        }

        let untarred = if request.untar {
            Some(self.expand(request, &outcome.saved)?)
        } else {
            None
        };

        if !self.quiet {
            write_stderr_line(
                stderr,
                fetched_message(&request.reference, &outcome.saved, untarred.as_deref()),
            );
        }

        staging.release();
        Ok(())
    }

    fn expand(&self, request: &FetchRequest, archive: &Utf8Path) -> Result<Utf8PathBuf> {
        ensure_and_expand(
            &request.untar_dir,
            &request.destination,
            archive,
            self.expander,
        )
        .map_err(|source| FetchError::Extraction {
            path: resolve_untar_dir(&request.untar_dir, &request.destination),
            source,
        })
    }
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
