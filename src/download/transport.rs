//! HTTP transport for chart indexes, archives, and provenance files.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use log::trace;

use super::DownloadError;

/// Upper bound on any single repository request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for retrieving remote files.
///
/// Abstractions allow tests to serve charts from memory without network
/// access.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Fetch `url` and return the body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the resource is missing.
    fn get_text(&self, url: &str) -> Result<String, DownloadError>;

    /// Fetch `url` and write the body to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the file write fails.
    fn get_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// HTTP transport using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        open(url)?
            .read_to_string()
            .map_err(|e| transfer_failed(url, &e))
    }

    fn get_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let mut body = open(url)?;
        let mut file = File::create(dest)?;
        let bytes = io::copy(&mut body.as_reader(), &mut file)?;
        trace!("received {bytes} bytes from {url}");
        Ok(())
    }
}

/// Issue a GET for `url` on the shared repository agent.
fn open(url: &str) -> Result<ureq::Body, DownloadError> {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    let agent = AGENT.get_or_init(|| {
        ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(REQUEST_TIMEOUT))
                .build(),
        )
    });
    trace!("GET {url}");
    agent
        .get(url)
        .call()
        .map(ureq::http::Response::into_body)
        .map_err(|e| request_failed(url, &e))
}

/// Classify a failed repository request.
fn request_failed(url: &str, err: &ureq::Error) -> DownloadError {
    let reason = match err {
        ureq::Error::StatusCode(404) => {
            return DownloadError::NotFound {
                url: url.to_owned(),
            };
        }
        ureq::Error::StatusCode(code) => format!("repository answered HTTP {code}"),
        ureq::Error::Timeout(_) => {
            format!("no response within {}s", REQUEST_TIMEOUT.as_secs())
        }
        other => other.to_string(),
    };
    DownloadError::HttpError {
        url: url.to_owned(),
        reason,
    }
}

fn transfer_failed(url: &str, err: &ureq::Error) -> DownloadError {
    DownloadError::HttpError {
        url: url.to_owned(),
        reason: format!("response body unreadable: {err}"),
    }
}
