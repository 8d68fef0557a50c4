//! Chart reference resolution.
//!
//! A reference is either a direct chart URL or `repo/name` shorthand. The
//! shorthand is resolved through `repositories.toml` in the chart-fetch
//! home, which maps repository names to base URLs:
//!
//! ```toml
//! [[repository]]
//! name = "stable"
//! url = "https://charts.example.com"
//! ```
//!
//! Each repository serves an `index.json` listing the published versions of
//! every chart:
//!
//! ```json
//! { "entries": { "mychart": [ { "version": "1.2.0", "urls": ["mychart-1.2.0.tgz"] } ] } }
//! ```

use camino::Utf8Path;
use log::debug;
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::download::DownloadError;

/// File name of the repositories list inside the chart-fetch home.
pub const REPOSITORIES_FILE: &str = "repositories.toml";

/// File name of a repository's chart index.
pub const INDEX_FILE: &str = "index.json";

/// A parsed chart reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartReference {
    /// A direct URL to a chart archive.
    Url(String),
    /// A chart in a named repository.
    Named {
        /// The repository name from `repositories.toml`.
        repo: String,
        /// The chart name within the repository.
        chart: String,
    },
}

impl ChartReference {
    /// Parse a positional chart argument.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidReference`] when the value is neither
    /// a URL nor `repo/name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chart_fetch::repository::ChartReference;
    ///
    /// let named = ChartReference::parse("stable/mychart").unwrap();
    /// assert_eq!(
    ///     named,
    ///     ChartReference::Named { repo: "stable".to_owned(), chart: "mychart".to_owned() }
    /// );
    /// assert!(ChartReference::parse("mychart").is_err());
    /// ```
    pub fn parse(reference: &str) -> Result<Self, DownloadError> {
        if reference.contains("://") {
            return Ok(Self::Url(reference.to_owned()));
        }

        let invalid = |reason: &str| DownloadError::InvalidReference {
            reference: reference.to_owned(),
            reason: reason.to_owned(),
        };
        let (repo, chart) = reference
            .split_once('/')
            .ok_or_else(|| invalid("expected a chart URL or repo/name"))?;
        if repo.is_empty() || chart.is_empty() || chart.contains('/') {
            return Err(invalid("expected a chart URL or repo/name"));
        }
        Ok(Self::Named {
            repo: repo.to_owned(),
            chart: chart.to_owned(),
        })
    }
}

/// A configured chart repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Repository {
    /// Short name used in `repo/name` references.
    pub name: String,
    /// Base URL serving `index.json` and chart archives.
    pub url: String,
}

/// The contents of `repositories.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Configured repositories, in file order.
    #[serde(rename = "repository")]
    pub repositories: Vec<Repository>,
}

impl RepositoryConfig {
    /// Load `repositories.toml` from `home`.
    ///
    /// A missing file yields an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::RepositoryConfig`] if the file exists but
    /// cannot be read or parsed.
    pub fn load(home: &Utf8Path) -> Result<Self, DownloadError> {
        let path = home.join(REPOSITORIES_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no repositories file at {path}");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(DownloadError::RepositoryConfig {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        Self::parse(&text).map_err(|reason| DownloadError::RepositoryConfig {
            path: path.to_string(),
            reason,
        })
    }

    /// Parse the TOML text of a repositories file.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse failure.
    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Look up a repository by name.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::UnknownRepository`] when no repository has
    /// that name.
    pub fn find(&self, name: &str) -> Result<&Repository, DownloadError> {
        self.repositories
            .iter()
            .find(|repo| repo.name == name)
            .ok_or_else(|| DownloadError::UnknownRepository {
                name: name.to_owned(),
            })
    }
}

/// One published version of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChartVersion {
    /// The chart version string.
    pub version: String,
    /// Download URLs, absolute or relative to the repository URL.
    pub urls: Vec<String>,
}

/// A repository's `index.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChartIndex {
    /// Published versions keyed by chart name.
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartVersion>>,
}

impl ChartIndex {
    /// Parse index JSON fetched from `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidIndex`] if the JSON is malformed.
    pub fn parse(json: &str, url: &str) -> Result<Self, DownloadError> {
        serde_json::from_str(json).map_err(|e| DownloadError::InvalidIndex {
            url: url.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Select a chart version.
    ///
    /// An empty `version` selects the highest semantic version, preferring
    /// stable releases over pre-releases. A non-empty `version` must match
    /// an entry exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ChartNotFound`] when the chart or version is
    /// not listed.
    pub fn select(&self, chart: &str, version: &str) -> Result<&ChartVersion, DownloadError> {
        let not_found = || DownloadError::ChartNotFound {
            chart: chart.to_owned(),
            version: if version.is_empty() {
                "latest".to_owned()
            } else {
                version.to_owned()
            },
        };
        let versions = self.entries.get(chart).ok_or_else(not_found)?;

        if !version.is_empty() {
            return versions
                .iter()
                .find(|entry| entry.version == version)
                .ok_or_else(not_found);
        }

        versions
            .iter()
            .filter_map(|entry| Version::parse(&entry.version).ok().map(|v| (v, entry)))
            .max_by(|(a, _), (b, _)| {
                a.pre
                    .is_empty()
                    .cmp(&b.pre.is_empty())
                    .then_with(|| a.cmp(b))
            })
            .map(|(_, entry)| entry)
            .ok_or_else(not_found)
    }
}

/// Join a possibly relative chart URL onto a repository base URL.
///
/// # Examples
///
/// ```
/// use chart_fetch::repository::join_url;
///
/// assert_eq!(
///     join_url("https://charts.example.com/", "mychart-1.2.0.tgz"),
///     "https://charts.example.com/mychart-1.2.0.tgz"
/// );
/// assert_eq!(
///     join_url("https://charts.example.com", "https://cdn.example.com/a.tgz"),
///     "https://cdn.example.com/a.tgz"
/// );
/// ```
#[must_use]
pub fn join_url(base: &str, url: &str) -> String {
    if url.contains("://") {
        url.to_owned()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

/// Return the last path segment of `url`, ignoring any query or fragment.
#[must_use]
pub fn url_file_name(url: &str) -> Option<&str> {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_suffix
        .split_once("://")
        .map_or(without_suffix, |(_, rest)| rest);
    let (_, tail) = path.split_once('/')?;
    tail.rsplit('/').next().filter(|name| !name.is_empty())
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
