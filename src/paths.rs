//! Path resolution for keyrings, the chart-fetch home, and untar targets.
//!
//! The default keyring lives under the user's home directory:
//! `<home>/.chart-fetch/keyring.pub`. Untar targets given as relative paths
//! are anchored to the user-visible destination directory, never to the
//! scratch directory used while downloading.

use camino::{Utf8Path, Utf8PathBuf};
use std::path::PathBuf;

use crate::dirs::BaseDirs;
use crate::error::{FetchError, Result};

/// Directory under the home directory holding the default keyring.
const KEYRING_DIR: &str = ".chart-fetch";

/// File name of the default keyring.
const KEYRING_FILE: &str = "keyring.pub";

/// Return the default keyring path for the current user.
///
/// # Errors
///
/// Returns [`FetchError::Config`] when the home directory cannot be
/// determined or is not valid UTF-8.
///
/// # Examples
///
/// ```
/// use chart_fetch::dirs::BaseDirs;
/// use chart_fetch::paths::default_keyring;
/// use std::path::PathBuf;
///
/// struct FixedHome;
///
/// impl BaseDirs for FixedHome {
///     fn home_dir(&self) -> Option<PathBuf> {
///         Some(PathBuf::from("/home/user"))
///     }
///     fn data_dir(&self) -> Option<PathBuf> {
///         None
///     }
/// }
///
/// let keyring = default_keyring(&FixedHome).unwrap();
/// assert_eq!(keyring.as_str(), "/home/user/.chart-fetch/keyring.pub");
/// ```
pub fn default_keyring(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    let home = utf8_dir(dirs.home_dir(), "home directory")?;
    Ok(home.join(KEYRING_DIR).join(KEYRING_FILE))
}

/// Return the default chart-fetch home holding `repositories.toml`.
///
/// # Errors
///
/// Returns [`FetchError::Config`] when the data directory cannot be
/// determined or is not valid UTF-8.
pub fn default_home(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    utf8_dir(dirs.chart_fetch_home(), "chart-fetch home directory")
}

/// Resolve the directory a chart is expanded into.
///
/// Absolute `untar_dir` values are returned unchanged; relative ones are
/// joined onto `destination`.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use chart_fetch::paths::resolve_untar_dir;
///
/// let relative = resolve_untar_dir(Utf8Path::new("foo"), Utf8Path::new("/tmp/out"));
/// assert_eq!(relative.as_str(), "/tmp/out/foo");
///
/// let absolute = resolve_untar_dir(Utf8Path::new("/abs/path"), Utf8Path::new("/tmp/out"));
/// assert_eq!(absolute.as_str(), "/abs/path");
/// ```
#[must_use]
pub fn resolve_untar_dir(untar_dir: &Utf8Path, destination: &Utf8Path) -> Utf8PathBuf {
    if untar_dir.is_absolute() {
        untar_dir.to_owned()
    } else {
        destination.join(untar_dir)
    }
}

fn utf8_dir(dir: Option<PathBuf>, what: &str) -> Result<Utf8PathBuf> {
    let dir = dir.ok_or_else(|| FetchError::Config {
        reason: format!("could not determine {what}"),
    })?;
    Utf8PathBuf::from_path_buf(dir).map_err(|path| FetchError::Config {
        reason: format!("{what} is not valid UTF-8: {}", path.display()),
    })
}
