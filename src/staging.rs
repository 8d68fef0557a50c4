//! Download staging.
//!
//! When a chart is only saved, it is downloaded straight into the
//! destination directory. When it is also expanded, it is downloaded into an
//! ephemeral scratch directory that belongs to the current reference alone
//! and is removed when the [`StagingLocation`] is released or dropped.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::path::Path;
use tempfile::TempDir;

use crate::error::{FetchError, Result};

/// Prefix for scratch directory names.
const SCRATCH_PREFIX: &str = "chart-fetch-";

/// Where a chart archive is written during download.
#[derive(Debug)]
pub enum StagingLocation {
    /// The user-specified destination; nothing to clean up.
    Destination(Utf8PathBuf),
    /// A scratch directory removed on release or drop.
    Scratch {
        /// Guard owning the directory on disk.
        dir: TempDir,
        /// UTF-8 view of the guard's path.
        path: Utf8PathBuf,
    },
}

impl StagingLocation {
    /// The directory downloads should be written to.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Destination(path) | Self::Scratch { path, .. } => path,
        }
    }

    /// Return true when the location is an ephemeral scratch directory.
    #[must_use]
    pub const fn is_scratch(&self) -> bool {
        matches!(self, Self::Scratch { .. })
    }

    /// Release the location, deleting a scratch directory recursively.
    ///
    /// Removal failures are logged rather than returned; a leftover scratch
    /// directory never changes the outcome of a fetch.
    pub fn release(self) {
        match self {
            Self::Destination(_) => {}
            Self::Scratch { dir, path } => match dir.close() {
                Ok(()) => debug!("removed staging directory {path}"),
                Err(e) => warn!("failed to remove staging directory {path}: {e}"),
            },
        }
    }
}

/// Choose where to download a chart.
///
/// Without `untar` the destination itself is used. With `untar` a fresh,
/// uniquely named directory is created under the system temporary
/// directory.
///
/// # Errors
///
/// Returns [`FetchError::Staging`] if the scratch directory cannot be
/// created.
pub fn prepare_staging(untar: bool, destination: &Utf8Path) -> Result<StagingLocation> {
    prepare_staging_in(untar, destination, &std::env::temp_dir())
}

/// Like [`prepare_staging`], creating scratch directories under
/// `scratch_root` instead of the system temporary directory.
///
/// # Errors
///
/// Returns [`FetchError::Staging`] if the scratch directory cannot be
/// created or its path is not valid UTF-8.
pub fn prepare_staging_in(
    untar: bool,
    destination: &Utf8Path,
    scratch_root: &Path,
) -> Result<StagingLocation> {
    if !untar {
        return Ok(StagingLocation::Destination(destination.to_owned()));
    }

    let dir = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(scratch_root)
        .map_err(|source| FetchError::Staging { source })?;
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
        FetchError::Staging {
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("staging path is not valid UTF-8: {}", path.display()),
            ),
        }
    })?;
    debug!("staging download in {path}");
    Ok(StagingLocation::Scratch { dir, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8(path: &Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("UTF-8 path")
    }

    #[test]
    fn without_untar_uses_destination() {
        let root = tempfile::tempdir().expect("temp dir");
        let destination = utf8(root.path()).join("out");

        let location =
            prepare_staging_in(false, &destination, root.path()).expect("staging location");
        assert!(!location.is_scratch());
        assert_eq!(location.path(), destination.as_path());

        location.release();
        let entries = std::fs::read_dir(root.path()).expect("read dir").count();
        assert_eq!(entries, 0, "no scratch directory should be created");
    }

    #[test]
    fn with_untar_creates_and_releases_scratch_dir() {
        let root = tempfile::tempdir().expect("temp dir");
        let destination = utf8(root.path()).join("out");

        let location =
            prepare_staging_in(true, &destination, root.path()).expect("staging location");
        assert!(location.is_scratch());
        let scratch = location.path().to_owned();
        assert!(scratch.is_dir());
        assert!(
            scratch
                .file_name()
                .is_some_and(|name| name.starts_with(SCRATCH_PREFIX))
        );
        std::fs::write(scratch.join("mychart-1.2.0.tgz"), b"archive").expect("write archive");

        location.release();
        assert!(!scratch.exists());
    }

    #[test]
    fn dropping_scratch_location_removes_directory() {
        let root = tempfile::tempdir().expect("temp dir");
        let destination = utf8(root.path());

        let scratch = {
            let location =
                prepare_staging_in(true, &destination, root.path()).expect("staging location");
            location.path().to_owned()
        };
        assert!(!scratch.exists());
    }

    #[test]
    fn scratch_dirs_are_unique() {
        let root = tempfile::tempdir().expect("temp dir");
        let destination = utf8(root.path());

        let first = prepare_staging_in(true, &destination, root.path()).expect("first");
        let second = prepare_staging_in(true, &destination, root.path()).expect("second");
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn prepare_staging_uses_system_temp_dir_for_untar() {
        let root = tempfile::tempdir().expect("temp dir");
        let destination = utf8(root.path()).join("out");

        let saved = prepare_staging(false, &destination).expect("destination staging");
        assert_eq!(saved.path(), destination.as_path());
        saved.release();

        let location = prepare_staging(true, &destination).expect("scratch staging");
        let scratch = location.path().to_owned();
        assert!(scratch.is_dir());
        assert!(scratch.starts_with(std::env::temp_dir()));
        assert!(!scratch.starts_with(&destination));

        location.release();
        assert!(!scratch.exists());
        assert!(!destination.exists());
    }

    #[test]
    fn missing_scratch_root_is_a_staging_error() {
        let root = tempfile::tempdir().expect("temp dir");
        let missing = root.path().join("does-not-exist");

        let err = prepare_staging_in(true, &utf8(root.path()), &missing)
            .expect_err("expected staging failure");
        assert!(matches!(err, FetchError::Staging { .. }), "got {err}");
    }
}
