//! Chart archive expansion.
//!
//! [`ensure_and_expand`] prepares the untar target and hands the archive to
//! an [`ArchiveExpander`]. The default [`TarExpander`] reads plain, gzip, or
//! zstd compressed tarballs and rejects entries that would escape the target
//! directory.

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use log::{debug, trace};
use std::borrow::Cow;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Component, Path};

use crate::paths::resolve_untar_dir;

/// Leading bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Leading bytes of a zstd frame.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Trait for expanding chart archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExpander {
    /// Expand the archive at `archive_path` into `target_dir`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractionError`] if the archive cannot be read or an
    /// entry cannot be written.
    fn expand(&self, target_dir: &Path, archive_path: &Path) -> Result<(), ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The untar target could not be created.
    #[error("mkdir {path}: {source}")]
    CreateDir {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The untar target exists and is not a directory.
    #[error("{path} is not a directory")]
    NotADirectory {
        /// The conflicting path.
        path: Utf8PathBuf,
    },

    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the target.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no entries.
    #[error("archive contains no files")]
    EmptyArchive,
}

/// Resolve the untar target, make sure it is a usable directory, and expand
/// the archive into it.
///
/// Relative `untar_dir` values are anchored to `destination`.
///
/// # Errors
///
/// Returns [`ExtractionError::NotADirectory`] if the target exists but is
/// not a directory, [`ExtractionError::CreateDir`] if it cannot be created,
/// and any error reported by `expander`.
pub fn ensure_and_expand(
    untar_dir: &Utf8Path,
    destination: &Utf8Path,
    archive_path: &Utf8Path,
    expander: &dyn ArchiveExpander,
) -> Result<Utf8PathBuf, ExtractionError> {
    let target = resolve_untar_dir(untar_dir, destination);
    ensure_target_dir(&target)?;
    debug!("expanding {archive_path} into {target}");
    expander.expand(target.as_std_path(), archive_path.as_std_path())?;
    Ok(target)
}

/// Create `target` (and missing parents) unless it already exists as a
/// directory.
fn ensure_target_dir(target: &Utf8Path) -> Result<(), ExtractionError> {
    match fs::metadata(target) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ExtractionError::NotADirectory {
            path: target.to_owned(),
        }),
        Err(_) => create_dir_all(target).map_err(|source| ExtractionError::CreateDir {
            path: target.to_owned(),
            source,
        }),
    }
}

#[cfg(unix)]
fn create_dir_all(path: &Utf8Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
}

#[cfg(not(unix))]
fn create_dir_all(path: &Utf8Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

/// Default expander using the `tar`, `flate2`, and `zstd` crates.
///
/// Validates each entry path, and every link target, before extraction so
/// nothing is written outside the target directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarExpander;

impl ArchiveExpander for TarExpander {
    fn expand(&self, target_dir: &Path, archive_path: &Path) -> Result<(), ExtractionError> {
        let mut reader = BufReader::new(fs::File::open(archive_path)?);
        let compression = Compression::sniff(reader.fill_buf()?);
        debug!("{} looks {compression:?}", archive_path.display());

        match compression {
            Compression::Gzip => unpack(GzDecoder::new(reader), target_dir),
            Compression::Zstd => unpack(zstd::Decoder::with_buffer(reader)?, target_dir),
            Compression::None => unpack(reader, target_dir),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Gzip,
    Zstd,
    None,
}

impl Compression {
    fn sniff(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else if head.starts_with(&ZSTD_MAGIC) {
            Self::Zstd
        } else {
            Self::None
        }
    }
}

fn unpack(reader: impl Read, target_dir: &Path) -> Result<(), ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut count = 0_usize;

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let link = entry
                .link_name()?
                .map(Cow::into_owned)
                .unwrap_or_default();
            validate_link_target(&entry_path, &link, entry_type.is_symlink())?;
        }

        trace!("unpacking {}", entry_path.display());
        // `unpack_in` also refuses to write through a symlinked parent.
        if !entry.unpack_in(target_dir)? {
            return Err(ExtractionError::PathTraversal {
                path: entry_path.display().to_string(),
            });
        }
        count += 1;
    }

    if count == 0 {
        return Err(ExtractionError::EmptyArchive);
    }
    Ok(())
}

/// Validate that a tar entry path does not escape the target directory via
/// `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Validate that a link entry points inside the target directory.
///
/// Symlink targets resolve against the entry's parent directory; hard link
/// targets resolve against the archive root.
fn validate_link_target(
    entry_path: &Path,
    link: &Path,
    symlink: bool,
) -> Result<(), ExtractionError> {
    let base = if symlink {
        entry_path.parent().unwrap_or_else(|| Path::new(""))
    } else {
        Path::new("")
    };
    let mut depth = base
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .count();

    let mut escapes = link.as_os_str().is_empty();
    for component in link.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                escapes = true;
                break;
            }
        }
    }

    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: format!("{} -> {}", entry_path.display(), link.display()),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
