//! Directory resolution abstraction for platform-specific paths.
//!
//! Wraps `directories-next` behind a trait so that keyring and home
//! resolution can be exercised in tests without touching the real user
//! environment.

use std::path::PathBuf;

/// Source of per-user base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The current user's home directory, if known.
    fn home_dir(&self) -> Option<PathBuf>;

    /// The per-user data directory (for example `~/.local/share`).
    fn data_dir(&self) -> Option<PathBuf>;

    /// The chart-fetch home holding `repositories.toml`.
    fn chart_fetch_home(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join("chart-fetch"))
    }
}

/// [`BaseDirs`] backed by the operating system's conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    }

    fn data_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.data_dir().to_path_buf())
    }
}
