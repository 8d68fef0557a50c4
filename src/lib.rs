//! chart-fetch library.
//!
//! This crate downloads charts from chart repositories, optionally checks
//! their provenance against a keyring, and optionally unpacks them. It is
//! used by the `chart-fetch` CLI binary and can be driven programmatically
//! with alternative download and expansion backends.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Run settings resolved from arguments and the environment
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`download`] - Chart download, repository transport, and provenance fetch
//! - [`error`] - Error types for the fetch command
//! - [`extraction`] - Untar target preparation and archive expansion
//! - [`fetch`] - Per-reference orchestration and the sequential fetch loop
//! - [`output`] - Verification reports and progress messages
//! - [`paths`] - Keyring, home, and untar directory resolution
//! - [`provenance`] - Minisign provenance verification
//! - [`repository`] - Chart reference parsing and repository index lookup
//! - [`staging`] - Download staging and scratch directory cleanup
//! - [`verification`] - Verification mode policy and outcomes

pub mod cli;
pub mod config;
pub mod dirs;
pub mod download;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod output;
pub mod paths;
pub mod provenance;
pub mod repository;
pub mod staging;
pub mod verification;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
