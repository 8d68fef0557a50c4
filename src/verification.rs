//! Verification policy for downloaded charts.
//!
//! The user's `--verify` and `--prov` flags collapse into a single
//! [`VerificationMode`] before anything is downloaded. Later stages only see
//! the mode, never the flags.

use std::fmt;

/// How provenance is handled for a single fetch.
///
/// # Examples
///
/// ```
/// use chart_fetch::verification::{VerificationMode, resolve_mode};
///
/// assert_eq!(resolve_mode(true, true), VerificationMode::Always);
/// assert_eq!(resolve_mode(false, true), VerificationMode::Later);
/// assert_eq!(resolve_mode(false, false), VerificationMode::Never);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VerificationMode {
    /// Do not fetch or check provenance.
    #[default]
    Never,
    /// Fetch provenance and require it to verify before keeping the chart.
    Always,
    /// Fetch provenance alongside the chart without checking it.
    Later,
}

impl VerificationMode {
    /// Return true when the provenance file should be downloaded.
    #[must_use]
    pub const fn fetches_provenance(self) -> bool {
        !matches!(self, Self::Never)
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "never"),
            Self::Always => write!(f, "always"),
            Self::Later => write!(f, "later"),
        }
    }
}

/// Derive the verification mode from the user's flags.
///
/// `verify` takes precedence over `verify_later`.
#[must_use]
pub const fn resolve_mode(verify: bool, verify_later: bool) -> VerificationMode {
    if verify {
        VerificationMode::Always
    } else if verify_later {
        VerificationMode::Later
    } else {
        VerificationMode::Never
    }
}

/// The outcome of handling a chart's provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    signer: Option<String>,
    sha256: String,
}

impl Verification {
    /// A provenance file whose signature was checked against `signer`.
    #[must_use]
    pub fn signed(signer: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self {
            signer: Some(signer.into()),
            sha256: sha256.into(),
        }
    }

    /// A provenance file that was fetched but deliberately not checked.
    #[must_use]
    pub fn unchecked(sha256: impl Into<String>) -> Self {
        Self {
            signer: None,
            sha256: sha256.into(),
        }
    }

    /// The trusted key that verified the signature, if it was checked.
    #[must_use]
    pub fn signer(&self) -> Option<&str> {
        self.signer.as_deref()
    }

    /// Hex-encoded SHA-256 digest of the chart archive.
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Return true when the signature was validated.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.signer.is_some()
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.signer {
            Some(signer) => write!(f, "signed by {signer} (sha256:{})", self.sha256),
            None => write!(
                f,
                "provenance fetched, not verified (sha256:{})",
                self.sha256
            ),
        }
    }
}
