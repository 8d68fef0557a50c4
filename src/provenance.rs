//! Provenance verification for chart archives.
//!
//! A provenance file is a detached minisign signature over the archive
//! bytes. The keyring lists trusted minisign public keys, one base64 key per
//! line, in the same shape as a `minisign.pub` file:
//!
//! ```text
//! untrusted comment: charts.example.com release key
//! RWQf6LRCGA9i53mlYecO4IzT51TGPpvWucNSCh1CBM0QTaLn73Y7GFO3
//! ```
//!
//! The comment preceding a key, when present, names the key in reports.

use log::{debug, trace};
use minisign_verify::{PublicKey, Signature};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::verification::Verification;

/// Prefix minisign uses for the free-form comment line.
const UNTRUSTED_COMMENT: &str = "untrusted comment:";

/// Trait for checking a chart archive against its provenance file.
#[cfg_attr(test, mockall::automock)]
pub trait ProvenanceVerifier {
    /// Verify `archive` using the signature in `provenance` and the trusted
    /// keys in `keyring`.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] when the keyring or signature cannot be
    /// read, or no trusted key validates the archive.
    fn verify(
        &self,
        archive: &Path,
        provenance: &Path,
        keyring: &Path,
    ) -> Result<Verification, VerifyError>;
}

/// Errors arising from provenance verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The keyring could not be read.
    #[error("could not read keyring {path}: {source}")]
    KeyringUnreadable {
        /// Path of the keyring file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The keyring holds no usable keys.
    #[error("keyring {path} contains no trusted keys")]
    NoTrustedKeys {
        /// Path of the keyring file.
        path: String,
    },

    /// The provenance or archive could not be read.
    #[error("could not read {path}: {source}")]
    Unreadable {
        /// Path of the unreadable file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The provenance file is not a valid signature.
    #[error("invalid provenance file {path}: {reason}")]
    InvalidSignature {
        /// Path of the provenance file.
        path: String,
        /// Description of the decode failure.
        reason: String,
    },

    /// No trusted key validated the signature.
    #[error("signature does not match any of {keys} trusted key(s): {reason}")]
    SignatureMismatch {
        /// Number of keys tried.
        keys: usize,
        /// The last verification failure.
        reason: String,
    },
}

/// A trusted key loaded from the keyring.
struct TrustedKey {
    label: String,
    key: PublicKey,
}

/// Verifier backed by `minisign-verify`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinisignVerifier;

impl ProvenanceVerifier for MinisignVerifier {
    fn verify(
        &self,
        archive: &Path,
        provenance: &Path,
        keyring: &Path,
    ) -> Result<Verification, VerifyError> {
        let keys = load_keyring(keyring)?;
        let signature_text =
            fs::read_to_string(provenance).map_err(|source| VerifyError::Unreadable {
                path: provenance.display().to_string(),
                source,
            })?;
        let signature =
            Signature::decode(&signature_text).map_err(|e| VerifyError::InvalidSignature {
                path: provenance.display().to_string(),
                reason: e.to_string(),
            })?;
        let content = fs::read(archive).map_err(|source| VerifyError::Unreadable {
            path: archive.display().to_string(),
            source,
        })?;

        let mut last_err = String::from("no keys tried");
        for trusted in &keys {
            match trusted.key.verify(&content, &signature, false) {
                Ok(()) => {
                    debug!("{} verified with {}", archive.display(), trusted.label);
                    return Ok(Verification::signed(
                        trusted.label.clone(),
                        sha256_hex(&content),
                    ));
                }
                Err(e) => {
                    trace!("{} rejected {}: {e}", trusted.label, archive.display());
                    last_err = e.to_string();
                }
            }
        }

        Err(VerifyError::SignatureMismatch {
            keys: keys.len(),
            reason: last_err,
        })
    }
}

/// Parse the keyring at `path` into trusted keys.
fn load_keyring(path: &Path) -> Result<Vec<TrustedKey>, VerifyError> {
    let text = fs::read_to_string(path).map_err(|source| VerifyError::KeyringUnreadable {
        path: path.display().to_string(),
        source,
    })?;
    let keys = parse_keyring(&text);
    if keys.is_empty() {
        return Err(VerifyError::NoTrustedKeys {
            path: path.display().to_string(),
        });
    }
    debug!("loaded {} trusted key(s) from {}", keys.len(), path.display());
    Ok(keys)
}

fn parse_keyring(text: &str) -> Vec<TrustedKey> {
    let mut keys = Vec::new();
    let mut pending_label: Option<String> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(comment) = line.strip_prefix(UNTRUSTED_COMMENT) {
            pending_label = Some(comment.trim().to_owned());
            continue;
        }
        match PublicKey::from_base64(line) {
            Ok(key) => {
                let label = pending_label
                    .take()
                    .filter(|label| !label.is_empty())
                    .unwrap_or_else(|| format!("key {}", keys.len() + 1));
                keys.push(TrustedKey { label, key });
            }
            Err(e) => {
                debug!("skipping keyring line that is not a public key: {e}");
                pending_label = None;
            }
        }
    }
    keys
}

/// Return the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Return the hex-encoded SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[path = "provenance_tests.rs"]
mod tests;
