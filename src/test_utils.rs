//! Shared test utilities for the chart-fetch crate.
//!
//! Archive builders, a minisign signer for producing provenance files, and
//! an in-memory [`Transport`] that serves repository indexes and charts
//! without network access.

use minisign::{KeyPair, PublicKey, SecretKey};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::path::Path;

use crate::download::{DownloadError, Transport};

/// Build an uncompressed tar archive holding `files`.
///
/// # Errors
///
/// Returns an I/O error if an entry cannot be appended.
pub fn tar_bytes(files: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(path)?;
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, *contents)?;
    }
    builder.into_inner()
}

/// Build a gzip-compressed tar archive holding `files`.
///
/// # Errors
///
/// Returns an I/O error if the archive cannot be built or compressed.
pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let tar = tar_bytes(files)?;
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar)?;
    encoder.finish()
}

/// Build a zstd-compressed tar archive holding `files`.
///
/// # Errors
///
/// Returns an I/O error if the archive cannot be built or compressed.
pub fn tar_zst_bytes(files: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    zstd::encode_all(Cursor::new(tar_bytes(files)?), 0)
}

/// Write an uncompressed tar archive to `path`.
///
/// # Panics
///
/// Panics if the archive cannot be built or written.
pub fn write_tar(path: &Path, files: &[(&str, &[u8])]) {
    write_archive(path, tar_bytes(files));
}

/// Write a gzip-compressed tar archive to `path`.
///
/// # Panics
///
/// Panics if the archive cannot be built or written.
pub fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
    write_archive(path, tar_gz_bytes(files));
}

/// Write a zstd-compressed tar archive to `path`.
///
/// # Panics
///
/// Panics if the archive cannot be built or written.
pub fn write_tar_zst(path: &Path, files: &[(&str, &[u8])]) {
    write_archive(path, tar_zst_bytes(files));
}

fn write_archive(path: &Path, bytes: io::Result<Vec<u8>>) {
    let result = bytes.and_then(|bytes| std::fs::write(path, bytes));
    if let Err(e) = result {
        panic!("failed to write test archive {}: {e}", path.display());
    }
}

/// A freshly generated minisign key pair for signing test charts.
pub struct TestSigner {
    pk: PublicKey,
    sk: SecretKey,
}

impl TestSigner {
    /// Generate an unencrypted key pair.
    ///
    /// # Panics
    ///
    /// Panics if key generation fails.
    #[must_use]
    pub fn generate() -> Self {
        match KeyPair::generate_unencrypted_keypair() {
            Ok(KeyPair { pk, sk }) => Self { pk, sk },
            Err(e) => panic!("failed to generate minisign key pair: {e}"),
        }
    }

    /// The public key in base64 form, as it appears in a keyring.
    #[must_use]
    pub fn public_key_base64(&self) -> String {
        self.pk.to_base64()
    }

    /// A keyring entry trusting this signer under `label`.
    #[must_use]
    pub fn keyring_entry(&self, label: &str) -> String {
        format!(
            "untrusted comment: {label}\n{}\n",
            self.public_key_base64()
        )
    }

    /// Sign `data`, returning the provenance file contents.
    ///
    /// # Panics
    ///
    /// Panics if signing fails.
    #[must_use]
    pub fn sign(&self, data: &[u8]) -> String {
        match minisign::sign(
            Some(&self.pk),
            &self.sk,
            Cursor::new(data),
            Some("chart-fetch test chart"),
            Some("signature from chart-fetch test signer"),
        ) {
            Ok(signature) => signature.into_string(),
            Err(e) => panic!("failed to sign test data: {e}"),
        }
    }
}

/// A [`Transport`] serving fixed bodies from memory.
///
/// Every requested URL is recorded, including those that were not found,
/// so tests can assert on the exact fetch sequence.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl MemoryTransport {
    /// Create an empty transport; every request returns not found.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    fn body(&self, url: &str) -> Result<&[u8], DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        self.bodies
            .get(url)
            .map(Vec::as_slice)
            .ok_or_else(|| DownloadError::NotFound {
                url: url.to_owned(),
            })
    }
}

impl Transport for MemoryTransport {
    fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        let body = self.body(url)?;
        String::from_utf8(body.to_vec()).map_err(|e| DownloadError::HttpError {
            url: url.to_owned(),
            reason: e.to_string(),
        })
    }

    fn get_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let body = self.body(url)?;
        std::fs::write(dest, body)?;
        Ok(())
    }
}

/// Render a repository `index.json` listing `versions` of `chart`.
///
/// Each version is paired with its download URL.
#[must_use]
pub fn index_json(chart: &str, versions: &[(&str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = versions
        .iter()
        .map(|(version, url)| serde_json::json!({ "version": version, "urls": [url] }))
        .collect();
    let mut charts = serde_json::Map::new();
    charts.insert(chart.to_owned(), serde_json::Value::Array(entries));
    serde_json::json!({ "entries": charts }).to_string()
}
