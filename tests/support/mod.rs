//! Test support utilities for chart-fetch integration tests.
//!
//! [`Sandbox`] lays out a temporary chart-fetch home, a destination, a
//! scratch root, and a keyring, and serves a `stable` repository from memory
//! so complete fetches run without network access.

use camino::{Utf8Path, Utf8PathBuf};
use chart_fetch::download::RepositoryDownloader;
use chart_fetch::error::FetchError;
use chart_fetch::extraction::TarExpander;
use chart_fetch::fetch::{FetchRequest, Fetcher};
use chart_fetch::provenance::MinisignVerifier;
use chart_fetch::repository::REPOSITORIES_FILE;
use chart_fetch::test_utils::{MemoryTransport, TestSigner, index_json, tar_gz_bytes};
use tempfile::TempDir;

/// Base URL of the in-memory `stable` repository.
pub const REPO_URL: &str = "https://charts.example.com/stable";

/// Files packed into every test chart.
pub const CHART_FILES: &[(&str, &[u8])] = &[
    ("mychart/Chart.yaml", b"name: mychart\nversion: 1.2.0\n"),
    ("mychart/values.yaml", b"replicas: 1\n"),
];

/// Captured result of a fetch run.
pub struct RunOutput {
    /// The result of `fetch_all`.
    pub result: Result<(), FetchError>,
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
}

/// An isolated chart-fetch environment.
pub struct Sandbox {
    _temp: TempDir,
    /// Directory holding `repositories.toml`.
    pub home: Utf8PathBuf,
    /// User-visible destination directory.
    pub destination: Utf8PathBuf,
    /// Root under which scratch directories are created.
    pub scratch: Utf8PathBuf,
    /// Keyring trusting [`Sandbox::signer`].
    pub keyring: Utf8PathBuf,
    /// Key trusted by the keyring.
    pub signer: TestSigner,
    bodies: Vec<(String, Vec<u8>)>,
}

impl Sandbox {
    /// Create a sandbox with an empty `stable` repository.
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 temp path");
        let home = root.join("home");
        let scratch = root.join("scratch");
        std::fs::create_dir_all(&home).expect("create home");
        std::fs::create_dir_all(&scratch).expect("create scratch root");
        std::fs::write(
            home.join(REPOSITORIES_FILE),
            format!("[[repository]]\nname = \"stable\"\nurl = \"{REPO_URL}\"\n"),
        )
        .expect("write repositories file");

        let signer = TestSigner::generate();
        let keyring = root.join("keyring.pub");
        std::fs::write(&keyring, signer.keyring_entry("release key")).expect("write keyring");

        Self {
            home,
            destination: root.join("out"),
            scratch,
            keyring,
            signer,
            bodies: Vec::new(),
            _temp: temp,
        }
    }

    fn serve(&mut self, url: String, body: impl Into<Vec<u8>>) {
        self.bodies.push((url, body.into()));
    }

    /// Publish `mychart` at `versions` in the index and serve each archive.
    ///
    /// Returns the archive bytes, identical for every version.
    pub fn publish(&mut self, versions: &[&str]) -> Vec<u8> {
        let archive = tar_gz_bytes(CHART_FILES).expect("build chart archive");
        let names: Vec<String> = versions
            .iter()
            .map(|version| format!("mychart-{version}.tgz"))
            .collect();
        let entries: Vec<(&str, &str)> = versions
            .iter()
            .zip(&names)
            .map(|(version, name)| (*version, name.as_str()))
            .collect();
        self.serve(format!("{REPO_URL}/index.json"), index_json("mychart", &entries));
        for name in &names {
            self.serve(format!("{REPO_URL}/{name}"), archive.clone());
        }
        archive
    }

    /// Serve raw bytes as the archive for `version`.
    pub fn publish_raw(&mut self, version: &str, bytes: &[u8]) {
        let name = format!("mychart-{version}.tgz");
        self.serve(
            format!("{REPO_URL}/index.json"),
            index_json("mychart", &[(version, name.as_str())]),
        );
        self.serve(format!("{REPO_URL}/{name}"), bytes.to_vec());
    }

    /// Serve a provenance file for `version` signed by `signer`.
    pub fn sign_with(&mut self, signer: &TestSigner, version: &str, archive: &[u8]) {
        let signature = signer.sign(archive);
        self.serve(format!("{REPO_URL}/mychart-{version}.tgz.prov"), signature);
    }

    /// Serve a provenance file for `version` signed by the trusted key.
    pub fn sign_trusted(&mut self, version: &str, archive: &[u8]) {
        let signature = self.signer.sign(archive);
        self.serve(format!("{REPO_URL}/mychart-{version}.tgz.prov"), signature);
    }

    /// A request for `reference` against this sandbox's destination and
    /// keyring.
    pub fn request(&self, reference: &str) -> FetchRequest {
        FetchRequest {
            reference: reference.to_owned(),
            destination: self.destination.clone(),
            untar_dir: Utf8PathBuf::from("."),
            keyring: self.keyring.clone(),
            ..FetchRequest::default()
        }
    }

    /// Run the requests through the production downloader and expander.
    pub fn run(&self, requests: &[FetchRequest]) -> RunOutput {
        let transport = self
            .bodies
            .iter()
            .fold(MemoryTransport::new(), |transport, (url, body)| {
                transport.with(url.clone(), body.clone())
            });
        let downloader = RepositoryDownloader::with_parts(
            Some(self.home.clone()),
            transport,
            MinisignVerifier,
        );
        let fetcher = Fetcher::new(&downloader, &TarExpander).with_scratch_root(&self.scratch);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = fetcher.fetch_all(requests, &mut stdout, &mut stderr);
        RunOutput {
            result,
            stdout: String::from_utf8(stdout).expect("stdout UTF-8"),
            stderr: String::from_utf8(stderr).expect("stderr UTF-8"),
        }
    }

    /// Sorted file names directly inside `dir`, or empty if it is missing.
    pub fn entries(dir: &Utf8Path) -> Vec<String> {
        let Ok(read_dir) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = read_dir
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }

    /// Return true when no scratch directory is left behind.
    pub fn scratch_is_clean(&self) -> bool {
        Self::entries(&self.scratch).is_empty()
    }
}
