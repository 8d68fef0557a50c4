//! CLI argument definitions for chart-fetch.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::Parser;

/// Download a chart from a repository and (optionally) unpack it.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "chart-fetch")]
#[command(about)]
#[command(long_about = concat!(
    "Retrieve a package from a package repository, and download it locally.\n\n",
    "This is useful for fetching packages to inspect, modify, or repackage. It can ",
    "also be used to perform cryptographic verification of a chart without ",
    "installing the chart.\n\n",
    "There are options for unpacking the chart after download. This will create a ",
    "directory for the chart and uncompress into that directory.\n\n",
    "If the --verify flag is specified, the requested chart MUST have a provenance ",
    "file, and MUST pass the verification process. Failure in any part of this will ",
    "result in an error, and the chart will not be saved locally.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Fetch the latest release of a chart into the current directory:\n",
    "    $ chart-fetch stable/mychart\n\n",
    "  Fetch and unpack a specific version:\n",
    "    $ chart-fetch --version 1.2.0 --untar -d /tmp/out stable/mychart\n\n",
    "  Fetch by URL and verify the signature:\n",
    "    $ chart-fetch --verify https://charts.example.com/mychart-1.2.0.tgz",
))]
pub struct Cli {
    /// Chart references: a chart URL or repo/name. Processed in order.
    #[arg(value_name = "CHART")]
    pub charts: Vec<String>,

    /// Unpack the chart after downloading it.
    #[arg(long)]
    pub untar: bool,

    /// If untar is specified, this flag specifies the location to expand the
    /// chart. Relative paths are resolved against --destination.
    #[arg(long = "untardir", value_name = "DIR", default_value = ".")]
    pub untar_dir: Utf8PathBuf,

    /// Verify the package against its signature.
    #[arg(long)]
    pub verify: bool,

    /// Fetch the provenance file, but don't perform verification.
    #[arg(long = "prov")]
    pub verify_later: bool,

    /// The specific version of a chart. Without this, the latest version is
    /// fetched.
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// Keyring containing public keys [default: ~/.chart-fetch/keyring.pub].
    #[arg(long, value_name = "FILE")]
    pub keyring: Option<Utf8PathBuf>,

    /// Location to write the chart. If this and untardir are specified,
    /// untardir is appended to this.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub destination: Utf8PathBuf,

    /// Directory holding repositories.toml [default: platform data
    /// directory].
    #[arg(long, value_name = "DIR")]
    pub home: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors and verification results still
    /// shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
