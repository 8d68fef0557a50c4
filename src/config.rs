//! Run settings assembled from the command line.
//!
//! [`FetchSettings`] turns the parsed [`Cli`] into one [`FetchRequest`] per
//! chart reference and resolves the defaults that depend on the user's
//! environment: the keyring and the chart-fetch home.

use camino::Utf8PathBuf;
use log::debug;

use crate::cli::Cli;
use crate::dirs::BaseDirs;
use crate::error::{FetchError, Result};
use crate::fetch::FetchRequest;
use crate::paths::{default_home, default_keyring};
use crate::verification::{VerificationMode, resolve_mode};

/// Environment variable selecting the log filter.
pub const LOG_ENV: &str = "CHART_FETCH_LOG";

/// Everything a run needs, resolved from CLI flags and the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// One request per chart reference, in command-line order.
    pub requests: Vec<FetchRequest>,
    /// Directory holding `repositories.toml`, if one could be determined.
    pub home: Option<Utf8PathBuf>,
    /// Suppress progress output.
    pub quiet: bool,
}

impl FetchSettings {
    /// Build settings from parsed arguments.
    ///
    /// The keyring default is only required when `--verify` is given; the
    /// home default is best-effort since URL references never need it.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Usage`] when no chart was given, before any
    /// directory lookups, and [`FetchError::Config`] when `--verify` is set
    /// without `--keyring` and the home directory cannot be determined.
    pub fn from_cli(cli: &Cli, dirs: &dyn BaseDirs) -> Result<Self> {
        if cli.charts.is_empty() {
            return Err(FetchError::Usage);
        }

        let mode = resolve_mode(cli.verify, cli.verify_later);
        let keyring = match (&cli.keyring, mode) {
            (Some(keyring), _) => keyring.clone(),
            (None, VerificationMode::Always) => default_keyring(dirs)?,
            (None, _) => default_keyring(dirs).unwrap_or_default(),
        };
        let home = match &cli.home {
            Some(home) => Some(home.clone()),
            None => default_home(dirs)
                .inspect_err(|e| debug!("no default chart-fetch home: {e}"))
                .ok(),
        };

        let requests = cli
            .charts
            .iter()
            .map(|reference| FetchRequest {
                reference: reference.clone(),
                version: cli.version.clone().unwrap_or_default(),
                destination: cli.destination.clone(),
                untar: cli.untar,
                untar_dir: cli.untar_dir.clone(),
                verify: cli.verify,
                verify_later: cli.verify_later,
                keyring: keyring.clone(),
            })
            .collect();

        Ok(Self {
            requests,
            home,
            quiet: cli.quiet,
        })
    }
}

/// Map `-v` occurrences to a default log filter.
///
/// # Examples
///
/// ```
/// use chart_fetch::config::log_filter;
///
/// assert_eq!(log_filter(0), "warn");
/// assert_eq!(log_filter(1), "debug");
/// assert_eq!(log_filter(5), "trace");
/// ```
#[must_use]
pub const fn log_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirs::MockBaseDirs;
    use clap::Parser;
    use rstest::rstest;
    use std::path::PathBuf;

    fn home_dirs() -> MockBaseDirs {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/test")));
        dirs.expect_chart_fetch_home()
            .returning(|| Some(PathBuf::from("/home/test/.local/share/chart-fetch")));
        dirs
    }

    fn homeless_dirs() -> MockBaseDirs {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_home_dir().returning(|| None);
        dirs.expect_chart_fetch_home().returning(|| None);
        dirs
    }

    #[test]
    fn no_charts_is_usage_error_without_touching_dirs() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_home_dir().never();
        dirs.expect_chart_fetch_home().never();
        let cli = Cli::parse_from(["chart-fetch", "--verify"]);

        let err = FetchSettings::from_cli(&cli, &dirs).expect_err("expected usage error");
        assert!(matches!(err, FetchError::Usage));
    }

    #[test]
    fn builds_one_request_per_chart_in_order() {
        let cli = Cli::parse_from([
            "chart-fetch",
            "--version",
            "1.2.0",
            "-d",
            "/out",
            "stable/a",
            "stable/b",
        ]);

        let settings = FetchSettings::from_cli(&cli, &home_dirs()).expect("settings");

        let references: Vec<&str> = settings
            .requests
            .iter()
            .map(|r| r.reference.as_str())
            .collect();
        assert_eq!(references, vec!["stable/a", "stable/b"]);
        let first = settings.requests.first().expect("first request");
        assert_eq!(first.version, "1.2.0");
        assert_eq!(first.destination, Utf8PathBuf::from("/out"));
        assert_eq!(first.untar_dir, Utf8PathBuf::from("."));
        assert_eq!(
            settings.home,
            Some(Utf8PathBuf::from("/home/test/.local/share/chart-fetch"))
        );
    }

    #[test]
    fn keyring_defaults_under_home() {
        let cli = Cli::parse_from(["chart-fetch", "--verify", "stable/mychart"]);

        let settings = FetchSettings::from_cli(&cli, &home_dirs()).expect("settings");

        let request = settings.requests.first().expect("request");
        assert_eq!(
            request.keyring,
            Utf8PathBuf::from("/home/test/.chart-fetch/keyring.pub")
        );
        assert_eq!(request.mode(), VerificationMode::Always);
    }

    #[test]
    fn explicit_keyring_and_home_win() {
        let cli = Cli::parse_from([
            "chart-fetch",
            "--verify",
            "--keyring",
            "/keys/pub",
            "--home",
            "/srv/charts",
            "stable/mychart",
        ]);

        let settings = FetchSettings::from_cli(&cli, &homeless_dirs()).expect("settings");

        let request = settings.requests.first().expect("request");
        assert_eq!(request.keyring, Utf8PathBuf::from("/keys/pub"));
        assert_eq!(settings.home, Some(Utf8PathBuf::from("/srv/charts")));
    }

    #[test]
    fn verify_without_home_or_keyring_is_config_error() {
        let cli = Cli::parse_from(["chart-fetch", "--verify", "stable/mychart"]);

        let err = FetchSettings::from_cli(&cli, &homeless_dirs()).expect_err("expected config error");
        assert!(matches!(err, FetchError::Config { .. }));
    }

    #[rstest]
    #[case::never(&["chart-fetch", "stable/mychart"][..])]
    #[case::later(&["chart-fetch", "--prov", "stable/mychart"][..])]
    fn missing_home_is_tolerated_without_verify(#[case] args: &[&str]) {
        let cli = Cli::parse_from(args);

        let settings = FetchSettings::from_cli(&cli, &homeless_dirs()).expect("settings");
        assert!(settings.home.is_none());
        assert_eq!(settings.requests.len(), 1);
    }

    #[test]
    fn quiet_flag_is_carried() {
        let cli = Cli::parse_from(["chart-fetch", "-q", "stable/mychart"]);
        let settings = FetchSettings::from_cli(&cli, &home_dirs()).expect("settings");
        assert!(settings.quiet);
    }
}
