//! chart-fetch CLI entrypoint.
//!
//! Downloads each requested chart in order, reporting provenance checks on
//! stdout and progress on stderr. The first failure stops the run and exits
//! with status 1.

use chart_fetch::cli::Cli;
use chart_fetch::config::{FetchSettings, LOG_ENV, log_filter};
use chart_fetch::dirs::{BaseDirs, SystemBaseDirs};
use chart_fetch::download::{ChartDownloader, RepositoryDownloader};
use chart_fetch::error::Result;
use chart_fetch::extraction::{ArchiveExpander, TarExpander};
use chart_fetch::fetch::Fetcher;
use chart_fetch::output::write_stderr_line;
use clap::Parser;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &SystemBaseDirs, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(verbosity: u8) {
    let env = env_logger::Env::default().filter_or(LOG_ENV, log_filter(verbosity));
    env_logger::init_from_env(env);
}

fn run(
    cli: &Cli,
    dirs: &dyn BaseDirs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let settings = FetchSettings::from_cli(cli, dirs)?;
    let downloader = RepositoryDownloader::new(settings.home.clone());
    run_with(&settings, &downloader, &TarExpander, stdout, stderr)
}

/// Runs the fetch loop with explicit backends.
fn run_with(
    settings: &FetchSettings,
    downloader: &dyn ChartDownloader,
    expander: &dyn ArchiveExpander,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    Fetcher::new(downloader, expander)
        .quiet(settings.quiet)
        .fetch_all(&settings.requests, stdout, stderr)
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("Error: {err}"));
            1
        }
    }
}
