//! Output formatting for the fetch command.
//!
//! Results the user asked for (the verification report) go to stdout and a
//! failed write is an error. Progress lines go to stderr on a best-effort
//! basis.

use camino::Utf8Path;
use std::io::Write;

use crate::error::{FetchError, Result};
use crate::verification::Verification;

/// Write a line to stdout, reporting write failures.
///
/// # Errors
///
/// Returns [`FetchError::WriteFailed`] if the write fails.
pub fn write_stdout_line(stdout: &mut dyn Write, message: impl std::fmt::Display) -> Result<()> {
    writeln!(stdout, "{message}").map_err(|source| FetchError::WriteFailed { source })
}

/// Write a line to stderr, ignoring failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Format the verification report line.
///
/// # Examples
///
/// ```
/// use chart_fetch::output::verification_message;
/// use chart_fetch::verification::Verification;
///
/// let line = verification_message(&Verification::signed("release key", "ab"));
/// assert_eq!(line, "Verification: signed by release key (sha256:ab)");
/// ```
#[must_use]
pub fn verification_message(verification: &Verification) -> String {
    format!("Verification: {verification}")
}

/// Format the progress line for a fetched chart.
#[must_use]
pub fn fetched_message(reference: &str, saved: &Utf8Path, untarred: Option<&Utf8Path>) -> String {
    match untarred {
        Some(dir) => format!("Fetched {reference} and unpacked it into {dir}"),
        None => format!("Fetched {reference} to {saved}"),
    }
}
