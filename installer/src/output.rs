//! User-facing output for both binaries.
//!
//! Progress and results go to an explicit writer, normally stderr, so they
//! can be captured in tests. Diagnostics go through the `log` facade instead.

use crate::builder::BuiltPackage;
use crate::error::{AppInstallError, ErrorKind};
use crate::install::InstallReport;
use std::error::Error as _;
use std::fmt;
use std::io::Write;

/// Exit code for success, including partial success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for command-line and spec-file usage errors.
pub const EXIT_USAGE: i32 = -1;
/// Exit code for every other failure.
pub const EXIT_FAILURE: i32 = 1;

/// Write one line, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; nothing sensible to do on failure.
    }
}

/// Print `err` and return the matching exit code.
///
/// In verbose mode every cause in the source chain is printed as well.
///
/// # Examples
///
/// ```
/// use appinstall::error::AppInstallError;
/// use appinstall::output::{EXIT_USAGE, report_failure};
///
/// let mut stderr = Vec::new();
/// let code = report_failure(&mut stderr, &AppInstallError::MissingArgument { flag: "--qsys" }, false);
/// assert_eq!(code, EXIT_USAGE);
/// assert!(String::from_utf8_lossy(&stderr).starts_with("error: argument '--qsys'"));
/// ```
pub fn report_failure(stderr: &mut dyn Write, err: &AppInstallError, verbose: bool) -> i32 {
    write_stderr_line(stderr, format!("error: {err}"));
    let mut source = err.source();
    while let Some(cause) = source {
        if verbose || matches!(err, AppInstallError::StepFailed { .. }) {
            write_stderr_line(stderr, format!("  caused by: {cause}"));
        }
        if !verbose {
            break;
        }
        source = cause.source();
    }
    exit_code_for(err)
}

/// The process exit code for `err`.
#[must_use]
pub fn exit_code_for(err: &AppInstallError) -> i32 {
    match err.kind() {
        ErrorKind::Usage => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

/// Print the outcome of a build.
pub fn write_build_summary(stderr: &mut dyn Write, built: &BuiltPackage) {
    let manifest = &built.manifest;
    write_stderr_line(
        stderr,
        format!(
            "Built {} ({} component(s), payload sha256 {})",
            built.path,
            manifest.all_entries().count(),
            built.footer.digest_hex()
        ),
    );
}

/// Print the outcome of an installation.
pub fn write_install_summary(stderr: &mut dyn Write, report: &InstallReport) {
    write_stderr_line(stderr, "");
    if report.is_partial() {
        write_stderr_line(stderr, "Installation completed with skipped libraries:");
        for skipped in &report.skipped {
            write_stderr_line(
                stderr,
                format!("  - {} ({})", skipped.restore_to, skipped.reason),
            );
        }
    } else {
        write_stderr_line(stderr, "Installation complete.");
    }
    write_stderr_line(
        stderr,
        format!(
            "  {} library(ies) restored, {} path(s) installed",
            report.restored.len(),
            report.materialized.len()
        ),
    );
}
