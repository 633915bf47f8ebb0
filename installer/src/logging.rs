//! Diagnostic logging setup shared by both binaries.
//!
//! Library code logs through the `log` macros; the binaries install a
//! `tracing-subscriber` formatter that also receives those records.

use tracing_subscriber::EnvFilter;

/// The default filter directive for a `-v` count.
#[must_use]
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "appinstall=warn",
        1 => "appinstall=debug",
        _ => "appinstall=trace",
    }
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `verbosity`. Calling this more than once
/// keeps the first subscriber.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
