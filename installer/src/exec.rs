//! Running external commands with a timeout.
//!
//! Library operations and install scripts are blocking calls to external
//! programs. This module provides the [`CommandRunner`] seam so the rest of
//! the crate can be exercised without a real target system.

use crate::error::{AppInstallError, Result};
use log::{debug, trace};
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run `program` with `args` and return its captured output.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started or does not finish
    /// within the runner's timeout.
    fn run(&self, program: &str, args: &[String]) -> Result<Output>;
}

/// Runs commands on the host, killing any that exceed a timeout.
///
/// # Examples
///
/// ```no_run
/// use appinstall::exec::{CommandRunner, SystemCommandRunner};
/// use std::time::Duration;
///
/// let runner = SystemCommandRunner::new(Duration::from_secs(60));
/// let output = runner.run("uname", &["-a".to_owned()])?;
/// assert!(output.status.success());
/// # Ok::<(), appinstall::error::AppInstallError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    /// Create a runner with the given per-command timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Read `pipe` to the end on its own thread so a chatty child cannot fill
/// the pipe buffer and stall while we wait on it.
fn drain<R>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| std::io::Error::other("output reader thread panicked"))?
        .map_err(AppInstallError::from)
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        debug!("running {program} {}", args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(status) = child.wait_timeout(self.timeout)? {
            trace!("{program} finished with {status}");
            return Ok(Output {
                status,
                stdout: collect(stdout)?,
                stderr: collect(stderr)?,
            });
        }

        let _ = child.kill();
        let _ = child.wait();
        // Not joined: a grandchild may still hold the pipes open.
        drop((stdout, stderr));
        Err(AppInstallError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!(
                "{program} timed out after {} seconds",
                self.timeout.as_secs()
            ),
        )))
    }
}

/// Describe a command's failure from its captured output.
///
/// Prefers trimmed stderr, then stdout, then the exit status.
#[must_use]
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stderr.trim().is_empty() {
        stderr.trim().to_owned()
    } else if !stdout.trim().is_empty() {
        stdout.trim().to_owned()
    } else {
        output.status.to_string()
    }
}
