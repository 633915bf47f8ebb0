//! Running pre-install and post-install scripts.

use crate::component::ScriptRole;
use crate::error::{AppInstallError, Result};
use crate::exec::CommandRunner;
use camino::Utf8Path;
use log::info;

/// Runs install scripts.
pub trait ScriptRunner {
    /// Run the staged script at `path` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::Script`] when the script exits with a
    /// non-zero status, or an I/O error when it cannot be started.
    fn run_script(&self, role: ScriptRole, path: &Utf8Path) -> Result<()>;
}

/// Runs scripts through a shell, so they need not be executable.
pub struct ShellScriptRunner<'a> {
    runner: &'a dyn CommandRunner,
    shell: String,
}

impl<'a> ShellScriptRunner<'a> {
    /// Create a script runner using `shell`, for example `sh`.
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner, shell: impl Into<String>) -> Self {
        Self {
            runner,
            shell: shell.into(),
        }
    }
}

impl ScriptRunner for ShellScriptRunner<'_> {
    fn run_script(&self, role: ScriptRole, path: &Utf8Path) -> Result<()> {
        info!("running {role} script {path}");
        let output = self.runner.run(&self.shell, &[path.to_string()])?;
        if output.status.success() {
            return Ok(());
        }
        Err(AppInstallError::Script {
            role,
            path: path.to_owned(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}
