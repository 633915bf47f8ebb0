//! appinstall-apply entrypoint.
//!
//! Loads a package (by default the running executable, so a package built
//! with `--stub` installs itself), stages its payload, and applies it.

use appinstall::cli::ApplyCli;
use appinstall::config::AppInstallConfig;
use appinstall::confirm::LinePrompter;
use appinstall::dirs::{BaseDirs, SystemBaseDirs, default_staging_root};
use appinstall::error::{AppInstallError, Result};
use appinstall::exec::SystemCommandRunner;
use appinstall::extraction::ExtractionTask;
use appinstall::install::{InstallReport, InstallationTask};
use appinstall::logging::init_logging;
use appinstall::options::InstallOptions;
use appinstall::output::{
    EXIT_SUCCESS, EXIT_USAGE, report_failure, write_install_summary, write_stderr_line,
};
use appinstall::package::PackageConfiguration;
use appinstall::script::ShellScriptRunner;
use appinstall::target::CommandLibrarySystem;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

fn main() {
    let cli = match ApplyCli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };
    init_logging(cli.verbosity);

    let mut stderr = std::io::stderr();
    let exit_code = match run(&cli, &mut stderr) {
        Ok(report) => {
            write_install_summary(&mut stderr, &report);
            EXIT_SUCCESS
        }
        Err(err) => report_failure(&mut stderr, &err, cli.verbosity > 0),
    };
    if exit_code != EXIT_SUCCESS {
        std::process::exit(exit_code);
    }
}

fn run(cli: &ApplyCli, stderr: &mut dyn Write) -> Result<InstallReport> {
    let dirs = SystemBaseDirs::new();
    let config = AppInstallConfig::load(cli.config.as_deref(), &dirs)?;
    let options = cli.install_options()?;

    let package_path = match &cli.package {
        Some(path) => path.clone(),
        None => current_exe()?,
    };
    let package = PackageConfiguration::load(&package_path)?;
    let build = package.manifest().build();
    write_stderr_line(
        stderr,
        format!(
            "Installing {package_path} (built {} by appinstall {})",
            build.generated_at, build.tool_version
        ),
    );

    let staging_root = staging_root(&options, &config, &dirs);
    let layout = ExtractionTask::new(&package, staging_root).run()?;

    let runner = SystemCommandRunner::new(config.target.timeout());
    let system = CommandLibrarySystem::new(&runner, config.target.clone());
    let scripts = ShellScriptRunner::new(&runner, config.target.shell.clone());
    let mut prompter = LinePrompter::new(std::io::stdin().lock(), std::io::stderr());
    InstallationTask::new(&layout, &system, &scripts, &mut prompter).run(&options, stderr)
}

fn staging_root(options: &InstallOptions, config: &AppInstallConfig, dirs: &dyn BaseDirs) -> Utf8PathBuf {
    options
        .staging_dir
        .clone()
        .or_else(|| config.staging.root.clone())
        .unwrap_or_else(|| default_staging_root(dirs))
}

fn current_exe() -> Result<Utf8PathBuf> {
    let exe = std::env::current_exe()?;
    Utf8PathBuf::from_path_buf(exe).map_err(|path| AppInstallError::Usage {
        message: format!("executable path {} is not valid UTF-8", path.display()),
    })
}
