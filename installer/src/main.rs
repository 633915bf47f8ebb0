//! appinstall build entrypoint.
//!
//! Collects components from the command line and spec files, exports the
//! requested libraries, and writes the package artifact.

use appinstall::builder::PackageBuilder;
use appinstall::cli::{BuildCli, parse_build_args};
use appinstall::config::AppInstallConfig;
use appinstall::directive::Directive;
use appinstall::dirs::SystemBaseDirs;
use appinstall::error::{AppInstallError, Result};
use appinstall::exec::SystemCommandRunner;
use appinstall::logging::init_logging;
use appinstall::output::{EXIT_SUCCESS, EXIT_USAGE, report_failure, write_build_summary};
use appinstall::target::CommandLibrarySystem;
use camino::Utf8PathBuf;
use std::io::Write;

fn main() {
    let (cli, directives) = match parse_build_args(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };
    init_logging(cli.verbosity);

    let mut stderr = std::io::stderr();
    let exit_code = exit_code_for_run_result(run(&cli, &directives, &mut stderr), &cli, &mut stderr);
    if exit_code != EXIT_SUCCESS {
        std::process::exit(exit_code);
    }
}

fn run(cli: &BuildCli, directives: &[Directive], stderr: &mut dyn Write) -> Result<()> {
    let dirs = SystemBaseDirs::new();
    let config = AppInstallConfig::load(cli.config.as_deref(), &dirs)?;

    let mut builder = PackageBuilder::new(current_dir()?);
    for directive in directives {
        builder.apply(directive)?;
    }
    if let Some(output) = &cli.output {
        builder.set_output_file(output)?;
    }
    if let Some(stub) = &cli.stub {
        builder.set_installer_stub(stub.as_str())?;
    }

    let runner = SystemCommandRunner::new(config.target.timeout());
    let system = CommandLibrarySystem::new(&runner, config.target.clone());
    let built = builder.build(&system, stderr)?;
    write_build_summary(stderr, &built);
    Ok(())
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| AppInstallError::Usage {
        message: format!("current directory {} is not valid UTF-8", path.display()),
    })
}

fn exit_code_for_run_result(result: Result<()>, cli: &BuildCli, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            let code = report_failure(stderr, &err, cli.verbosity > 0);
            if code == EXIT_USAGE || matches!(err, AppInstallError::OutputNotSet) {
                let usage = <BuildCli as clap::CommandFactory>::command().render_usage();
                let _ = writeln!(stderr, "\n{usage}");
            }
            code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appinstall::output::EXIT_FAILURE;

    #[test]
    fn exit_code_is_zero_on_success() {
        let mut stderr = Vec::new();
        let code = exit_code_for_run_result(Ok(()), &BuildCli::default(), &mut stderr);
        assert_eq!(code, EXIT_SUCCESS);
        assert!(stderr.is_empty());
    }

    #[test]
    fn missing_argument_prints_usage_and_exits_minus_one() {
        let mut stderr = Vec::new();
        let code = exit_code_for_run_result(
            Err(AppInstallError::MissingArgument { flag: "--file" }),
            &BuildCli::default(),
            &mut stderr,
        );
        let text = String::from_utf8(stderr).expect("UTF-8");
        assert_eq!(code, EXIT_USAGE);
        assert!(text.contains("argument '--file' specified without value"));
        assert!(text.contains("Usage: appinstall"));
    }

    #[test]
    fn missing_output_is_a_manifest_failure() {
        let mut stderr = Vec::new();
        let code = exit_code_for_run_result(
            Err(AppInstallError::OutputNotSet),
            &BuildCli::default(),
            &mut stderr,
        );
        assert_eq!(code, EXIT_FAILURE);
        let text = String::from_utf8(stderr).expect("UTF-8");
        assert!(text.contains("no output file specified"));
    }
}
