//! Command-line definitions for `appinstall` and `appinstall-apply`.
//!
//! Component flags on the build command are order-sensitive: the package
//! lists components in the order they were given. Clap collects each flag's
//! values separately, so [`parse_build_args`] rebuilds the original order
//! from the argument indices.

use crate::component::normalize_library_name;
use crate::confirm::ConfirmPolicy;
use crate::directive::Directive;
use crate::error::Result;
use crate::options::InstallOptions;
use camino::Utf8PathBuf;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;

/// Version text shown by `--version`, including the UTC build date.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nBuild Date (UTC): ",
    env!("APPINSTALL_BUILD_DATE"),
);

/// Build a self-installing deployment package.
#[derive(Parser, Debug, Default)]
#[command(name = "appinstall")]
#[command(version, long_version = LONG_VERSION, about)]
#[command(after_help = concat!(
    "Multiple components can be specified. They are installed in the order given,\n",
    "after the pre-install script and before the post-install script.\n\n",
    "A spec file lists one component per line using the same flags, for example:\n",
    "    --qsys APPLIB\n",
    "    --file /QOpenSys/etc/app.conf\n\n",
    "EXAMPLES:\n",
    "    $ appinstall -o app.pkg --qsys APPLIB --dir /home/app/logs --file /home/app/bin\n",
    "    $ appinstall -o app.pkg --spec app.spec --pre stop.sh --post start.sh",
))]
pub struct BuildCli {
    /// Package file to create.
    #[arg(short = 'o', value_name = "PACKAGE_FILE")]
    pub output: Option<String>,

    /// A library in the QSYS.LIB file system.
    #[arg(id = "qsys", long = "qsys", value_name = "LIBRARY", action = ArgAction::Append)]
    pub libraries: Vec<String>,

    /// A directory; its contents are not included.
    #[arg(id = "dir", long = "dir", value_name = "DIR", action = ArgAction::Append)]
    pub directories: Vec<String>,

    /// A file or directory; directory contents are included.
    #[arg(id = "file", long = "file", value_name = "PATH", action = ArgAction::Append)]
    pub files: Vec<String>,

    /// A pre-install script (only one can be specified).
    #[arg(id = "pre", long = "pre", value_name = "FILE", action = ArgAction::Append)]
    pub pre_install: Vec<String>,

    /// A post-install script (only one can be specified).
    #[arg(id = "post", long = "post", value_name = "FILE", action = ArgAction::Append)]
    pub post_install: Vec<String>,

    /// A spec file listing application components.
    #[arg(id = "spec", long = "spec", value_name = "FILE", action = ArgAction::Append)]
    pub spec_files: Vec<String>,

    /// A save file holding a library to load and run on install.
    #[arg(id = "lodrun", long = "lodrun", value_name = "SAVEFILE", action = ArgAction::Append)]
    pub lodrun: Vec<String>,

    /// Installer executable to place in front of the package.
    #[arg(long, value_name = "FILE")]
    pub stub: Option<Utf8PathBuf>,

    /// Configuration file [default: platform-specific].
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase diagnostic output (repeatable).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,
}

/// Argument ids of the component flags and the directive each produces.
const DIRECTIVE_ARGS: [(&str, fn(String) -> Directive); 7] = [
    ("qsys", Directive::Library),
    ("dir", Directive::BareDirectory),
    ("file", Directive::File),
    ("pre", Directive::PreInstall),
    ("post", Directive::PostInstall),
    ("spec", Directive::SpecFile),
    ("lodrun", Directive::Lodrun),
];

/// Parse build arguments, returning the options and the component
/// directives in command-line order.
///
/// # Errors
///
/// Returns the clap error for unknown flags, flags missing their value, and
/// help or version requests.
///
/// # Examples
///
/// ```
/// use appinstall::cli::parse_build_args;
/// use appinstall::directive::Directive;
///
/// let (cli, directives) =
///     parse_build_args(["appinstall", "--file", "a", "--qsys", "LIB", "--file", "b", "-o", "x"])
///         .expect("valid arguments");
/// assert_eq!(cli.output.as_deref(), Some("x"));
/// assert_eq!(
///     directives,
///     vec![
///         Directive::File("a".to_owned()),
///         Directive::Library("LIB".to_owned()),
///         Directive::File("b".to_owned()),
///     ]
/// );
/// ```
pub fn parse_build_args<I, T>(args: I) -> std::result::Result<(BuildCli, Vec<Directive>), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = BuildCli::command().try_get_matches_from(args)?;
    let cli = BuildCli::from_arg_matches(&matches)?;
    Ok((cli, ordered_directives(&matches)))
}

fn ordered_directives(matches: &ArgMatches) -> Vec<Directive> {
    let mut indexed: Vec<(usize, Directive)> = Vec::new();
    for (id, make) in DIRECTIVE_ARGS {
        let (Some(indices), Some(values)) =
            (matches.indices_of(id), matches.get_many::<String>(id))
        else {
            continue;
        };
        indexed.extend(indices.zip(values).map(|(index, value)| (index, make(value.clone()))));
    }
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, directive)| directive).collect()
}

/// Install a package built by `appinstall`.
#[derive(Parser, Debug, Default)]
#[command(name = "appinstall-apply")]
#[command(version, long_version = LONG_VERSION, about)]
#[command(after_help = concat!(
    "By default the installer asks before replacing each existing library.\n\n",
    "EXAMPLES:\n",
    "    $ appinstall-apply app.pkg\n",
    "    $ appinstall-apply -y --rstlib APPTEST app.pkg\n",
    "    $ ./app.pkg -c --lodrun",
))]
pub struct ApplyCli {
    /// Package to install [default: this executable].
    #[arg(value_name = "PACKAGE")]
    pub package: Option<Utf8PathBuf>,

    /// Replace existing libraries without asking.
    #[arg(short = 'y', long = "yes", conflicts_with = "continue_if_not_delete")]
    pub yes_to_all: bool,

    /// Skip libraries that would have to be deleted, and keep going.
    #[arg(short = 'c', long = "continue")]
    pub continue_if_not_delete: bool,

    /// Run the packaged lodrun library.
    #[arg(short = 'l', long = "lodrun")]
    pub lodrun: bool,

    /// Restore libraries under this name.
    #[arg(long, value_name = "LIBRARY")]
    pub rstlib: Option<String>,

    /// Restore libraries into this auxiliary storage pool.
    #[arg(long, value_name = "ASP")]
    pub rstasp: Option<String>,

    /// Restore libraries into this auxiliary storage pool device.
    #[arg(long, value_name = "DEVICE")]
    pub rstaspdev: Option<String>,

    /// Install directories and files under this prefix.
    #[arg(long, value_name = "DIR")]
    pub root: Option<Utf8PathBuf>,

    /// Stage the payload under this directory [default: platform cache].
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<Utf8PathBuf>,

    /// Configuration file [default: platform-specific].
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase diagnostic output (repeatable).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,
}

impl ApplyCli {
    /// The confirmation policy selected by `-y` or `-c`.
    #[must_use]
    pub const fn confirm_policy(&self) -> ConfirmPolicy {
        if self.yes_to_all {
            ConfirmPolicy::YesToAll
        } else if self.continue_if_not_delete {
            ConfirmPolicy::ContinueIfNotDelete
        } else {
            ConfirmPolicy::PromptEach
        }
    }

    /// Build the options for this run.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::AppInstallError::InvalidLibraryName`] for a
    /// malformed `--rstlib` value.
    pub fn install_options(&self) -> Result<InstallOptions> {
        let rstlib_target = self
            .rstlib
            .as_deref()
            .map(normalize_library_name)
            .transpose()?;
        Ok(InstallOptions {
            confirm: self.confirm_policy(),
            run_lodrun: self.lodrun,
            rstlib_target,
            rstasp_target: self.rstasp.clone(),
            rstaspdev_target: self.rstaspdev.clone(),
            root: self.root.clone(),
            staging_dir: self.staging_dir.clone(),
        })
    }
}
