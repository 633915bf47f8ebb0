//! Error types for building and applying installation packages.
//!
//! Every fallible operation in the crate returns [`AppInstallError`]. The
//! variants are grouped into the coarse categories of [`ErrorKind`] so the
//! binaries can decide how to report a failure (usage text, exit code) without
//! matching on every variant.

use crate::component::ScriptRole;
use crate::install::InstallPhase;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Coarse classification of an [`AppInstallError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing command-line arguments or spec-file directives.
    Usage,
    /// Invalid build state, such as a missing output path.
    Manifest,
    /// Local I/O failure while staging a package payload.
    Extraction,
    /// A library restore, save, or lodrun request failed on the target, or
    /// a packaged path could not be written into the target file system.
    TargetSystem,
    /// A pre-install or post-install script reported failure.
    Script,
    /// The embedded manifest or payload of a package is unreadable.
    CorruptPackage,
    /// Any other I/O failure.
    Io,
}

/// Errors that can occur while building or installing a package.
#[derive(Debug, Error)]
pub enum AppInstallError {
    /// A command-line or configuration value was rejected.
    #[error("{message}")]
    Usage {
        /// Description of the problem.
        message: String,
    },

    /// A directive was given without its value.
    #[error("argument '{flag}' specified without value")]
    MissingArgument {
        /// The directive flag, for example `--qsys`.
        flag: &'static str,
    },

    /// A spec file contains a directive outside the supported vocabulary.
    #[error("unrecognized directive '{directive}' at {file}:{line}")]
    UnknownDirective {
        /// Spec file containing the directive.
        file: Utf8PathBuf,
        /// One-based line number.
        line: usize,
        /// The rejected directive token.
        directive: String,
    },

    /// A spec file includes itself, directly or through other spec files.
    #[error("spec file inclusion cycle: {chain}")]
    SpecCycle {
        /// The inclusion chain, joined with ` -> `.
        chain: String,
    },

    /// The file given to the installer carries no package footer.
    #[error("{path} is not an installation package")]
    NotAPackage {
        /// Path that was probed.
        path: Utf8PathBuf,
    },

    /// `build` was requested before an output file was set.
    #[error("no output file specified; use -o <package_file>")]
    OutputNotSet,

    /// A single-valued directive was given twice.
    #[error("only one {flag} may be specified (already set to {existing})")]
    DuplicateSingleton {
        /// The directive flag.
        flag: &'static str,
        /// The value recorded by the earlier directive.
        existing: Utf8PathBuf,
    },

    /// A file-system component does not exist.
    #[error("{flag} {path}: no such file or directory")]
    PathNotFound {
        /// The directive flag.
        flag: &'static str,
        /// The missing path.
        path: Utf8PathBuf,
    },

    /// A library name does not follow object naming rules.
    #[error("invalid library name \"{name}\": {reason}")]
    InvalidLibraryName {
        /// The rejected name.
        name: String,
        /// Which rule was violated.
        reason: &'static str,
    },

    /// Writing the package artifact failed.
    #[error("failed to write package {path}")]
    Packaging {
        /// The artifact or payload path being written.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Staging the package payload failed.
    #[error("extraction failed at {path}")]
    Extraction {
        /// Path being extracted or created.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Writing a packaged directory or file onto the target failed.
    #[error("failed to install {path}")]
    Materialize {
        /// Destination being created or written.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A payload entry attempts to escape the staging directory.
    #[error("path traversal detected in payload entry: {path}")]
    PathTraversal {
        /// The offending entry path.
        path: String,
    },

    /// Another install run holds the staging directory.
    #[error("staging directory {path} is in use by another install")]
    StagingLocked {
        /// The locked staging directory.
        path: Utf8PathBuf,
    },

    /// A request to the target system failed.
    #[error("{operation} of {object} failed: {message}")]
    TargetSystem {
        /// The requested operation (check, save, restore, lodrun).
        operation: &'static str,
        /// The library or save file involved.
        object: String,
        /// Description reported by the target system.
        message: String,
    },

    /// A pre-install or post-install script failed.
    #[error("{role} script {path} failed ({status}){}", format_stderr(stderr))]
    Script {
        /// Which script failed.
        role: ScriptRole,
        /// The staged script path.
        path: Utf8PathBuf,
        /// Exit status description.
        status: String,
        /// Trimmed stderr of the script.
        stderr: String,
    },

    /// The package manifest or payload could not be read back.
    #[error("corrupt package: {reason}")]
    CorruptPackage {
        /// Description of the corruption.
        reason: String,
    },

    /// The configuration file could not be loaded.
    #[error("invalid configuration at {path}: {reason}")]
    Config {
        /// Configuration file path.
        path: Utf8PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// An installation step failed; earlier steps remain applied.
    #[error("installation failed during {step}")]
    StepFailed {
        /// The pipeline step that failed.
        step: InstallPhase,
        /// The error raised by the step.
        #[source]
        source: Box<AppInstallError>,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl AppInstallError {
    /// Classify this error.
    ///
    /// [`AppInstallError::StepFailed`] reports the kind of the error that
    /// caused the step to fail.
    ///
    /// # Examples
    ///
    /// ```
    /// use appinstall::error::{AppInstallError, ErrorKind};
    ///
    /// let err = AppInstallError::MissingArgument { flag: "--qsys" };
    /// assert_eq!(err.kind(), ErrorKind::Usage);
    /// ```
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage { .. }
            | Self::MissingArgument { .. }
            | Self::UnknownDirective { .. }
            | Self::SpecCycle { .. }
            | Self::NotAPackage { .. } => ErrorKind::Usage,
            Self::OutputNotSet
            | Self::DuplicateSingleton { .. }
            | Self::PathNotFound { .. }
            | Self::InvalidLibraryName { .. }
            | Self::Config { .. } => ErrorKind::Manifest,
            Self::Extraction { .. } | Self::PathTraversal { .. } | Self::StagingLocked { .. } => {
                ErrorKind::Extraction
            }
            Self::TargetSystem { .. } | Self::Materialize { .. } => ErrorKind::TargetSystem,
            Self::Script { .. } => ErrorKind::Script,
            Self::CorruptPackage { .. } => ErrorKind::CorruptPackage,
            Self::StepFailed { source, .. } => source.kind(),
            Self::Packaging { .. } | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Build a closure mapping an I/O error to [`AppInstallError::Extraction`].
    pub(crate) fn extraction_at(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Extraction { path, source }
    }

    /// Build a closure mapping an I/O error to [`AppInstallError::Materialize`].
    pub(crate) fn materialize_at(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Materialize { path, source }
    }

    /// Build a closure mapping an I/O error to [`AppInstallError::Packaging`].
    pub(crate) fn packaging_at(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Packaging { path, source }
    }
}

/// Result type alias using [`AppInstallError`].
pub type Result<T> = std::result::Result<T, AppInstallError>;
