//! The component directive vocabulary shared by the command line and spec files.
//!
//! A directive is one flag/value pair such as `--qsys MYLIB`. The build CLI
//! and spec files both reduce to an ordered list of [`Directive`] values that
//! the [`PackageBuilder`](crate::builder::PackageBuilder) applies in turn.

use crate::error::{AppInstallError, Result};
use std::fmt;

/// One component directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `--pre <file>`: the pre-install script.
    PreInstall(String),
    /// `--post <file>`: the post-install script.
    PostInstall(String),
    /// `--qsys <library>`: a library to save and restore.
    Library(String),
    /// `--dir <path>`: a directory without its content.
    BareDirectory(String),
    /// `--file <path>`: a file, or a directory with its content.
    File(String),
    /// `--spec <file>`: a spec file listing further directives.
    SpecFile(String),
    /// `--lodrun <savefile>`: the load-and-run library save file.
    Lodrun(String),
}

/// Flags in the directive vocabulary, in the order they are documented.
pub const DIRECTIVE_FLAGS: [&str; 7] = [
    "--qsys", "--dir", "--file", "--pre", "--post", "--spec", "--lodrun",
];

impl Directive {
    /// Build a directive from a flag and an optional value.
    ///
    /// Flags are matched case-insensitively. Returns `Ok(None)` when `flag`
    /// is not part of the vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::MissingArgument`] when `value` is absent or
    /// blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use appinstall::directive::Directive;
    ///
    /// let directive = Directive::parse("--QSYS", Some("MYLIB")).expect("valid");
    /// assert_eq!(directive, Some(Directive::Library("MYLIB".to_owned())));
    /// assert!(Directive::parse("--qsys", None).is_err());
    /// ```
    pub fn parse(flag: &str, value: Option<&str>) -> Result<Option<Self>> {
        let Some(canonical) = DIRECTIVE_FLAGS
            .iter()
            .copied()
            .find(|known| known.eq_ignore_ascii_case(flag))
        else {
            return Ok(None);
        };
        let value = expect_value(canonical, value)?;
        let directive = match canonical {
            "--pre" => Self::PreInstall(value),
            "--post" => Self::PostInstall(value),
            "--qsys" => Self::Library(value),
            "--dir" => Self::BareDirectory(value),
            "--file" => Self::File(value),
            "--spec" => Self::SpecFile(value),
            _ => Self::Lodrun(value),
        };
        Ok(Some(directive))
    }

    /// The flag that introduces this directive.
    #[must_use]
    pub const fn flag(&self) -> &'static str {
        match self {
            Self::PreInstall(_) => "--pre",
            Self::PostInstall(_) => "--post",
            Self::Library(_) => "--qsys",
            Self::BareDirectory(_) => "--dir",
            Self::File(_) => "--file",
            Self::SpecFile(_) => "--spec",
            Self::Lodrun(_) => "--lodrun",
        }
    }

    /// The directive's value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::PreInstall(v)
            | Self::PostInstall(v)
            | Self::Library(v)
            | Self::BareDirectory(v)
            | Self::File(v)
            | Self::SpecFile(v)
            | Self::Lodrun(v) => v,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.flag(), self.value())
    }
}

/// Return the trimmed value for `flag`, or fail when there is none.
///
/// # Errors
///
/// Returns [`AppInstallError::MissingArgument`] when `value` is `None` or
/// contains only whitespace.
pub fn expect_value(flag: &'static str, value: Option<&str>) -> Result<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(AppInstallError::MissingArgument { flag })
}
