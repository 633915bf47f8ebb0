//! Spec files: component directives read from a file.
//!
//! A spec file holds one directive per line, using the same flags as the
//! command line:
//!
//! ```text
//! # application objects
//! --qsys APPLIB
//! --dir /QOpenSys/etc/app
//! --file config/app.ini
//! --spec more-components.spec
//! ```
//!
//! Everything after the flag is the value, so paths may contain spaces.
//! Relative paths resolve against the directory holding the spec file.
//! Nested spec files are expanded recursively; a file that includes itself,
//! directly or through other files, is rejected.

use crate::component::absolutize;
use crate::directive::Directive;
use crate::error::{AppInstallError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Receives directives as a spec file is expanded.
pub trait DirectiveSink {
    /// Apply one directive; relative paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while applying the directive.
    fn apply_directive(&mut self, directive: &Directive, base_dir: &Utf8Path) -> Result<()>;
}

/// Expands spec files, tracking the inclusion chain to detect cycles.
#[derive(Debug, Default)]
pub struct SpecParser {
    stack: Vec<Utf8PathBuf>,
}

impl SpecParser {
    /// Create a parser with an empty inclusion chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand the spec file at `path`, forwarding each directive to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::PathNotFound`] if a spec file does not
    /// exist, [`AppInstallError::SpecCycle`] if inclusion loops back,
    /// [`AppInstallError::UnknownDirective`] or
    /// [`AppInstallError::MissingArgument`] for malformed lines, and any
    /// error returned by `sink`.
    pub fn expand(&mut self, path: &Utf8Path, sink: &mut dyn DirectiveSink) -> Result<()> {
        let canonical = canonical_spec_path(path)?;
        if self.stack.contains(&canonical) {
            let chain = self
                .stack
                .iter()
                .chain(std::iter::once(&canonical))
                .map(Utf8PathBuf::as_path)
                .map(Utf8Path::as_str)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(AppInstallError::SpecCycle { chain });
        }

        let contents = std::fs::read_to_string(&canonical)?;
        let directives = parse_spec(&canonical, &contents)?;
        let base_dir = canonical
            .parent()
            .map_or_else(|| Utf8PathBuf::from("/"), Utf8Path::to_owned);

        debug!("expanding spec file {canonical} ({} directives)", directives.len());
        self.stack.push(canonical);
        for directive in &directives {
            match directive {
                Directive::SpecFile(nested) => {
                    let nested = absolutize(Utf8Path::new(nested), &base_dir);
                    self.expand(&nested, sink)?;
                }
                other => sink.apply_directive(other, &base_dir)?,
            }
        }
        self.stack.pop();
        Ok(())
    }
}

/// Parse the directives in a spec file's contents.
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
///
/// Returns [`AppInstallError::UnknownDirective`] for a flag outside the
/// vocabulary and [`AppInstallError::MissingArgument`] for a flag without a
/// value.
///
/// # Examples
///
/// ```
/// use appinstall::directive::Directive;
/// use appinstall::spec_file::parse_spec;
/// use camino::Utf8Path;
///
/// let directives = parse_spec(Utf8Path::new("app.spec"), "--qsys MYLIB\n# note\n")
///     .expect("valid spec");
/// assert_eq!(directives, vec![Directive::Library("MYLIB".to_owned())]);
/// ```
pub fn parse_spec(file: &Utf8Path, contents: &str) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (flag, value) = match line.split_once(char::is_whitespace) {
            Some((flag, rest)) => (flag, Some(rest)),
            None => (line, None),
        };
        let directive = Directive::parse(flag, value)?.ok_or_else(|| {
            AppInstallError::UnknownDirective {
                file: file.to_owned(),
                line: index + 1,
                directive: flag.to_owned(),
            }
        })?;
        directives.push(directive);
    }
    Ok(directives)
}

fn canonical_spec_path(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let canonical = path
        .canonicalize_utf8()
        .map_err(|_| AppInstallError::PathNotFound {
            flag: "--spec",
            path: path.to_owned(),
        })?;
    Ok(canonical)
}
