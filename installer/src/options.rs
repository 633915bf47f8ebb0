//! Options for one installation run.

use crate::confirm::ConfirmPolicy;
use camino::{Utf8Path, Utf8PathBuf};

/// Settings fixed for the duration of one install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// How existing libraries are handled.
    pub confirm: ConfirmPolicy,
    /// Whether the lodrun library is run.
    pub run_lodrun: bool,
    /// Restore every library under this name instead of its own.
    pub rstlib_target: Option<String>,
    /// Auxiliary storage pool number to restore into.
    pub rstasp_target: Option<String>,
    /// Auxiliary storage pool device to restore into.
    pub rstaspdev_target: Option<String>,
    /// Prefix under which directories and files are materialized.
    pub root: Option<Utf8PathBuf>,
    /// Overrides the staging root.
    pub staging_dir: Option<Utf8PathBuf>,
}

impl InstallOptions {
    /// Where a packaged path is materialized on this system.
    ///
    /// # Examples
    ///
    /// ```
    /// use appinstall::options::InstallOptions;
    /// use camino::{Utf8Path, Utf8PathBuf};
    ///
    /// let options = InstallOptions {
    ///     root: Some(Utf8PathBuf::from("/sandbox")),
    ///     ..InstallOptions::default()
    /// };
    /// assert_eq!(options.destination(Utf8Path::new("/etc/app.ini")), "/sandbox/etc/app.ini");
    /// ```
    #[must_use]
    pub fn destination(&self, path: &Utf8Path) -> Utf8PathBuf {
        match &self.root {
            Some(root) => {
                let relative = path.strip_prefix("/").unwrap_or(path);
                root.join(relative)
            }
            None => path.to_owned(),
        }
    }

    /// The library name `library` is restored under.
    #[must_use]
    pub fn restore_name<'a>(&'a self, library: &'a str) -> &'a str {
        self.rstlib_target.as_deref().unwrap_or(library)
    }
}
