//! Platform directories used by both binaries.
//!
//! [`BaseDirs`] wraps `directories-next` behind a trait so configuration and
//! staging paths can be tested without touching the user's real directories.

use camino::Utf8PathBuf;
use directories_next::ProjectDirs;
use std::path::PathBuf;

/// Platform-specific directories for appinstall.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Directory holding `config.toml`.
    fn config_dir(&self) -> Option<PathBuf>;

    /// Directory for disposable data such as staged payloads.
    fn cache_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by the operating system's conventions.
///
/// Every directory is `None` when no home directory can be determined.
#[derive(Debug, Clone)]
pub struct SystemBaseDirs {
    project: Option<ProjectDirs>,
}

impl SystemBaseDirs {
    /// Resolve the platform directories.
    #[must_use]
    pub fn new() -> Self {
        Self {
            project: ProjectDirs::from("", "", "appinstall"),
        }
    }
}

impl Default for SystemBaseDirs {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseDirs for SystemBaseDirs {
    fn config_dir(&self) -> Option<PathBuf> {
        self.project
            .as_ref()
            .map(|project| project.config_dir().to_path_buf())
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        self.project
            .as_ref()
            .map(|project| project.cache_dir().to_path_buf())
    }
}

/// Path of the default configuration file, if the platform provides one.
#[must_use]
pub fn default_config_path(dirs: &dyn BaseDirs) -> Option<Utf8PathBuf> {
    dirs.config_dir()
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .map(|dir| dir.join("config.toml"))
}

/// Root under which packages are staged.
///
/// Uses `<cache dir>/staging`, falling back to `<temp dir>/appinstall/staging`
/// when the cache directory is unknown or not UTF-8.
#[must_use]
pub fn default_staging_root(dirs: &dyn BaseDirs) -> Utf8PathBuf {
    dirs.cache_dir()
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .map_or_else(
            || {
                Utf8PathBuf::from_path_buf(std::env::temp_dir())
                    .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
                    .join("appinstall")
                    .join("staging")
            },
            |dir| dir.join("staging"),
        )
}
