//! Tool configuration loaded from `config.toml`.
//!
//! ```toml
//! [target]
//! runner = "system"
//! work_library = "QGPL"
//! shell = "sh"
//! timeout_secs = 3600
//!
//! [staging]
//! root = "/tmp/appinstall"
//! ```
//!
//! Every key is optional. When no file is given and the default file does
//! not exist, [`AppInstallConfig::default`] is used.

use crate::dirs::{BaseDirs, default_config_path};
use crate::error::{AppInstallError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppInstallConfig {
    /// How the target system is driven.
    pub target: TargetConfig,
    /// Where packages are staged.
    pub staging: StagingConfig,
}

/// Settings for talking to the target system.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Program that runs one CL command per invocation.
    #[serde(rename = "runner")]
    pub cl_runner: String,
    /// Library holding temporary save files.
    pub work_library: String,
    /// Shell used to run install scripts.
    pub shell: String,
    /// Upper bound for a single command, in seconds.
    pub timeout_secs: u64,
}

impl TargetConfig {
    /// The per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            cl_runner: "system".to_owned(),
            work_library: "QGPL".to_owned(),
            shell: "sh".to_owned(),
            timeout_secs: 3_600,
        }
    }
}

/// Staging settings.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StagingConfig {
    /// Root directory for staged payloads.
    pub root: Option<Utf8PathBuf>,
}

impl AppInstallConfig {
    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, the platform default
    /// `<config dir>/config.toml` is read when present.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::Config`] if the file cannot be read or
    /// parsed.
    pub fn load(path: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_owned(), true),
            None => match default_config_path(dirs) {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };
        if !required && !path.exists() {
            debug!("no configuration at {path}; using defaults");
            return Ok(Self::default());
        }
        let source = std::fs::read_to_string(&path).map_err(|e| AppInstallError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!("loading configuration from {path}");
        Self::from_toml(&path, &source)
    }

    /// Parse configuration text read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::Config`] if the text is not valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use appinstall::config::AppInstallConfig;
    /// use camino::Utf8Path;
    ///
    /// let config = AppInstallConfig::from_toml(
    ///     Utf8Path::new("config.toml"),
    ///     "[target]\nwork_library = \"APPWRK\"\n",
    /// )
    /// .expect("valid configuration");
    /// assert_eq!(config.target.work_library, "APPWRK");
    /// assert_eq!(config.target.shell, "sh");
    /// ```
    pub fn from_toml(path: &Utf8Path, source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| AppInstallError::Config {
            path: path.to_owned(),
            reason: e.message().to_owned(),
        })
    }
}
