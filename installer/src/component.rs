//! Installable components and the package manifest.
//!
//! A [`Manifest`] is the frozen, serialized description of everything bundled
//! in a package. Component order is significant: it is the order in which the
//! installer applies libraries, directories, and files.

use crate::error::{AppInstallError, Result};
use crate::timestamp::GeneratedAt;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Manifest schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Longest accepted library name.
const MAX_LIBRARY_NAME_LEN: usize = 10;

/// When a script runs relative to the rest of the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptRole {
    /// Runs before anything touches the target system.
    Pre,
    /// Runs after every other step has completed.
    Post,
}

impl ScriptRole {
    /// The directive flag that declares a script with this role.
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Pre => "--pre",
            Self::Post => "--post",
        }
    }
}

impl fmt::Display for ScriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => f.write_str("pre-install"),
            Self::Post => f.write_str("post-install"),
        }
    }
}

/// A single installable unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    /// A named library in the target system's library namespace.
    Library {
        /// Upper-cased library name.
        name: String,
    },
    /// A directory whose identity, but not content, is installed.
    BareDirectory {
        /// Absolute directory path.
        path: Utf8PathBuf,
    },
    /// A file, or a directory with all of its content.
    File {
        /// Absolute path of the file or directory.
        path: Utf8PathBuf,
    },
    /// A script run at a fixed point of the installation.
    Script {
        /// When the script runs.
        role: ScriptRole,
        /// Absolute path of the script at build time.
        path: Utf8PathBuf,
    },
    /// A save file holding a library with a load-and-run entry point.
    LodrunLibrary {
        /// Absolute path of the save file at build time.
        path: Utf8PathBuf,
    },
}

impl Component {
    /// Short human-readable label, used in progress output.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Library { name } => format!("library {name}"),
            Self::BareDirectory { path } => format!("directory {path}"),
            Self::File { path } => format!("file {path}"),
            Self::Script { role, path } => format!("{role} script {path}"),
            Self::LodrunLibrary { path } => format!("lodrun library {path}"),
        }
    }

    /// The base name used when naming this component's payload entry.
    fn payload_stem(&self) -> String {
        match self {
            Self::Library { name } => format!("{name}.savf"),
            Self::BareDirectory { path }
            | Self::File { path }
            | Self::Script { path, .. }
            | Self::LodrunLibrary { path } => path
                .file_name()
                .map_or_else(|| "root".to_owned(), str::to_owned),
        }
    }
}

/// A component together with the name of its payload inside the package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The component being installed.
    pub component: Component,
    /// Relative payload path, for example `payload/0001-f.txt`.
    pub payload: String,
}

impl ManifestEntry {
    /// Create an entry whose payload name is derived from its position.
    #[must_use]
    pub fn numbered(index: usize, component: Component) -> Self {
        let payload = format!("payload/{index:04}-{}", component.payload_stem());
        Self { component, payload }
    }
}

/// Build provenance recorded in every manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Manifest schema version.
    pub schema_version: u32,
    /// Version of the tool that built the package.
    pub tool_version: String,
    /// When the package was built.
    pub generated_at: GeneratedAt,
}

impl BuildInfo {
    /// Build information for a package generated now by this build.
    #[must_use]
    pub fn current(generated_at: GeneratedAt) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_owned(),
            generated_at,
        }
    }
}

/// The ordered description of a package.
///
/// # Examples
///
/// ```
/// use appinstall::component::{BuildInfo, Component, Manifest, ManifestEntry};
/// use appinstall::timestamp::GeneratedAt;
///
/// let entries = vec![ManifestEntry::numbered(
///     0,
///     Component::Library { name: "MYLIB".to_owned() },
/// )];
/// let manifest = Manifest::new(
///     BuildInfo::current(GeneratedAt::new("2026-02-03T00:00:00Z")),
///     entries,
/// );
/// assert_eq!(manifest.libraries().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    build: BuildInfo,
    components: Vec<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pre_install: Option<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_install: Option<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lodrun: Option<ManifestEntry>,
}

impl Manifest {
    /// Create a manifest with ordered components and no scripts.
    #[must_use]
    pub fn new(build: BuildInfo, components: Vec<ManifestEntry>) -> Self {
        Self {
            build,
            components,
            pre_install: None,
            post_install: None,
            lodrun: None,
        }
    }

    /// Attach the script for `role`.
    #[must_use]
    pub fn with_script(mut self, role: ScriptRole, entry: ManifestEntry) -> Self {
        match role {
            ScriptRole::Pre => self.pre_install = Some(entry),
            ScriptRole::Post => self.post_install = Some(entry),
        }
        self
    }

    /// Attach the lodrun library.
    #[must_use]
    pub fn with_lodrun(mut self, entry: ManifestEntry) -> Self {
        self.lodrun = Some(entry);
        self
    }

    /// Build provenance.
    #[must_use]
    pub fn build(&self) -> &BuildInfo {
        &self.build
    }

    /// Ordered library, directory, and file entries.
    #[must_use]
    pub fn components(&self) -> &[ManifestEntry] {
        &self.components
    }

    /// The script entry for `role`, if any.
    #[must_use]
    pub fn script(&self, role: ScriptRole) -> Option<&ManifestEntry> {
        match role {
            ScriptRole::Pre => self.pre_install.as_ref(),
            ScriptRole::Post => self.post_install.as_ref(),
        }
    }

    /// The lodrun library entry, if any.
    #[must_use]
    pub fn lodrun(&self) -> Option<&ManifestEntry> {
        self.lodrun.as_ref()
    }

    /// Library entries in manifest order.
    pub fn libraries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.components
            .iter()
            .filter(|entry| matches!(entry.component, Component::Library { .. }))
    }

    /// Every entry: pre script, components in order, lodrun, post script.
    pub fn all_entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.pre_install
            .iter()
            .chain(self.components.iter())
            .chain(self.lodrun.iter())
            .chain(self.post_install.iter())
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::CorruptPackage`] if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| AppInstallError::CorruptPackage {
            reason: format!("manifest serialization failed: {e}"),
        })
    }

    /// Parse a manifest and check its schema version.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::CorruptPackage`] if the JSON is malformed
    /// or was written by a newer schema.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let manifest: Self =
            serde_json::from_slice(data).map_err(|e| AppInstallError::CorruptPackage {
                reason: format!("manifest is unreadable: {e}"),
            })?;
        if manifest.build.schema_version > SCHEMA_VERSION {
            return Err(AppInstallError::CorruptPackage {
                reason: format!(
                    "unsupported manifest schema version {}; current maximum is {SCHEMA_VERSION}",
                    manifest.build.schema_version
                ),
            });
        }
        Ok(manifest)
    }
}

/// Validate and normalize a library name.
///
/// Names are upper-cased, must be 1 to 10 characters long, start with a
/// letter or one of `#`, `@`, `$`, and contain only letters, digits, `_`,
/// `#`, `@`, and `$`.
///
/// # Errors
///
/// Returns [`AppInstallError::InvalidLibraryName`] describing the violated
/// rule.
///
/// # Examples
///
/// ```
/// use appinstall::component::normalize_library_name;
///
/// assert_eq!(normalize_library_name("mylib").expect("valid"), "MYLIB");
/// assert!(normalize_library_name("1LIB").is_err());
/// ```
pub fn normalize_library_name(name: &str) -> Result<String> {
    let upper = name.trim().to_ascii_uppercase();
    let invalid = |reason| AppInstallError::InvalidLibraryName {
        name: name.to_owned(),
        reason,
    };
    let Some(first) = upper.chars().next() else {
        return Err(invalid("name is empty"));
    };
    if upper.len() > MAX_LIBRARY_NAME_LEN {
        return Err(invalid("name is longer than 10 characters"));
    }
    if first.is_ascii_digit() || first == '_' {
        return Err(invalid("name must start with a letter, #, @ or $"));
    }
    if !upper
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '@' | '$'))
    {
        return Err(invalid("name contains characters other than A-Z, 0-9, _, #, @, $"));
    }
    Ok(upper)
}

/// Make `path` absolute against `base` when it is relative.
#[must_use]
pub fn absolutize(path: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        base.join(path)
    }
}
