//! Unpacking a package payload into a staging directory.
//!
//! Each package stages into `<staging root>/<payload id>`, where the id is a
//! prefix of the payload digest. The directory is cleared before every run,
//! so extracting the same package twice yields the same tree. An exclusive
//! lock on `<payload id>.lock` keeps two installs of one package apart.
//! Dropping the [`StagedLayout`] removes both the directory and the lock file.

use crate::component::{Manifest, ManifestEntry, ScriptRole};
use crate::error::{AppInstallError, Result};
use crate::package::PackageConfiguration;
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::path::{Component as PathComponent, Path};

/// A manifest entry and where its payload was staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    /// The manifest entry.
    pub entry: ManifestEntry,
    /// Location of the extracted payload.
    pub staged: Utf8PathBuf,
}

/// The result of an extraction: every manifest entry mapped to its staged
/// payload.
///
/// Holds the staging lock until dropped; dropping it also deletes the
/// staging directory.
#[derive(Debug)]
pub struct StagedLayout {
    root: Utf8PathBuf,
    manifest: Manifest,
    entries: Vec<StagedEntry>,
    _lock: StagingLock,
}

/// An exclusively locked `<payload id>.lock` file.
#[derive(Debug)]
struct StagingLock {
    path: Utf8PathBuf,
    _file: File,
}

impl Drop for StagingLock {
    fn drop(&mut self) {
        // Unlinked while still held; the lock itself goes with the handle.
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("failed to remove staging lock {}: {err}", self.path);
        }
    }
}

impl Drop for StagedLayout {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => debug!("removed staging directory {}", self.root),
            Err(err) => warn!("failed to remove staging directory {}: {err}", self.root),
        }
    }
}

impl StagedLayout {
    /// The staging directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The manifest the layout was built from.
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Every staged entry: pre script, components, lodrun, post script.
    #[must_use]
    pub fn entries(&self) -> &[StagedEntry] {
        &self.entries
    }

    /// Staged library, directory, and file entries in manifest order.
    pub fn components(&self) -> impl Iterator<Item = &StagedEntry> {
        self.manifest
            .components()
            .iter()
            .filter_map(|entry| self.find(entry))
    }

    /// The staged script for `role`, if the package has one.
    #[must_use]
    pub fn script(&self, role: ScriptRole) -> Option<&StagedEntry> {
        self.manifest.script(role).and_then(|entry| self.find(entry))
    }

    /// The staged lodrun save file, if the package has one.
    #[must_use]
    pub fn lodrun(&self) -> Option<&StagedEntry> {
        self.manifest.lodrun().and_then(|entry| self.find(entry))
    }

    fn find(&self, entry: &ManifestEntry) -> Option<&StagedEntry> {
        self.entries
            .iter()
            .find(|staged| staged.entry.payload == entry.payload)
    }
}

/// Extracts one package into its staging directory.
#[derive(Debug)]
pub struct ExtractionTask<'a> {
    package: &'a PackageConfiguration,
    staging_root: Utf8PathBuf,
}

impl<'a> ExtractionTask<'a> {
    /// Create a task staging `package` under `staging_root`.
    #[must_use]
    pub fn new(package: &'a PackageConfiguration, staging_root: Utf8PathBuf) -> Self {
        Self {
            package,
            staging_root,
        }
    }

    /// The directory this task stages into.
    #[must_use]
    pub fn staging_dir(&self) -> Utf8PathBuf {
        self.staging_root.join(self.package.footer().short_id())
    }

    /// Extract the payload, replacing any earlier staging of the package.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::StagingLocked`] when another install holds
    /// the staging directory, [`AppInstallError::PathTraversal`] for entries
    /// escaping it, [`AppInstallError::CorruptPackage`] when a manifest entry
    /// has no payload, and [`AppInstallError::Extraction`] for I/O failures.
    pub fn run(&self) -> Result<StagedLayout> {
        let dir = self.staging_dir();
        fs::create_dir_all(&self.staging_root)
            .map_err(AppInstallError::extraction_at(&self.staging_root))?;
        let lock = lock_staging(&self.staging_root, &dir)?;

        if dir.exists() {
            debug!("clearing previous staging at {dir}");
            fs::remove_dir_all(&dir).map_err(AppInstallError::extraction_at(&dir))?;
        }
        fs::create_dir_all(&dir).map_err(AppInstallError::extraction_at(&dir))?;

        let count = self.unpack_into(&dir)?;
        info!("extracted {count} payload entries into {dir}");

        let manifest = self.package.manifest().clone();
        let entries = manifest
            .all_entries()
            .map(|entry| stage_entry(&dir, entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(StagedLayout {
            root: dir,
            manifest,
            entries,
            _lock: lock,
        })
    }

    fn unpack_into(&self, dir: &Utf8Path) -> Result<usize> {
        let mut archive = self.package.open_payload()?;
        let mut count = 0;
        let entries = archive
            .entries()
            .map_err(AppInstallError::extraction_at(dir))?;
        for entry in entries {
            let mut entry = entry.map_err(AppInstallError::extraction_at(dir))?;
            let entry_path = entry
                .path()
                .map_err(AppInstallError::extraction_at(dir))?
                .into_owned();
            validate_entry_path(&entry_path)?;

            let dest = dir.as_std_path().join(&entry_path);
            let dest_display = dir.join(entry_path.to_string_lossy().as_ref());
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .map_err(AppInstallError::extraction_at(&dest_display))?;
            }
            entry
                .unpack(&dest)
                .map_err(AppInstallError::extraction_at(&dest_display))?;
            count += 1;
        }
        Ok(count)
    }
}

fn lock_staging(staging_root: &Utf8Path, dir: &Utf8Path) -> Result<StagingLock> {
    let lock_path = Utf8PathBuf::from(format!("{dir}.lock"));
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(AppInstallError::extraction_at(&lock_path))?;
    lock.try_lock_exclusive()
        .map_err(|_| AppInstallError::StagingLocked {
            path: dir.to_owned(),
        })?;
    debug!("locked staging directory {dir} under {staging_root}");
    Ok(StagingLock {
        path: lock_path,
        _file: lock,
    })
}

fn stage_entry(dir: &Utf8Path, entry: &ManifestEntry) -> Result<StagedEntry> {
    validate_entry_path(Path::new(&entry.payload))?;
    let staged = dir.join(&entry.payload);
    if !staged.exists() {
        return Err(AppInstallError::CorruptPackage {
            reason: format!("payload {} is missing for {}", entry.payload, entry.component.label()),
        });
    }
    Ok(StagedEntry {
        entry: entry.clone(),
        staged,
    })
}

/// Reject absolute entry paths and any `..` component.
fn validate_entry_path(path: &Path) -> Result<()> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, PathComponent::ParentDir | PathComponent::Prefix(_)));
    if escapes {
        return Err(AppInstallError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("payload/../../escape.txt")]
    #[case::absolute("/etc/passwd")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let result = validate_entry_path(&PathBuf::from(bad_path));
        assert!(
            matches!(result, Err(AppInstallError::PathTraversal { .. })),
            "expected PathTraversal for {bad_path}"
        );
    }

    #[test]
    fn accepts_payload_paths() {
        assert!(validate_entry_path(Path::new("payload/0001-f.txt")).is_ok());
        assert!(validate_entry_path(Path::new("APPINSTALL-INF/manifest.json")).is_ok());
    }

    #[test]
    fn second_lock_on_same_directory_fails() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("UTF-8");
        let dir = root.join("0123456789abcdef");

        let _held = lock_staging(&root, &dir).expect("first lock");
        let err = lock_staging(&root, &dir).expect_err("second lock must fail");
        assert!(matches!(err, AppInstallError::StagingLocked { .. }));
    }

    #[test]
    fn released_lock_removes_its_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("UTF-8");
        let dir = root.join("0123456789abcdef");

        let held = lock_staging(&root, &dir).expect("lock");
        assert!(root.join("0123456789abcdef.lock").exists());
        drop(held);

        assert!(!root.join("0123456789abcdef.lock").exists());
        lock_staging(&root, &dir).expect("lock again after release");
    }
}
