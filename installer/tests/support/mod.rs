//! Test support shared by the behavioural suites.
//!
//! A [`Sandbox`] owns a temporary directory split into `src/` (build-time
//! sources), `staging/` (extraction root), and `target/` (install root), so
//! a package can be built, staged, and installed without touching real
//! system paths.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use appinstall::builder::{BuiltPackage, PackageBuilder};
use appinstall::extraction::{ExtractionTask, StagedLayout};
use appinstall::install::{InstallReport, InstallationTask};
use appinstall::options::InstallOptions;
use appinstall::package::PackageConfiguration;
use appinstall::test_utils::{RecordingScripts, RecordingSystem, ScriptedPrompter};
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// Temporary directory tree for one scenario.
pub struct Sandbox {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Sandbox {
    /// Create the sandbox with empty `src`, `staging`, and `target` trees.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("UTF-8 temp dir");
        for sub in ["src", "staging", "target"] {
            std::fs::create_dir_all(root.join(sub)).expect("create sandbox tree");
        }
        Self { _dir: dir, root }
    }

    /// Directory holding build-time sources.
    pub fn src(&self) -> Utf8PathBuf {
        self.root.join("src")
    }

    /// Root passed to [`ExtractionTask`].
    pub fn staging_root(&self) -> Utf8PathBuf {
        self.root.join("staging")
    }

    /// Prefix under which packaged paths are installed.
    pub fn install_root(&self) -> Utf8PathBuf {
        self.root.join("target")
    }

    /// Default package output path.
    pub fn package_path(&self) -> Utf8PathBuf {
        self.root.join("app.pkg")
    }

    /// Write `contents` to `src/<relative>`, creating parents.
    pub fn write_source(&self, relative: &str, contents: &str) -> Utf8PathBuf {
        let path = self.src().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, contents).expect("write source");
        path
    }

    /// Create `src/<relative>` as a directory.
    pub fn make_source_dir(&self, relative: &str) -> Utf8PathBuf {
        let path = self.src().join(relative);
        std::fs::create_dir_all(&path).expect("create source dir");
        path
    }

    /// A builder resolving relative paths against `src/`, writing to
    /// [`Sandbox::package_path`].
    pub fn builder(&self) -> PackageBuilder {
        let mut builder = PackageBuilder::new(self.src());
        builder
            .set_output_file(self.package_path().as_str())
            .expect("output path");
        builder
    }

    /// Where a packaged absolute path lands under the install root.
    pub fn installed(&self, packaged: &Utf8Path) -> Utf8PathBuf {
        self.install_options().destination(packaged)
    }

    /// Options installing under the sandbox's install root.
    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            root: Some(self.install_root()),
            ..InstallOptions::default()
        }
    }
}

/// Build `builder` through `system`, discarding progress output.
pub fn build(builder: &PackageBuilder, system: &RecordingSystem) -> BuiltPackage {
    let mut progress = Vec::new();
    builder.build(system, &mut progress).expect("package builds")
}

/// Load and stage the package at `path`.
pub fn stage(path: &Utf8Path, staging_root: Utf8PathBuf) -> StagedLayout {
    let package = PackageConfiguration::load(path).expect("package loads");
    ExtractionTask::new(&package, staging_root)
        .run()
        .expect("payload stages")
}

/// Collaborators for one installation run.
#[derive(Default)]
pub struct Target {
    /// Library operations.
    pub system: RecordingSystem,
    /// Script execution.
    pub scripts: RecordingScripts,
    /// Answers to replacement prompts.
    pub prompter: ScriptedPrompter,
}

impl Target {
    /// Install `layout` with `options`, returning the outcome and progress.
    pub fn install(
        &mut self,
        layout: &StagedLayout,
        options: &InstallOptions,
    ) -> (appinstall::error::Result<InstallReport>, String) {
        let mut progress = Vec::new();
        let result = InstallationTask::new(layout, &self.system, &self.scripts, &mut self.prompter)
            .run(options, &mut progress);
        (result, String::from_utf8(progress).expect("UTF-8 progress"))
    }
}
