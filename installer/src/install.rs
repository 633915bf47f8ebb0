//! Applying a staged package to the target system.
//!
//! The installation runs a fixed pipeline:
//!
//! 1. pre-install script
//! 2. library restores, in manifest order, under the confirmation policy
//! 3. bare directories and files, in manifest order
//! 4. the lodrun library, when enabled
//! 5. post-install script
//!
//! Steps without components are no-ops. The first failing step stops the
//! run; whatever earlier steps changed on the target stays changed.

use crate::component::{Component, ScriptRole};
use crate::confirm::{ConfirmPolicy, PromptAnswer, Prompter};
use crate::error::{AppInstallError, Result};
use crate::extraction::{StagedEntry, StagedLayout};
use crate::options::InstallOptions;
use crate::output::write_stderr_line;
use crate::script::ScriptRunner;
use crate::target::{LibrarySystem, RestoreRequest, TargetFailure};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::io::Write;
use walkdir::WalkDir;

/// A step of the installation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallPhase {
    /// Running the pre-install script.
    PreInstall,
    /// Restoring libraries.
    RestoringLibraries,
    /// Creating directories and copying files.
    MaterializingFiles,
    /// Running the lodrun library.
    RunningLodrun,
    /// Running the post-install script.
    PostInstall,
}

impl InstallPhase {
    /// Every step, in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::PreInstall,
        Self::RestoringLibraries,
        Self::MaterializingFiles,
        Self::RunningLodrun,
        Self::PostInstall,
    ];
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreInstall => "pre-install",
            Self::RestoringLibraries => "library restore",
            Self::MaterializingFiles => "file materialization",
            Self::RunningLodrun => "lodrun",
            Self::PostInstall => "post-install",
        };
        f.write_str(name)
    }
}

/// Where an installation run stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    /// [`InstallationTask::run`] has not been called.
    NotStarted,
    /// The given step is executing.
    Running(InstallPhase),
    /// Every step finished.
    Complete,
    /// A step failed.
    Failed {
        /// The step that failed.
        step: InstallPhase,
        /// The failure, rendered for display.
        message: String,
    },
}

/// Why a library was not restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The operator declined to replace the existing library.
    Declined,
    /// Restoring would have required deleting the existing library.
    RequiresDelete,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declined => f.write_str("replacement declined"),
            Self::RequiresDelete => f.write_str("existing library would have to be deleted"),
        }
    }
}

/// A library left untouched by the installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLibrary {
    /// Library name in the package.
    pub library: String,
    /// Name it would have been restored under.
    pub restore_to: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// What an installation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Libraries restored, by target name.
    pub restored: Vec<String>,
    /// Libraries skipped under the confirmation policy.
    pub skipped: Vec<SkippedLibrary>,
    /// Directories and files created or overwritten.
    pub materialized: Vec<Utf8PathBuf>,
    /// Whether the lodrun library was run.
    pub lodrun_ran: bool,
    /// Scripts that ran successfully.
    pub scripts_ran: Vec<ScriptRole>,
}

impl InstallReport {
    /// Whether any library was skipped.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Applies one staged package.
pub struct InstallationTask<'a> {
    layout: &'a StagedLayout,
    system: &'a dyn LibrarySystem,
    scripts: &'a dyn ScriptRunner,
    prompter: &'a mut dyn Prompter,
    state: InstallState,
}

impl<'a> InstallationTask<'a> {
    /// Create a task applying `layout` through the given collaborators.
    pub fn new(
        layout: &'a StagedLayout,
        system: &'a dyn LibrarySystem,
        scripts: &'a dyn ScriptRunner,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            layout,
            system,
            scripts,
            prompter,
            state: InstallState::NotStarted,
        }
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &InstallState {
        &self.state
    }

    /// Run the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::StepFailed`] naming the failed step and
    /// wrapping its cause.
    pub fn run(&mut self, options: &InstallOptions, progress: &mut dyn Write) -> Result<InstallReport> {
        let mut report = InstallReport::default();
        for phase in InstallPhase::ALL {
            self.state = InstallState::Running(phase);
            debug!("install step: {phase}");
            let outcome = match phase {
                InstallPhase::PreInstall => self.run_script(ScriptRole::Pre, &mut report, progress),
                InstallPhase::RestoringLibraries => {
                    self.restore_libraries(options, &mut report, progress)
                }
                InstallPhase::MaterializingFiles => {
                    self.materialize(options, &mut report, progress)
                }
                InstallPhase::RunningLodrun => self.run_lodrun(options, &mut report, progress),
                InstallPhase::PostInstall => self.run_script(ScriptRole::Post, &mut report, progress),
            };
            if let Err(source) = outcome {
                self.state = InstallState::Failed {
                    step: phase,
                    message: source.to_string(),
                };
                return Err(AppInstallError::StepFailed {
                    step: phase,
                    source: Box::new(source),
                });
            }
        }
        self.state = InstallState::Complete;
        info!(
            "installation complete: {} restored, {} skipped, {} paths materialized",
            report.restored.len(),
            report.skipped.len(),
            report.materialized.len()
        );
        Ok(report)
    }

    fn run_script(
        &self,
        role: ScriptRole,
        report: &mut InstallReport,
        progress: &mut dyn Write,
    ) -> Result<()> {
        let Some(staged) = self.layout.script(role) else {
            return Ok(());
        };
        write_stderr_line(progress, format!("Running {role} script"));
        self.scripts.run_script(role, &staged.staged)?;
        report.scripts_ran.push(role);
        Ok(())
    }

    fn restore_libraries(
        &mut self,
        options: &InstallOptions,
        report: &mut InstallReport,
        progress: &mut dyn Write,
    ) -> Result<()> {
        let layout = self.layout;
        let mut policy = options.confirm;
        for staged in layout.components() {
            let Component::Library { name } = &staged.entry.component else {
                continue;
            };
            let restore_to = options.restore_name(name).to_owned();
            let replace = match policy {
                ConfirmPolicy::YesToAll => true,
                ConfirmPolicy::ContinueIfNotDelete => false,
                ConfirmPolicy::PromptEach => {
                    if !self.system.library_exists(&restore_to)? {
                        false
                    } else {
                        match self.prompter.confirm_replace(&restore_to)? {
                            PromptAnswer::Yes => true,
                            PromptAnswer::All => {
                                policy = ConfirmPolicy::YesToAll;
                                true
                            }
                            PromptAnswer::No => {
                                skip(report, progress, name, restore_to, SkipReason::Declined);
                                continue;
                            }
                        }
                    }
                }
            };

            let request = restore_request(staged, name, &restore_to, options, replace);
            write_stderr_line(progress, format!("Restoring library {name} as {restore_to}"));
            match self.system.restore_library(&request) {
                Ok(()) => report.restored.push(restore_to),
                Err(TargetFailure::RequiresDelete { .. })
                    if policy == ConfirmPolicy::ContinueIfNotDelete =>
                {
                    skip(report, progress, name, restore_to, SkipReason::RequiresDelete);
                }
                Err(failure) => {
                    return Err(AppInstallError::TargetSystem {
                        operation: "restore",
                        object: name.clone(),
                        message: failure.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn materialize(
        &self,
        options: &InstallOptions,
        report: &mut InstallReport,
        progress: &mut dyn Write,
    ) -> Result<()> {
        for staged in self.layout.components() {
            match &staged.entry.component {
                Component::BareDirectory { path } => {
                    let dest = options.destination(path);
                    write_stderr_line(progress, format!("Creating directory {dest}"));
                    fs::create_dir_all(&dest).map_err(AppInstallError::materialize_at(&dest))?;
                    report.materialized.push(dest);
                }
                Component::File { path } => {
                    let dest = options.destination(path);
                    write_stderr_line(progress, format!("Installing {dest}"));
                    if staged.staged.is_dir() {
                        copy_tree(&staged.staged, &dest)?;
                    } else {
                        copy_file(&staged.staged, &dest)?;
                    }
                    report.materialized.push(dest);
                }
                Component::Library { .. }
                | Component::Script { .. }
                | Component::LodrunLibrary { .. } => {}
            }
        }
        Ok(())
    }

    fn run_lodrun(
        &self,
        options: &InstallOptions,
        report: &mut InstallReport,
        progress: &mut dyn Write,
    ) -> Result<()> {
        let Some(staged) = self.layout.lodrun() else {
            return Ok(());
        };
        if !options.run_lodrun {
            info!("package contains a lodrun library; not running it without --lodrun");
            write_stderr_line(progress, "Skipping lodrun library (use -l to run it)");
            return Ok(());
        }
        write_stderr_line(progress, "Running lodrun library");
        self.system.run_lodrun(&staged.staged)?;
        report.lodrun_ran = true;
        Ok(())
    }
}

fn restore_request(
    staged: &StagedEntry,
    library: &str,
    restore_to: &str,
    options: &InstallOptions,
    replace: bool,
) -> RestoreRequest {
    RestoreRequest {
        library: library.to_owned(),
        save_file: staged.staged.clone(),
        restore_to: restore_to.to_owned(),
        asp: options.rstasp_target.clone(),
        asp_device: options.rstaspdev_target.clone(),
        replace,
    }
}

fn skip(
    report: &mut InstallReport,
    progress: &mut dyn Write,
    library: &str,
    restore_to: String,
    reason: SkipReason,
) {
    warn!("skipping library {library}: {reason}");
    write_stderr_line(progress, format!("Skipping library {library}: {reason}"));
    report.skipped.push(SkippedLibrary {
        library: library.to_owned(),
        restore_to,
        reason,
    });
}

fn copy_file(src: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(AppInstallError::materialize_at(parent))?;
    }
    fs::copy(src, dest).map_err(AppInstallError::materialize_at(dest))?;
    Ok(())
}

/// Copy the content of `src` into `dest`, overwriting existing files.
fn copy_tree(src: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| AppInstallError::materialize_at(src)(e.into()))?;
        let path = Utf8Path::from_path(entry.path()).ok_or_else(|| AppInstallError::Usage {
            message: format!("{} is not a UTF-8 path", entry.path().display()),
        })?;
        let relative = path.strip_prefix(src).unwrap_or(path);
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(AppInstallError::materialize_at(&target))?;
        } else {
            copy_file(path, &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_run_in_pipeline_order() {
        assert_eq!(
            InstallPhase::ALL.map(|phase| phase.to_string()),
            [
                "pre-install",
                "library restore",
                "file materialization",
                "lodrun",
                "post-install",
            ]
        );
    }

    #[test]
    fn report_is_partial_when_a_library_was_skipped() {
        let mut report = InstallReport::default();
        assert!(!report.is_partial());
        report.skipped.push(SkippedLibrary {
            library: "MYLIB".to_owned(),
            restore_to: "MYLIB".to_owned(),
            reason: SkipReason::RequiresDelete,
        });
        assert!(report.is_partial());
    }

    #[test]
    fn copy_tree_copies_nested_content() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("UTF-8");
        fs::create_dir_all(root.join("src/nested")).expect("mkdir");
        fs::write(root.join("src/nested/a.txt"), "a").expect("write");
        fs::create_dir_all(root.join("dest")).expect("mkdir dest");
        fs::write(root.join("dest/old.txt"), "keep").expect("write old");

        copy_tree(&root.join("src"), &root.join("dest")).expect("copy succeeds");

        assert_eq!(
            fs::read_to_string(root.join("dest/nested/a.txt")).expect("read"),
            "a"
        );
        assert!(root.join("dest/old.txt").exists());
    }

    #[test]
    fn copy_file_onto_a_file_parent_is_a_materialize_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("UTF-8");
        fs::write(root.join("a.txt"), "a").expect("write source");
        fs::write(root.join("blocker"), "not a directory").expect("write blocker");

        let err = copy_file(&root.join("a.txt"), &root.join("blocker/a.txt"))
            .expect_err("parent is a file");

        assert!(
            matches!(&err, AppInstallError::Materialize { path, .. } if path == &root.join("blocker")),
            "unexpected error: {err:?}"
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::TargetSystem);
    }
}
