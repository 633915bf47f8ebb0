//! Shared test utilities for the appinstall crate.
//!
//! The stub collaborators here stand in for the target system, the script
//! runner, and the operator. They can share an [`EventLog`] so a test can
//! assert the order in which an installation touched each of them.

use crate::component::ScriptRole;
use crate::confirm::{PromptAnswer, Prompter};
use crate::error::{AppInstallError, Result};
use crate::script::ScriptRunner;
use crate::target::{LibrarySystem, RestoreRequest, TargetFailure};
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::process::{ExitStatus, Output};
use std::rc::Rc;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// An ordered record of collaborator calls, shared between stubs.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    /// Append an event.
    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    /// Every event so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// A [`LibrarySystem`] backed by an in-memory set of libraries.
///
/// Events are recorded as `save NAME`, `exists NAME`,
/// `restore NAME as TARGET replace=BOOL`, and `lodrun PATH`.
#[derive(Debug, Default)]
pub struct RecordingSystem {
    events: EventLog,
    libraries: RefCell<BTreeSet<String>>,
    failing: BTreeSet<String>,
    failing_lodrun: bool,
    saved: RefCell<Vec<String>>,
    restores: RefCell<Vec<RestoreRequest>>,
    lodruns: RefCell<Vec<Utf8PathBuf>>,
}

impl RecordingSystem {
    /// Create a system recording into a shared event log.
    #[must_use]
    pub fn with_events(events: EventLog) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    /// Mark `libraries` as already present on the target.
    #[must_use]
    pub fn with_existing<'a>(self, libraries: impl IntoIterator<Item = &'a str>) -> Self {
        self.libraries
            .borrow_mut()
            .extend(libraries.into_iter().map(str::to_owned));
        self
    }

    /// Make every restore into `library` fail.
    #[must_use]
    pub fn failing_restore_of(mut self, library: &str) -> Self {
        self.failing.insert(library.to_owned());
        self
    }

    /// Make every lodrun request fail.
    #[must_use]
    pub fn failing_lodrun(mut self) -> Self {
        self.failing_lodrun = true;
        self
    }

    /// Libraries saved during builds.
    #[must_use]
    pub fn saved(&self) -> Vec<String> {
        self.saved.borrow().clone()
    }

    /// Restore requests that succeeded.
    #[must_use]
    pub fn restores(&self) -> Vec<RestoreRequest> {
        self.restores.borrow().clone()
    }

    /// Save files passed to lodrun.
    #[must_use]
    pub fn lodruns(&self) -> Vec<Utf8PathBuf> {
        self.lodruns.borrow().clone()
    }
}

impl LibrarySystem for RecordingSystem {
    fn save_library(&self, library: &str, destination: &Utf8Path) -> Result<()> {
        self.events.push(format!("save {library}"));
        std::fs::write(destination, format!("SAVF:{library}")).map_err(|e| {
            AppInstallError::TargetSystem {
                operation: "save",
                object: library.to_owned(),
                message: e.to_string(),
            }
        })?;
        self.saved.borrow_mut().push(library.to_owned());
        Ok(())
    }

    fn library_exists(&self, library: &str) -> Result<bool> {
        self.events.push(format!("exists {library}"));
        Ok(self.libraries.borrow().contains(library))
    }

    fn restore_library(&self, request: &RestoreRequest) -> std::result::Result<(), TargetFailure> {
        self.events.push(format!(
            "restore {} as {} replace={}",
            request.library, request.restore_to, request.replace
        ));
        if self.failing.contains(&request.restore_to) {
            return Err(TargetFailure::Failed {
                message: format!("CPF3781: restore of {} failed", request.restore_to),
            });
        }
        let exists = self.libraries.borrow().contains(&request.restore_to);
        if exists && !request.replace {
            return Err(TargetFailure::RequiresDelete {
                library: request.restore_to.clone(),
            });
        }
        self.libraries
            .borrow_mut()
            .insert(request.restore_to.clone());
        self.restores.borrow_mut().push(request.clone());
        Ok(())
    }

    fn run_lodrun(&self, save_file: &Utf8Path) -> Result<()> {
        self.events.push(format!("lodrun {save_file}"));
        if self.failing_lodrun {
            return Err(AppInstallError::TargetSystem {
                operation: "lodrun",
                object: save_file.to_string(),
                message: "CPF3782: lodrun program ended abnormally".to_owned(),
            });
        }
        self.lodruns.borrow_mut().push(save_file.to_owned());
        Ok(())
    }
}

/// A [`ScriptRunner`] that records each script instead of running it.
///
/// Events are recorded as `script ROLE PATH`.
#[derive(Debug, Default)]
pub struct RecordingScripts {
    events: EventLog,
    failing: Option<ScriptRole>,
}

impl RecordingScripts {
    /// Create a runner recording into a shared event log.
    #[must_use]
    pub fn with_events(events: EventLog) -> Self {
        Self {
            events,
            failing: None,
        }
    }

    /// Make the script for `role` fail with exit status 1.
    #[must_use]
    pub fn failing(mut self, role: ScriptRole) -> Self {
        self.failing = Some(role);
        self
    }
}

impl ScriptRunner for RecordingScripts {
    fn run_script(&self, role: ScriptRole, path: &Utf8Path) -> Result<()> {
        self.events.push(format!("script {role} {path}"));
        if self.failing == Some(role) {
            return Err(AppInstallError::Script {
                role,
                path: path.to_owned(),
                status: exit_status(1).to_string(),
                stderr: "scripted failure".to_owned(),
            });
        }
        Ok(())
    }
}

/// A [`Prompter`] replaying predefined answers.
///
/// Running out of answers is an error, so unexpected prompts fail the test.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<PromptAnswer>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    /// Create a prompter answering with `answers` in order.
    #[must_use]
    pub fn new(answers: impl IntoIterator<Item = PromptAnswer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Libraries the prompter was asked about.
    #[must_use]
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm_replace(&mut self, library: &str) -> Result<PromptAnswer> {
        self.asked.push(library.to_owned());
        self.answers.pop_front().ok_or_else(|| {
            AppInstallError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("no scripted answer for {library}"),
            ))
        })
    }
}
