//! The target system's library operations.
//!
//! Saving a library into a save file, restoring it elsewhere, and running a
//! load-and-run program are primitives of the target platform. They sit
//! behind [`LibrarySystem`]; [`CommandLibrarySystem`] implements them by
//! issuing CL commands through a command runner such as `system`.

use crate::config::TargetConfig;
use crate::error::{AppInstallError, Result};
use crate::exec::{CommandRunner, failure_message};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fmt;

/// A request to restore one library from a staged save file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Library name recorded in the package.
    pub library: String,
    /// Staged save file holding the library.
    pub save_file: Utf8PathBuf,
    /// Library name to restore into.
    pub restore_to: String,
    /// Auxiliary storage pool number override.
    pub asp: Option<String>,
    /// Auxiliary storage pool device override.
    pub asp_device: Option<String>,
    /// Whether an existing target library may be deleted first.
    pub replace: bool,
}

/// Why a restore request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetFailure {
    /// The target library exists and must be deleted before restoring.
    RequiresDelete {
        /// The existing target library.
        library: String,
    },
    /// Any other failure.
    Failed {
        /// Description reported by the target system.
        message: String,
    },
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequiresDelete { library } => {
                write!(f, "library {library} already exists and must be deleted first")
            }
            Self::Failed { message } => f.write_str(message),
        }
    }
}

/// Library primitives of the target system.
///
/// Every call blocks until the target system has finished the operation.
pub trait LibrarySystem {
    /// Save `library` into a save file written at `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::TargetSystem`] if the save fails.
    fn save_library(&self, library: &str, destination: &Utf8Path) -> Result<()>;

    /// Return whether `library` exists on the target.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::TargetSystem`] if the check itself fails.
    fn library_exists(&self, library: &str) -> Result<bool>;

    /// Restore a library as described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`TargetFailure::RequiresDelete`] when the target library
    /// exists and `request.replace` is false, and [`TargetFailure::Failed`]
    /// for every other failure.
    fn restore_library(&self, request: &RestoreRequest) -> std::result::Result<(), TargetFailure>;

    /// Restore and run the load-and-run program held in `save_file`.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::TargetSystem`] if the program fails.
    fn run_lodrun(&self, save_file: &Utf8Path) -> Result<()>;
}

/// Implements [`LibrarySystem`] with CL commands.
///
/// Save files are moved between the integrated file system and a work
/// library with `CPYTOSTMF`/`CPYFRMSTMF`.
pub struct CommandLibrarySystem<'a> {
    runner: &'a dyn CommandRunner,
    config: TargetConfig,
}

impl<'a> CommandLibrarySystem<'a> {
    /// Create a library system issuing commands through `runner`.
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner, config: TargetConfig) -> Self {
        Self { runner, config }
    }

    fn cl(&self, command: &str) -> std::result::Result<(), String> {
        debug!("CL: {command}");
        let output = self
            .runner
            .run(&self.config.cl_runner, &[command.to_owned()])
            .map_err(|e| e.to_string())?;
        if output.status.success() {
            Ok(())
        } else {
            Err(failure_message(&output))
        }
    }

    fn save_file_member(&self, name: &str) -> String {
        format!(
            "/QSYS.LIB/{}.LIB/{name}.FILE",
            self.config.work_library.to_ascii_uppercase()
        )
    }

    fn work_save_file(&self, name: &str) -> String {
        format!("{}/{name}", self.config.work_library.to_ascii_uppercase())
    }

    /// Copy a staged save file into a fresh save file in the work library.
    fn load_save_file(&self, stream_file: &Utf8Path, name: &str) -> std::result::Result<(), String> {
        let _ = self.cl(&format!("DLTF FILE({})", self.work_save_file(name)));
        self.cl(&format!("CRTSAVF FILE({})", self.work_save_file(name)))?;
        self.cl(&format!(
            "CPYFRMSTMF FROMSTMF('{stream_file}') TOMBR('{}') MBROPT(*REPLACE) CVTDTA(*NONE)",
            self.save_file_member(name)
        ))
    }
}

/// Name of the temporary save file used for `library`.
fn save_file_name(library: &str) -> String {
    let mut name = format!("AI{library}");
    name.truncate(10);
    name
}

impl LibrarySystem for CommandLibrarySystem<'_> {
    fn save_library(&self, library: &str, destination: &Utf8Path) -> Result<()> {
        let name = save_file_name(library);
        let target_error = |message| AppInstallError::TargetSystem {
            operation: "save",
            object: library.to_owned(),
            message,
        };
        let _ = self.cl(&format!("DLTF FILE({})", self.work_save_file(&name)));
        self.cl(&format!("CRTSAVF FILE({})", self.work_save_file(&name)))
            .map_err(target_error)?;
        self.cl(&format!(
            "SAVLIB LIB({library}) DEV(*SAVF) SAVF({})",
            self.work_save_file(&name)
        ))
        .map_err(target_error)?;
        self.cl(&format!(
            "CPYTOSTMF FROMMBR('{}') TOSTMF('{destination}') STMFOPT(*REPLACE) CVTDTA(*NONE)",
            self.save_file_member(&name)
        ))
        .map_err(target_error)?;
        info!("saved library {library} to {destination}");
        Ok(())
    }

    fn library_exists(&self, library: &str) -> Result<bool> {
        let command = format!("CHKOBJ OBJ(QSYS/{library}) OBJTYPE(*LIB)");
        debug!("CL: {command}");
        let output = self
            .runner
            .run(&self.config.cl_runner, &[command])
            .map_err(|e| AppInstallError::TargetSystem {
                operation: "check",
                object: library.to_owned(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            debug!("library {library} not found: {}", failure_message(&output));
        }
        Ok(output.status.success())
    }

    fn restore_library(&self, request: &RestoreRequest) -> std::result::Result<(), TargetFailure> {
        let failed = |message| TargetFailure::Failed { message };
        let exists = self.library_exists(&request.restore_to).map_err(|e| failed(e.to_string()))?;
        if exists {
            if !request.replace {
                return Err(TargetFailure::RequiresDelete {
                    library: request.restore_to.clone(),
                });
            }
            self.cl(&format!("DLTLIB LIB({})", request.restore_to))
                .map_err(failed)?;
        }

        let name = save_file_name(&request.library);
        self.load_save_file(&request.save_file, &name).map_err(failed)?;

        let mut command = format!(
            "RSTLIB SAVLIB({}) DEV(*SAVF) SAVF({}) RSTLIB({})",
            request.library,
            self.work_save_file(&name),
            request.restore_to
        );
        if let Some(asp) = &request.asp {
            command.push_str(&format!(" RSTASP({asp})"));
        }
        if let Some(device) = &request.asp_device {
            command.push_str(&format!(" RSTASPDEV({device})"));
        }
        self.cl(&command).map_err(failed)?;
        info!("restored library {} as {}", request.library, request.restore_to);
        Ok(())
    }

    fn run_lodrun(&self, save_file: &Utf8Path) -> Result<()> {
        let name = "AILODRUN";
        let target_error = |message| AppInstallError::TargetSystem {
            operation: "lodrun",
            object: save_file.to_string(),
            message,
        };
        self.load_save_file(save_file, name).map_err(target_error)?;
        self.cl(&format!("LODRUN DEV(*SAVF) SAVF({})", self.work_save_file(name)))
            .map_err(target_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockCommandRunner;
    use crate::test_utils::{failure_output, success_output};

    fn config() -> TargetConfig {
        TargetConfig {
            work_library: "qgpl".to_owned(),
            ..TargetConfig::default()
        }
    }

    fn request(replace: bool) -> RestoreRequest {
        RestoreRequest {
            library: "MYLIB".to_owned(),
            save_file: Utf8PathBuf::from("/stage/payload/0000-MYLIB.savf"),
            restore_to: "NEWLIB".to_owned(),
            asp: Some("2".to_owned()),
            asp_device: None,
            replace,
        }
    }

    fn issued(runner: &mut MockCommandRunner, commands: std::sync::Arc<std::sync::Mutex<Vec<String>>>, fail_prefix: &'static str) {
        runner.expect_run().returning(move |program, args| {
            assert_eq!(program, "system");
            let command = args.first().cloned().unwrap_or_default();
            commands.lock().expect("lock").push(command.clone());
            if command.starts_with(fail_prefix) {
                Ok(failure_output("CPF9801: object not found"))
            } else {
                Ok(success_output())
            }
        });
    }

    #[test]
    fn save_file_name_fits_object_name_limit() {
        assert_eq!(save_file_name("LONGLIBNAM"), "AILONGLIBN");
        assert_eq!(save_file_name("A"), "AIA");
    }

    #[test]
    fn restore_without_replace_reports_requires_delete_for_existing_library() {
        let commands = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut runner = MockCommandRunner::new();
        issued(&mut runner, commands.clone(), "never");
        let system = CommandLibrarySystem::new(&runner, config());

        let err = system
            .restore_library(&request(false))
            .expect_err("existing library needs delete");
        assert_eq!(
            err,
            TargetFailure::RequiresDelete {
                library: "NEWLIB".to_owned()
            }
        );
        assert_eq!(commands.lock().expect("lock").len(), 1);
    }

    #[test]
    fn restore_with_replace_deletes_then_restores_with_overrides() {
        let commands = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut runner = MockCommandRunner::new();
        issued(&mut runner, commands.clone(), "never");
        let system = CommandLibrarySystem::new(&runner, config());

        system.restore_library(&request(true)).expect("restore succeeds");

        let commands = commands.lock().expect("lock");
        assert!(commands.iter().any(|c| c == "DLTLIB LIB(NEWLIB)"));
        let rstlib = commands.last().expect("RSTLIB issued");
        assert_eq!(
            rstlib,
            "RSTLIB SAVLIB(MYLIB) DEV(*SAVF) SAVF(QGPL/AIMYLIB) RSTLIB(NEWLIB) RSTASP(2)"
        );
    }

    #[test]
    fn restore_of_new_library_skips_delete() {
        let commands = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut runner = MockCommandRunner::new();
        issued(&mut runner, commands.clone(), "CHKOBJ");
        let system = CommandLibrarySystem::new(&runner, config());

        system.restore_library(&request(false)).expect("restore succeeds");

        let commands = commands.lock().expect("lock");
        assert!(!commands.iter().any(|c| c.starts_with("DLTLIB")));
        assert!(commands.iter().any(|c| c.starts_with("CPYFRMSTMF FROMSTMF('/stage/payload/0000-MYLIB.savf')")));
    }

    #[test]
    fn library_exists_is_false_when_chkobj_fails() {
        let commands = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut runner = MockCommandRunner::new();
        issued(&mut runner, commands, "CHKOBJ");
        let system = CommandLibrarySystem::new(&runner, config());

        assert!(!system.library_exists("MYLIB").expect("check runs"));
    }

    #[test]
    fn library_exists_propagates_runner_failures() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Err(AppInstallError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "system timed out after 300 seconds",
            )))
        });
        let system = CommandLibrarySystem::new(&runner, config());

        let err = system.library_exists("MYLIB").expect_err("runner failed");
        assert!(matches!(
            err,
            AppInstallError::TargetSystem { operation: "check", .. }
        ));

        let failure = system
            .restore_library(&request(true))
            .expect_err("restore cannot tell whether the library exists");
        assert!(matches!(failure, TargetFailure::Failed { .. }));
    }

    #[test]
    fn save_library_failure_is_a_target_system_error() {
        let commands = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut runner = MockCommandRunner::new();
        issued(&mut runner, commands, "SAVLIB");
        let system = CommandLibrarySystem::new(&runner, config());

        let err = system
            .save_library("MYLIB", Utf8Path::new("/tmp/MYLIB.savf"))
            .expect_err("save fails");
        assert!(matches!(
            err,
            AppInstallError::TargetSystem { operation: "save", .. }
        ));
    }

    #[test]
    fn lodrun_issues_lodrun_against_work_save_file() {
        let commands = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut runner = MockCommandRunner::new();
        issued(&mut runner, commands.clone(), "never");
        let system = CommandLibrarySystem::new(&runner, config());

        system
            .run_lodrun(Utf8Path::new("/stage/payload/0004-tool.savf"))
            .expect("lodrun succeeds");
        let commands = commands.lock().expect("lock");
        assert_eq!(
            commands.last().map(String::as_str),
            Some("LODRUN DEV(*SAVF) SAVF(QGPL/AILODRUN)")
        );
    }
}
