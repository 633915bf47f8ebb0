//! Accumulating components and writing the package artifact.
//!
//! [`PackageBuilder`] collects directives in the order they are given and,
//! on [`PackageBuilder::build`], exports libraries through the target
//! system, copies files and scripts, and writes the artifact.

use crate::component::{
    BuildInfo, Component, Manifest, ManifestEntry, ScriptRole, absolutize, normalize_library_name,
};
use crate::directive::{Directive, expect_value};
use crate::error::{AppInstallError, Result};
use crate::output::write_stderr_line;
use crate::package::{PackageContents, PackageFooter, PayloadFile, PayloadSource, write_package};
use crate::spec_file::{DirectiveSink, SpecParser};
use crate::target::LibrarySystem;
use crate::timestamp::GeneratedAt;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::io::Write;

/// A package written by [`PackageBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltPackage {
    /// Path of the artifact.
    pub path: Utf8PathBuf,
    /// The manifest embedded in the artifact.
    pub manifest: Manifest,
    /// The artifact footer.
    pub footer: PackageFooter,
}

/// Collects components for one package.
///
/// Relative paths given directly to the builder resolve against its base
/// directory, normally the current directory. Every operation either fully
/// succeeds or leaves the builder unchanged.
///
/// # Examples
///
/// ```
/// use appinstall::builder::PackageBuilder;
/// use camino::Utf8PathBuf;
///
/// let mut builder = PackageBuilder::new(Utf8PathBuf::from("/work"));
/// builder.add_library("mylib").expect("valid library");
/// builder.set_output_file("app.pkg").expect("valid output");
/// assert_eq!(builder.components().len(), 1);
/// assert_eq!(builder.output_file().map(|p| p.as_str()), Some("/work/app.pkg"));
/// ```
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    base_dir: Utf8PathBuf,
    output: Option<Utf8PathBuf>,
    stub: Option<Utf8PathBuf>,
    components: Vec<Component>,
    pre_install: Option<Utf8PathBuf>,
    post_install: Option<Utf8PathBuf>,
    lodrun: Option<Utf8PathBuf>,
}

impl PackageBuilder {
    /// Create an empty builder resolving relative paths against `base_dir`.
    #[must_use]
    pub fn new(base_dir: Utf8PathBuf) -> Self {
        Self {
            base_dir,
            output: None,
            stub: None,
            components: Vec::new(),
            pre_install: None,
            post_install: None,
            lodrun: None,
        }
    }

    /// Components added so far, in order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The output path, once set.
    #[must_use]
    pub fn output_file(&self) -> Option<&Utf8Path> {
        self.output.as_deref()
    }

    /// The script registered for `role`.
    #[must_use]
    pub fn script(&self, role: ScriptRole) -> Option<&Utf8Path> {
        match role {
            ScriptRole::Pre => self.pre_install.as_deref(),
            ScriptRole::Post => self.post_install.as_deref(),
        }
    }

    /// The lodrun save file, once set.
    #[must_use]
    pub fn lodrun_lib(&self) -> Option<&Utf8Path> {
        self.lodrun.as_deref()
    }

    /// Set where the artifact is written. A later call replaces the path.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::MissingArgument`] for an empty path.
    pub fn set_output_file(&mut self, path: &str) -> Result<()> {
        let path = expect_value("-o", Some(path))?;
        self.output = Some(absolutize(Utf8Path::new(&path), &self.base_dir));
        Ok(())
    }

    /// Set an installer executable to place before the payload.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::MissingArgument`] for an empty path and
    /// [`AppInstallError::PathNotFound`] when the file does not exist.
    pub fn set_installer_stub(&mut self, path: &str) -> Result<()> {
        let path = existing_path("--stub", path, &self.base_dir)?;
        self.stub = Some(path);
        Ok(())
    }

    /// Register the pre-install script.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::MissingArgument`] for an empty path,
    /// [`AppInstallError::PathNotFound`] when the script does not exist, and
    /// [`AppInstallError::DuplicateSingleton`] when one is already set.
    pub fn add_pre_install(&mut self, path: &str) -> Result<()> {
        let base = self.base_dir.clone();
        self.add_script_in(ScriptRole::Pre, path, &base)
    }

    /// Register the post-install script.
    ///
    /// # Errors
    ///
    /// As for [`PackageBuilder::add_pre_install`].
    pub fn add_post_install(&mut self, path: &str) -> Result<()> {
        let base = self.base_dir.clone();
        self.add_script_in(ScriptRole::Post, path, &base)
    }

    /// Append a library.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::MissingArgument`] for an empty name and
    /// [`AppInstallError::InvalidLibraryName`] for a malformed one.
    pub fn add_library(&mut self, name: &str) -> Result<()> {
        let name = expect_value("--qsys", Some(name))?;
        let name = normalize_library_name(&name)?;
        self.components.push(Component::Library { name });
        Ok(())
    }

    /// Append a directory without its content.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::MissingArgument`] for an empty path and
    /// [`AppInstallError::PathNotFound`] when the directory does not exist.
    pub fn add_bare_directory(&mut self, path: &str) -> Result<()> {
        let base = self.base_dir.clone();
        self.add_bare_directory_in(path, &base)
    }

    /// Append a file, or a directory with all of its content.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::MissingArgument`] for an empty path and
    /// [`AppInstallError::PathNotFound`] when the path does not exist.
    pub fn add_file(&mut self, path: &str) -> Result<()> {
        let base = self.base_dir.clone();
        self.add_file_in(path, &base)
    }

    /// Register the lodrun save file.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::MissingArgument`] for an empty path,
    /// [`AppInstallError::PathNotFound`] when the file does not exist, and
    /// [`AppInstallError::DuplicateSingleton`] when one is already set.
    pub fn set_lodrun_lib(&mut self, path: &str) -> Result<()> {
        let base = self.base_dir.clone();
        self.set_lodrun_lib_in(path, &base)
    }

    /// Apply every directive in a spec file.
    ///
    /// The file is applied as a whole: if any line, or any nested spec file,
    /// fails, the builder is left as it was.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while expanding the file.
    pub fn add_from_spec_file(&mut self, path: &str) -> Result<()> {
        let path = expect_value("--spec", Some(path))?;
        let path = absolutize(Utf8Path::new(&path), &self.base_dir);
        let mut staged = self.clone();
        SpecParser::new().expand(&path, &mut staged)?;
        *self = staged;
        Ok(())
    }

    /// Apply one directive given relative to the builder's base directory.
    ///
    /// # Errors
    ///
    /// Returns the error of the operation the directive maps to.
    pub fn apply(&mut self, directive: &Directive) -> Result<()> {
        let base = self.base_dir.clone();
        self.apply_in(directive, &base)
    }

    fn apply_in(&mut self, directive: &Directive, base: &Utf8Path) -> Result<()> {
        debug!("applying {directive}");
        let value = directive.value();
        match directive {
            Directive::PreInstall(_) => self.add_script_in(ScriptRole::Pre, value, base),
            Directive::PostInstall(_) => self.add_script_in(ScriptRole::Post, value, base),
            Directive::Library(_) => self.add_library(value),
            Directive::BareDirectory(_) => self.add_bare_directory_in(value, base),
            Directive::File(_) => self.add_file_in(value, base),
            Directive::Lodrun(_) => self.set_lodrun_lib_in(value, base),
            Directive::SpecFile(_) => {
                let path = absolutize(Utf8Path::new(value), base);
                self.add_from_spec_file(path.as_str())
            }
        }
    }

    fn add_script_in(&mut self, role: ScriptRole, path: &str, base: &Utf8Path) -> Result<()> {
        let flag = role.flag();
        let path = existing_path(flag, path, base)?;
        let slot = match role {
            ScriptRole::Pre => &mut self.pre_install,
            ScriptRole::Post => &mut self.post_install,
        };
        set_singleton(slot, flag, path)
    }

    fn add_bare_directory_in(&mut self, path: &str, base: &Utf8Path) -> Result<()> {
        let path = existing_path("--dir", path, base)?;
        self.components.push(Component::BareDirectory { path });
        Ok(())
    }

    fn add_file_in(&mut self, path: &str, base: &Utf8Path) -> Result<()> {
        let path = existing_path("--file", path, base)?;
        self.components.push(Component::File { path });
        Ok(())
    }

    fn set_lodrun_lib_in(&mut self, path: &str, base: &Utf8Path) -> Result<()> {
        let path = existing_path("--lodrun", path, base)?;
        set_singleton(&mut self.lodrun, "--lodrun", path)
    }

    /// Export libraries, copy payloads, and write the artifact.
    ///
    /// Progress lines are written to `progress`.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::OutputNotSet`] when no output path was
    /// set, [`AppInstallError::TargetSystem`] when a library cannot be
    /// saved, and [`AppInstallError::Packaging`] when the artifact cannot be
    /// written. Nothing is left at the output path on failure.
    pub fn build(&self, system: &dyn LibrarySystem, progress: &mut dyn Write) -> Result<BuiltPackage> {
        let output = self.output.as_deref().ok_or(AppInstallError::OutputNotSet)?;
        let scratch = tempfile::Builder::new()
            .prefix("appinstall-build-")
            .tempdir()?;
        let scratch_dir = Utf8Path::from_path(scratch.path()).ok_or_else(|| AppInstallError::Usage {
            message: format!("temporary directory {} is not UTF-8", scratch.path().display()),
        })?;

        let mut numbering = 0..;
        let mut next_entry = |component: Component| {
            ManifestEntry::numbered(numbering.next().unwrap_or_default(), component)
        };

        let pre = self
            .pre_install
            .clone()
            .map(|path| next_entry(Component::Script { role: ScriptRole::Pre, path }));
        let components: Vec<ManifestEntry> =
            self.components.iter().cloned().map(&mut next_entry).collect();
        let lodrun = self
            .lodrun
            .clone()
            .map(|path| next_entry(Component::LodrunLibrary { path }));
        let post = self
            .post_install
            .clone()
            .map(|path| next_entry(Component::Script { role: ScriptRole::Post, path }));

        let mut manifest = Manifest::new(BuildInfo::current(GeneratedAt::now()), components);
        if let Some(entry) = pre {
            manifest = manifest.with_script(ScriptRole::Pre, entry);
        }
        if let Some(entry) = lodrun {
            manifest = manifest.with_lodrun(entry);
        }
        if let Some(entry) = post {
            manifest = manifest.with_script(ScriptRole::Post, entry);
        }

        let mut payload = Vec::new();
        for entry in manifest.all_entries() {
            write_stderr_line(progress, format!("Adding {}", entry.component.label()));
            payload.push(payload_for(entry, system, scratch_dir)?);
        }

        let footer = write_package(
            output,
            &PackageContents {
                manifest: &manifest,
                payload: &payload,
                stub: self.stub.as_deref(),
            },
        )?;
        info!("package written to {output}");
        write_stderr_line(
            progress,
            format!("Package {output} written with {} component(s)", payload.len()),
        );
        Ok(BuiltPackage {
            path: output.to_owned(),
            manifest,
            footer,
        })
    }
}

impl DirectiveSink for PackageBuilder {
    fn apply_directive(&mut self, directive: &Directive, base_dir: &Utf8Path) -> Result<()> {
        self.apply_in(directive, base_dir)
    }
}

fn payload_for(
    entry: &ManifestEntry,
    system: &dyn LibrarySystem,
    scratch_dir: &Utf8Path,
) -> Result<PayloadFile> {
    let source = match &entry.component {
        Component::Library { name } => {
            let save_file = scratch_dir.join(format!("{name}.savf"));
            system.save_library(name, &save_file)?;
            PayloadSource::File(save_file)
        }
        Component::BareDirectory { .. } => PayloadSource::EmptyDirectory,
        Component::File { path } if path.is_dir() => PayloadSource::Tree(path.clone()),
        Component::File { path }
        | Component::Script { path, .. }
        | Component::LodrunLibrary { path } => PayloadSource::File(path.clone()),
    };
    Ok(PayloadFile {
        archive_name: entry.payload.clone(),
        source,
    })
}

fn existing_path(flag: &'static str, value: &str, base: &Utf8Path) -> Result<Utf8PathBuf> {
    let value = expect_value(flag, Some(value))?;
    let path = absolutize(Utf8Path::new(&value), base);
    if path.exists() {
        Ok(path)
    } else {
        Err(AppInstallError::PathNotFound { flag, path })
    }
}

fn set_singleton(
    slot: &mut Option<Utf8PathBuf>,
    flag: &'static str,
    path: Utf8PathBuf,
) -> Result<()> {
    if let Some(existing) = slot {
        return Err(AppInstallError::DuplicateSingleton {
            flag,
            existing: existing.clone(),
        });
    }
    *slot = Some(path);
    Ok(())
}
