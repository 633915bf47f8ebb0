//! Reading a package back: footer, digest, and manifest.

use super::format::{MARKER_PATH, PackageFooter, to_hex};
use crate::component::Manifest;
use crate::error::{AppInstallError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

/// A verified package and its manifest.
#[derive(Debug, Clone)]
pub struct PackageConfiguration {
    path: Utf8PathBuf,
    footer: PackageFooter,
    manifest: Manifest,
}

impl PackageConfiguration {
    /// Open the artifact at `path`, verify its payload, and read its
    /// manifest.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::NotAPackage`] when the file has no footer,
    /// and [`AppInstallError::CorruptPackage`] when the payload digest does
    /// not match, the manifest is missing or unreadable, or its schema is
    /// unsupported.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let footer = PackageFooter::read_from(&mut file, path)?;

        file.seek(SeekFrom::Start(footer.payload_offset))?;
        let mut hasher = Sha256::new();
        io::copy(&mut (&mut file).take(footer.payload_size), &mut hasher)?;
        let actual = to_hex(&hasher.finalize());
        if actual != footer.digest_hex() {
            return Err(AppInstallError::CorruptPackage {
                reason: format!(
                    "payload digest mismatch: expected {}, found {actual}",
                    footer.digest_hex()
                ),
            });
        }

        let manifest = read_manifest(open_payload(path, &footer)?)?;
        debug!(
            "loaded package {path} built {} by appinstall {}",
            manifest.build().generated_at,
            manifest.build().tool_version
        );
        Ok(Self {
            path: path.to_owned(),
            footer,
            manifest,
        })
    }

    /// Path of the artifact.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The artifact footer.
    #[must_use]
    pub const fn footer(&self) -> &PackageFooter {
        &self.footer
    }

    /// The package manifest.
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Open the payload as a tar archive stream.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the artifact cannot be reopened.
    pub fn open_payload(&self) -> Result<tar::Archive<impl Read>> {
        open_payload(&self.path, &self.footer)
    }
}

fn open_payload(path: &Utf8Path, footer: &PackageFooter) -> Result<tar::Archive<impl Read>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(footer.payload_offset))?;
    let decoder = zstd::Decoder::new(file.take(footer.payload_size))?;
    Ok(tar::Archive::new(decoder))
}

fn read_manifest(mut archive: tar::Archive<impl Read>) -> Result<Manifest> {
    let corrupt = |e: io::Error| AppInstallError::CorruptPackage {
        reason: format!("payload is unreadable: {e}"),
    };
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        if entry.path().map_err(corrupt)?.as_os_str() == MARKER_PATH {
            let mut json = Vec::new();
            entry.read_to_end(&mut json).map_err(corrupt)?;
            return Manifest::from_json(&json);
        }
    }
    Err(AppInstallError::CorruptPackage {
        reason: format!("{MARKER_PATH} is missing from the payload"),
    })
}
