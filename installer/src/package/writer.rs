//! Writing package artifacts.
//!
//! The payload is streamed through zstd into a temporary file next to the
//! output, hashed on the way, and followed by the footer. The temporary file
//! is renamed into place only once everything has been written.

use super::format::{FORMAT_VERSION, MARKER_PATH, PackageFooter};
use crate::component::Manifest;
use crate::error::{AppInstallError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};

/// What is archived for one payload entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// A regular file.
    File(Utf8PathBuf),
    /// A directory with its full content.
    Tree(Utf8PathBuf),
    /// An empty directory.
    EmptyDirectory,
}

/// One payload entry and where its bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    /// Path inside the payload archive.
    pub archive_name: String,
    /// Source of the entry's content.
    pub source: PayloadSource,
}

/// Everything written into one artifact.
#[derive(Debug)]
pub struct PackageContents<'a> {
    /// The manifest stored at the marker path.
    pub manifest: &'a Manifest,
    /// Payload entries in manifest order.
    pub payload: &'a [PayloadFile],
    /// Installer executable placed before the payload.
    pub stub: Option<&'a Utf8Path>,
}

/// Counts and hashes bytes on their way to the inner writer.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        let chunk = buf.get(..n).unwrap_or_default();
        self.hasher.update(chunk);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Write an artifact at `output`.
///
/// # Errors
///
/// Returns [`AppInstallError::Packaging`] if any source cannot be read or the
/// artifact cannot be written. No file is left at `output` on failure.
pub fn write_package(output: &Utf8Path, contents: &PackageContents<'_>) -> Result<PackageFooter> {
    let packaging = || AppInstallError::packaging_at(output);
    let dir = output
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".appinstall-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(packaging())?;

    let payload_offset = match contents.stub {
        Some(stub) => {
            let mut stub_file = File::open(stub).map_err(AppInstallError::packaging_at(stub))?;
            io::copy(&mut stub_file, temp.as_file_mut()).map_err(packaging())?
        }
        None => 0,
    };

    let (payload_size, payload_digest) =
        write_payload(temp.as_file_mut(), contents).map_err(packaging())?;
    let footer = PackageFooter {
        version: FORMAT_VERSION,
        payload_offset,
        payload_size,
        payload_digest,
    };
    temp.as_file_mut()
        .write_all(&footer.to_bytes())
        .and_then(|()| temp.as_file_mut().sync_all())
        .map_err(packaging())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = if contents.stub.is_some() { 0o755 } else { 0o644 };
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode)).map_err(packaging())?;
    }

    temp.persist(output)
        .map_err(|e| AppInstallError::packaging_at(output)(e.error))?;
    debug!(
        "wrote {output}: payload of {payload_size} bytes at offset {payload_offset}, sha256 {}",
        footer.digest_hex()
    );
    Ok(footer)
}

fn write_payload(file: &mut File, contents: &PackageContents<'_>) -> io::Result<(u64, [u8; 32])> {
    let hashing = HashingWriter {
        inner: file,
        hasher: Sha256::new(),
        written: 0,
    };
    let encoder = zstd::Encoder::new(hashing, 0)?;
    let mut archive = tar::Builder::new(encoder);

    let manifest_json = contents.manifest.to_json().map_err(io::Error::other)?;
    append_bytes(&mut archive, MARKER_PATH, &manifest_json)?;
    for entry in contents.payload {
        match &entry.source {
            PayloadSource::File(path) => {
                archive.append_path_with_name(path, &entry.archive_name)?;
            }
            PayloadSource::Tree(path) => archive.append_dir_all(&entry.archive_name, path)?,
            PayloadSource::EmptyDirectory => append_empty_dir(&mut archive, &entry.archive_name)?,
        }
    }

    let encoder = archive.into_inner()?;
    let hashing = encoder.finish()?;
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hashing.hasher.finalize());
    Ok((hashing.written, digest))
}

fn append_bytes<W: Write>(archive: &mut tar::Builder<W>, name: &str, data: &[u8]) -> io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    archive.append_data(&mut header, name, data)
}

fn append_empty_dir<W: Write>(archive: &mut tar::Builder<W>, name: &str) -> io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(0);
    header.set_mode(0o755);
    header.set_entry_type(tar::EntryType::Directory);
    header.set_cksum();
    archive.append_data(&mut header, name, io::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{BuildInfo, Component, ManifestEntry};
    use crate::package::format::FOOTER_LEN;
    use crate::timestamp::GeneratedAt;
    use tempfile::TempDir;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("UTF-8 path")
    }

    fn manifest() -> Manifest {
        Manifest::new(
            BuildInfo::current(GeneratedAt::new("2026-02-03T00:00:00Z")),
            vec![ManifestEntry::numbered(
                0,
                Component::BareDirectory {
                    path: Utf8PathBuf::from("/tmp/d"),
                },
            )],
        )
    }

    #[test]
    fn writes_footer_after_payload() {
        let dir = TempDir::new().expect("temp dir");
        let output = utf8(dir.path()).join("pkg.out");
        let manifest = manifest();
        let payload = [PayloadFile {
            archive_name: "payload/0000-d".to_owned(),
            source: PayloadSource::EmptyDirectory,
        }];

        let footer = write_package(
            &output,
            &PackageContents {
                manifest: &manifest,
                payload: &payload,
                stub: None,
            },
        )
        .expect("package written");

        let len = fs::metadata(&output).expect("artifact exists").len();
        assert_eq!(footer.payload_offset, 0);
        assert_eq!(footer.payload_size + FOOTER_LEN as u64, len);
    }

    #[test]
    fn stub_precedes_payload() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8(dir.path());
        let stub = root.join("stub.bin");
        fs::write(&stub, b"STUBSTUB").expect("write stub");
        let output = root.join("pkg.out");
        let manifest = manifest();

        let footer = write_package(
            &output,
            &PackageContents {
                manifest: &manifest,
                payload: &[],
                stub: Some(&stub),
            },
        )
        .expect("package written");

        assert_eq!(footer.payload_offset, 8);
        let bytes = fs::read(&output).expect("read artifact");
        assert!(bytes.starts_with(b"STUBSTUB"));
    }

    #[test]
    fn failed_write_leaves_no_artifact() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8(dir.path());
        let output = root.join("pkg.out");
        let manifest = manifest();
        let payload = [PayloadFile {
            archive_name: "payload/0000-missing".to_owned(),
            source: PayloadSource::File(root.join("missing.txt")),
        }];

        let err = write_package(
            &output,
            &PackageContents {
                manifest: &manifest,
                payload: &payload,
                stub: None,
            },
        )
        .expect_err("missing source fails");

        assert!(matches!(err, AppInstallError::Packaging { .. }));
        assert!(!output.exists());
        let leftovers = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 0);
    }
}
