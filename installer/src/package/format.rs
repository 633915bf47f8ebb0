//! On-disk layout of a package artifact.
//!
//! ```text
//! [installer stub (optional)] [payload: tar.zst] [footer: 64 bytes]
//!
//! footer:
//!   magic "APPINSTL"          8 bytes
//!   format version (u32 LE)   4 bytes
//!   payload offset (u64 LE)   8 bytes
//!   payload size (u64 LE)     8 bytes
//!   SHA-256 of payload       32 bytes
//!   reserved                  4 bytes
//! ```
//!
//! The payload holds the manifest at [`MARKER_PATH`] followed by one entry
//! per component under `payload/`.

use crate::error::{AppInstallError, Result};
use camino::Utf8Path;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Magic bytes opening the footer.
pub const MAGIC: [u8; 8] = *b"APPINSTL";

/// Footer format version written by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the footer in bytes.
pub const FOOTER_LEN: usize = 64;

/// Archive path of the manifest inside the payload.
pub const MARKER_PATH: &str = "APPINSTALL-INF/manifest.json";

/// Length of the payload digest prefix used to name staging directories.
const SHORT_ID_LEN: usize = 16;

/// The fixed-size trailer locating the payload in an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageFooter {
    /// Format version.
    pub version: u32,
    /// Byte offset of the payload from the start of the file.
    pub payload_offset: u64,
    /// Payload length in bytes.
    pub payload_size: u64,
    /// SHA-256 digest of the payload bytes.
    pub payload_digest: [u8; 32],
}

impl PackageFooter {
    /// Encode the footer.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FOOTER_LEN] {
        let mut bytes = [0u8; FOOTER_LEN];
        let version = self.version.to_le_bytes();
        let offset = self.payload_offset.to_le_bytes();
        let size = self.payload_size.to_le_bytes();
        let fields = MAGIC
            .iter()
            .chain(&version)
            .chain(&offset)
            .chain(&size)
            .chain(&self.payload_digest);
        for (slot, byte) in bytes.iter_mut().zip(fields) {
            *slot = *byte;
        }
        bytes
    }

    /// Decode a footer.
    ///
    /// Returns `None` when the magic bytes are absent.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; FOOTER_LEN]) -> Option<Self> {
        let (magic, rest) = bytes.split_first_chunk::<8>()?;
        if *magic != MAGIC {
            return None;
        }
        let (version, rest) = rest.split_first_chunk::<4>()?;
        let (offset, rest) = rest.split_first_chunk::<8>()?;
        let (size, rest) = rest.split_first_chunk::<8>()?;
        let (digest, _reserved) = rest.split_first_chunk::<32>()?;
        Some(Self {
            version: u32::from_le_bytes(*version),
            payload_offset: u64::from_le_bytes(*offset),
            payload_size: u64::from_le_bytes(*size),
            payload_digest: *digest,
        })
    }

    /// Read and validate the footer at the end of `file`.
    ///
    /// # Errors
    ///
    /// Returns [`AppInstallError::NotAPackage`] when the file is too short
    /// or carries no footer, and [`AppInstallError::CorruptPackage`] when
    /// the footer is from a newer format or points outside the file.
    pub fn read_from(file: &mut File, path: &Utf8Path) -> Result<Self> {
        let not_a_package = || AppInstallError::NotAPackage {
            path: path.to_owned(),
        };
        let len = file.metadata()?.len();
        let footer_len = FOOTER_LEN as u64;
        if len < footer_len {
            return Err(not_a_package());
        }
        file.seek(SeekFrom::Start(len - footer_len))?;
        let mut bytes = [0u8; FOOTER_LEN];
        file.read_exact(&mut bytes)?;
        let footer = Self::from_bytes(&bytes).ok_or_else(not_a_package)?;

        if footer.version > FORMAT_VERSION {
            return Err(AppInstallError::CorruptPackage {
                reason: format!(
                    "unsupported package format version {}; current maximum is {FORMAT_VERSION}",
                    footer.version
                ),
            });
        }
        let end = footer.payload_offset.checked_add(footer.payload_size);
        if end != Some(len - footer_len) {
            return Err(AppInstallError::CorruptPackage {
                reason: "payload bounds do not match the file size".to_owned(),
            });
        }
        Ok(footer)
    }

    /// The payload digest as lowercase hex.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        to_hex(&self.payload_digest)
    }

    /// A short identifier for the payload, derived from its digest.
    #[must_use]
    pub fn short_id(&self) -> String {
        let mut hex = self.digest_hex();
        hex.truncate(SHORT_ID_LEN);
        hex
    }
}

/// Encode bytes as lowercase hex.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}
