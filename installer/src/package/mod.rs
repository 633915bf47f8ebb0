//! Package artifacts: layout, writing, and reading back.
//!
//! - [`format`] - footer layout and fixed payload paths
//! - [`writer`] - streaming the payload and footer into an artifact
//! - [`config`] - verifying an artifact and loading its manifest

pub mod config;
pub mod format;
pub mod writer;

pub use config::PackageConfiguration;
pub use format::{MARKER_PATH, PackageFooter};
pub use writer::{PackageContents, PayloadFile, PayloadSource, write_package};
