//! appinstall library.
//!
//! This crate builds self-installing deployment packages for IBM i systems
//! and applies them. A package bundles libraries, directories, files, pre-
//! and post-install scripts, and an optional load-and-run library into one
//! artifact. The `appinstall` binary builds packages; `appinstall-apply`
//! installs them.
//!
//! # Modules
//!
//! - [`builder`] - Accumulating components and writing the artifact
//! - [`cli`] - Command-line argument definitions
//! - [`component`] - Components and the ordered manifest
//! - [`config`] - Tool configuration from `config.toml`
//! - [`confirm`] - Confirmation policy and prompting
//! - [`directive`] - The component flag vocabulary
//! - [`dirs`] - Platform directory resolution
//! - [`error`] - Error types and their classification
//! - [`exec`] - External command execution with timeouts
//! - [`extraction`] - Staging a package payload
//! - [`install`] - The installation pipeline
//! - [`logging`] - Diagnostic logging setup
//! - [`options`] - Per-run install options
//! - [`output`] - User-facing progress and summaries
//! - [`package`] - Artifact layout, writing, and loading
//! - [`script`] - Running install scripts
//! - [`spec_file`] - Spec file parsing
//! - [`target`] - Library operations on the target system
//! - [`timestamp`] - Build timestamps

pub mod builder;
pub mod cli;
pub mod component;
pub mod config;
pub mod confirm;
pub mod directive;
pub mod dirs;
pub mod error;
pub mod exec;
pub mod extraction;
pub mod install;
pub mod logging;
pub mod options;
pub mod output;
pub mod package;
pub mod script;
pub mod spec_file;
pub mod target;
pub mod timestamp;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
