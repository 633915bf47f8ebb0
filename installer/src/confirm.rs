//! Confirmation policy for replacing existing libraries.

use crate::error::Result;
use std::fmt;
use std::io::{BufRead, Write};

/// How the installer decides whether to replace an existing library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfirmPolicy {
    /// Ask before replacing each existing library.
    #[default]
    PromptEach,
    /// Replace existing libraries without asking.
    YesToAll,
    /// Never delete; skip libraries that would need deleting.
    ContinueIfNotDelete,
}

impl fmt::Display for ConfirmPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PromptEach => f.write_str("prompt for each library"),
            Self::YesToAll => f.write_str("yes to all"),
            Self::ContinueIfNotDelete => f.write_str("continue if not delete"),
        }
    }
}

/// An answer to a replace prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    /// Replace this library.
    Yes,
    /// Keep the existing library and skip this one.
    No,
    /// Replace this and every remaining library without asking again.
    All,
}

/// Asks the operator whether to replace an existing library.
pub trait Prompter {
    /// Ask whether `library` may be deleted and restored.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the question cannot be asked or answered.
    fn confirm_replace(&mut self, library: &str) -> Result<PromptAnswer>;
}

/// Prompts on a terminal-like reader and writer.
///
/// Unrecognized answers repeat the question; end of input counts as `No`.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    /// Create a prompter reading answers from `input`.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn confirm_replace(&mut self, library: &str) -> Result<PromptAnswer> {
        loop {
            write!(
                self.output,
                "Library {library} already exists. Delete and restore it? [y]es/[n]o/[a]ll: "
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(PromptAnswer::No);
            }
            if let Some(answer) = parse_answer(&line) {
                return Ok(answer);
            }
        }
    }
}

fn parse_answer(line: &str) -> Option<PromptAnswer> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(PromptAnswer::Yes),
        "n" | "no" => Some(PromptAnswer::No),
        "a" | "all" => Some(PromptAnswer::All),
        _ => None,
    }
}
