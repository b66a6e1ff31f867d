//! The `Prompter` trait boundary (`spec.md` §6): asks a human for an input
//! value when it wasn't resolved from any other source and the CLI asked
//! for interactive prompting.

use std::io::{self, BufRead, Write};

use crate::errors::{Error, Result};

#[cfg(test)]
#[path = "prompter_tests.rs"]
mod tests;

pub trait Prompter: Send + Sync {
    /// `description_block` is whatever text the caller wants shown before
    /// reading a line of input (the input's name, description, and
    /// validation rules, typically).
    fn prompt(&self, description_block: &str) -> Result<String>;
}

/// Reads one line from stdin after writing `description_block` to stdout.
/// The driver only calls this when stdin is a TTY (or the TTY check has
/// been skipped for tests); this type itself does not check.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn prompt(&self, description_block: &str) -> Result<String> {
        print!("{description_block}");
        io::stdout().flush().map_err(Error::Io)?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map_err(Error::Io)?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Always fails. Used by tests (and by `--accept-defaults` callers) that
/// must assert an input was resolved without ever falling back to
/// interactive prompting.
pub struct NullPrompter;

impl Prompter for NullPrompter {
    fn prompt(&self, description_block: &str) -> Result<String> {
        Err(Error::MissingInput(format!(
            "prompting is disabled, but an input was unresolved: {description_block}"
        )))
    }
}
