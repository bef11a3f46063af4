//! Console output: answers on stdout, diagnostics on stderr.

use std::io::{self, Write};

pub const WARNING_PREFIX: &str = "Warning: ";
pub const ERROR_PREFIX: &str = "Error: ";
pub const UPDATE_PREFIX: &str = "[update] ";
pub const INFO_PREFIX: &str = "[info] ";
pub const STREAM_COMPLETE: &str = "[stream complete]";
pub const USER_PROMPT: &str = "you> ";
pub const ASSISTANT_PREFIX: &str = "assistant> ";

/// Writes primary output and diagnostics to separate sinks.
///
/// Answers go to `out`; warnings and errors go to `err`.
pub struct Renderer<O, E> {
    out: O,
    err: E,
}

impl Renderer<io::Stdout, io::Stderr> {
    /// Renderer over the process stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Renderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// One full line of primary output.
    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    /// A fragment of primary output, flushed immediately.
    pub fn token(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    pub fn update(&mut self, step: &str) -> io::Result<()> {
        writeln!(self.out, "{UPDATE_PREFIX}{step}")
    }

    /// Status line of the interactive chat.
    pub fn info(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{INFO_PREFIX}{message}")
    }

    pub fn prompt(&mut self) -> io::Result<()> {
        self.token(USER_PROMPT)
    }

    pub fn assistant_prefix(&mut self) -> io::Result<()> {
        self.token(ASSISTANT_PREFIX)
    }

    pub fn newline(&mut self) -> io::Result<()> {
        self.token("\n")
    }

    pub fn warn(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.err, "{WARNING_PREFIX}{message}")
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.err, "{ERROR_PREFIX}{message}")
    }

    pub fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }
}
