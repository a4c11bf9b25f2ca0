use std::{
    collections::VecDeque,
    io::{self, BufRead as _, Write as _},
};

use crate::error::{Error, RunResult};

/// Trait for handling output from the `print` family of builtins.
///
/// Implement this to capture or redirect guest output. The default
/// implementation [`StdPrint`] writes to stdout.
pub trait PrintWriter {
    /// Writes one formatted chunk of output, without separators or newline.
    fn write_text(&mut self, text: &str) -> RunResult<()>;

    /// Writes a single separator or terminator character.
    fn push_char(&mut self, end: char) -> RunResult<()>;
}

/// Default `PrintWriter` that writes to the process stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_text(&mut self, text: &str) -> RunResult<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())
            .map_err(|err| Error::program(format!("stdout write failed: {err}")))
    }

    fn push_char(&mut self, end: char) -> RunResult<()> {
        let mut buf = [0u8; 4];
        self.write_text(end.encode_utf8(&mut buf))
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Useful for testing or capturing print output programmatically.
#[derive(Debug, Default)]
pub struct CollectString(String);

impl CollectString {
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    /// Returns the collected output so far.
    #[must_use]
    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the writer and returns the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectString {
    fn write_text(&mut self, text: &str) -> RunResult<()> {
        self.0.push_str(text);
        Ok(())
    }

    fn push_char(&mut self, end: char) -> RunResult<()> {
        self.0.push(end);
        Ok(())
    }
}

/// `PrintWriter` that discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_text(&mut self, _text: &str) -> RunResult<()> {
        Ok(())
    }

    fn push_char(&mut self, _end: char) -> RunResult<()> {
        Ok(())
    }
}

/// Source of input lines for the `read` builtin.
///
/// `read` first consults the guest environment for a `--stdin` line feeder;
/// this trait is the fallback when no feeder is bound.
pub trait ReadSource {
    /// Returns the next input line without its terminator, or None at end of
    /// input.
    fn read_line(&mut self) -> RunResult<Option<String>>;
}

/// Reads lines from the process stdin.
#[derive(Debug, Default)]
pub struct StdinSource;

impl ReadSource for StdinSource {
    fn read_line(&mut self) -> RunResult<Option<String>> {
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|err| Error::program(format!("stdin read failed: {err}")))?;
        if read == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

/// A preloaded queue of input lines, for tests and embedding.
#[derive(Debug, Default)]
pub struct QueuedLines(VecDeque<String>);

impl QueuedLines {
    #[must_use]
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(lines.into_iter().map(Into::into).collect())
    }
}

impl ReadSource for QueuedLines {
    fn read_line(&mut self) -> RunResult<Option<String>> {
        Ok(self.0.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_string_accumulates() {
        let mut writer = CollectString::new();
        writer.write_text("a").unwrap();
        writer.push_char(' ').unwrap();
        writer.write_text("b").unwrap();
        writer.push_char('\n').unwrap();
        assert_eq!(writer.output(), "a b\n");
    }

    #[test]
    fn queued_lines_drain_in_order() {
        let mut source = QueuedLines::new(["one", "two"]);
        assert_eq!(source.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(source.read_line().unwrap().as_deref(), Some("two"));
        assert_eq!(source.read_line().unwrap(), None);
    }
}
