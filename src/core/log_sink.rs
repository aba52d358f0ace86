//! Destinations for classified simulator output.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::classifier::ClassifiedLine;

/// Where console and file-sink lines end up
pub trait LogSink: Send {
    /// A relabelled simulator line for the user's terminal
    fn console(&mut self, line: &str) -> io::Result<()>;

    /// A diagnostic line (simulator stderr, stage notices on failure)
    fn console_error(&mut self, line: &str) -> io::Result<()>;

    /// A FILE_SINK payload
    fn file(&mut self, payload: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Per-destination line counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteCounts {
    pub console: u64,
    pub file: u64,
    pub dropped: u64,
    pub stderr: u64,
}

impl RouteCounts {
    /// Send one classified line to `sink` and count it
    pub fn route(&mut self, sink: &mut dyn LogSink, line: ClassifiedLine) -> io::Result<()> {
        match line {
            ClassifiedLine::Drop => {
                self.dropped += 1;
                Ok(())
            }
            ClassifiedLine::FileSink(payload) => {
                self.file += 1;
                sink.file(&payload)
            }
            ClassifiedLine::Console { text, .. } => {
                self.console += 1;
                sink.console(&text)
            }
        }
    }
}

/// Prints to stdout/stderr and appends file-sink payloads to a log file
pub struct TerminalSink {
    file_log: PathBuf,
    writer: BufWriter<File>,
}

impl TerminalSink {
    /// Create the file log, truncating any previous run's content
    pub fn create(file_log: &Path) -> Result<Self> {
        if let Some(parent) = file_log.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(file_log)
            .with_context(|| format!("Failed to open file log: {}", file_log.display()))?;

        Ok(Self {
            file_log: file_log.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn file_log(&self) -> &Path {
        &self.file_log
    }
}

impl LogSink for TerminalSink {
    fn console(&mut self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)
    }

    fn console_error(&mut self, line: &str) -> io::Result<()> {
        let mut err = io::stderr().lock();
        writeln!(err, "{}", line)
    }

    fn file(&mut self, payload: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", payload)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        io::stdout().flush()
    }
}

/// Keeps every routed line in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub console: Vec<String>,
    pub console_error: Vec<String>,
    pub file: Vec<String>,
}

impl LogSink for MemorySink {
    fn console(&mut self, line: &str) -> io::Result<()> {
        self.console.push(line.to_string());
        Ok(())
    }

    fn console_error(&mut self, line: &str) -> io::Result<()> {
        self.console_error.push(line.to_string());
        Ok(())
    }

    fn file(&mut self, payload: &str) -> io::Result<()> {
        self.file.push(payload.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::classify;
    use tempfile::TempDir;

    #[test]
    fn test_route_counts() {
        let mut sink = MemorySink::default();
        let mut counts = RouteCounts::default();

        for raw in [
            "[12:00:00 INF] release:",
            "x file: payload",
            "x release (1): hidden",
            "x release: shown",
        ] {
            counts.route(&mut sink, classify(raw)).unwrap();
        }

        assert_eq!(counts.dropped, 2);
        assert_eq!(counts.file, 1);
        assert_eq!(counts.console, 1);
        assert_eq!(sink.console, vec!["x [A] shown"]);
        assert_eq!(sink.file, vec!["payload"]);
    }

    #[test]
    fn test_terminal_sink_truncates_and_appends() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("sim_file.log");

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale\n").unwrap();

        let mut sink = TerminalSink::create(&path).unwrap();
        sink.file("first").unwrap();
        sink.file("second").unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        assert_eq!(sink.file_log(), path.as_path());
    }

    #[test]
    fn test_terminal_sink_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("b").join("log.txt");

        let _sink = TerminalSink::create(&path).unwrap();
        assert!(path.exists());
    }
}
