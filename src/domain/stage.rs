//! Stage invocations and the events a running stage produces.
//!
//! A stage is one external process in the pipeline. The orchestrator never
//! builds `Command`s directly; it hands a `StageInvocation` to a runner.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The external processes the pipeline drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Compiler build (`cargo build`)
    Build,

    /// Optimizer / instrumentation pass over the raw build output
    Optimize,

    /// Simulation engine run against the optimized artifact
    Simulate,

    /// Detached replay viewer
    Playback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Optimize => "optimize",
            Self::Simulate => "simulate",
            Self::Playback => "playback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage's standard streams are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioMode {
    /// Shares the parent's terminal directly
    Inherited,

    /// stdout/stderr are piped back and observed line by line
    Piped,

    /// All streams closed; used for detached processes
    Null,
}

/// One fully-specified external process launch.
///
/// Immutable once built. The working directory is the orchestrator's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInvocation {
    /// Which pipeline stage this launch belongs to
    pub stage: Stage,

    /// Executable to run (absolute, or a bare name looked up on PATH)
    pub program: PathBuf,

    /// Ordered argument vector
    pub args: Vec<String>,

    /// Stream wiring
    pub stdio: StdioMode,

    /// Launch in a fresh process group (unix) so signals can target the whole tree
    pub own_process_group: bool,
}

impl StageInvocation {
    /// Create an invocation with no arguments
    pub fn new(stage: Stage, program: impl Into<PathBuf>, stdio: StdioMode) -> Self {
        Self {
            stage,
            program: program.into(),
            args: Vec::new(),
            stdio,
            own_process_group: false,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Request a dedicated process group for this launch
    pub fn in_own_process_group(mut self) -> Self {
        self.own_process_group = true;
        self
    }

    /// Render as a shell-like command line for logs
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Which output channel a streamed line arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamId {
    Stdout,
    Stderr,
}

/// Events produced by a streamed stage, in arrival order.
///
/// `Exited` is always the final event and arrives after both streams close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// A single line of output (without the trailing newline)
    Line { stream: StreamId, text: String },

    /// The process terminated; `-1` when it was killed by a signal
    Exited(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = StageInvocation::new(Stage::Build, "cargo", StdioMode::Inherited)
            .arg("build")
            .args(["--target", "wasm32-wasi"])
            .arg("--release");

        assert_eq!(inv.args, vec!["build", "--target", "wasm32-wasi", "--release"]);
        assert!(!inv.own_process_group);
        assert_eq!(inv.command_line(), "cargo build --target wasm32-wasi --release");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Simulate.to_string(), "simulate");
        assert_eq!(Stage::Playback.as_str(), "playback");
    }
}
