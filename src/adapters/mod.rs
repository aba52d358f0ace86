//! Adapter interfaces for external processes.
//!
//! Every stage of the pipeline is an opaque executable. The orchestrator only
//! talks to them through `StageRunner`, which keeps process plumbing out of the
//! sequencing logic and lets tests substitute a recording runner.

pub mod process;
pub mod signal;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{Stage, StageEvent, StageInvocation, StreamId};

// Re-export the process-backed runner
pub use process::ProcessRunner;

/// Failures launching or observing a stage process.
///
/// A nonzero exit code is *not* an error here; it is reported as a value.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Failed to spawn {stage} stage ({program}): {source}")]
    Spawn {
        stage: Stage,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running {stage} stage: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage has no {stream:?} pipe")]
    MissingPipe { stage: Stage, stream: StreamId },
}

impl StageError {
    /// True when the executable never started
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}

/// A launched stage whose output is consumed as it is produced
#[derive(Debug)]
pub struct StreamedStage {
    /// OS process id, if the platform reported one
    pub pid: Option<u32>,

    /// Lines in arrival order, terminated by `StageEvent::Exited`
    pub events: mpsc::Receiver<StageEvent>,
}

/// Trait for launching pipeline stages
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Run with the caller's standard streams and wait for the exit code
    async fn run_inherited(&self, invocation: &StageInvocation) -> Result<i32, StageError>;

    /// Launch with piped stdout/stderr and stream lines back
    async fn run_streamed(&self, invocation: &StageInvocation) -> Result<StreamedStage, StageError>;

    /// Launch and release ownership; the process outlives the caller
    fn spawn_detached(&self, invocation: &StageInvocation) -> Result<(), StageError>;

    /// Deliver an interrupt to the process group led by `pid`
    fn interrupt(&self, pid: u32) -> std::io::Result<()> {
        signal::interrupt_group(pid)
    }

    /// Forcefully stop `pid`; `group` targets the process group it leads
    fn kill(&self, pid: u32, group: bool) -> std::io::Result<()> {
        signal::kill(pid, group)
    }
}
