//! Process-backed stage runner.
//!
//! Launches stages with `tokio::process` for inherited and streamed runs and
//! with `std::process` for detached launches, whose handle is dropped at once.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{StageError, StageRunner, StreamedStage};
use crate::domain::{StageEvent, StageInvocation, StdioMode, StreamId};

/// Default buffer between the reader tasks and the consumer
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Stage runner that spawns real OS processes
pub struct ProcessRunner {
    channel_capacity: usize,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Create a runner with a custom event buffer size
    pub fn with_channel_capacity(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }

    fn command(invocation: &StageInvocation) -> Command {
        let mut cmd = std::process::Command::new(&invocation.program);
        cmd.args(&invocation.args);

        match invocation.stdio {
            StdioMode::Inherited => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            StdioMode::Piped => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
            StdioMode::Null => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
            }
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if invocation.own_process_group {
                cmd.process_group(0);
            }
        }

        Command::from(cmd)
    }

    fn spawn_error(invocation: &StageInvocation, source: std::io::Error) -> StageError {
        StageError::Spawn {
            stage: invocation.stage,
            program: invocation.program.clone(),
            source,
        }
    }
}

/// Exit code of a finished process; `-1` when killed by a signal
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Read `reader` line by line and forward each line as a `StageEvent`.
///
/// Invalid UTF-8 is replaced rather than ending the stream. Once the receiver
/// is gone the pipe is still drained so the child never blocks on a full pipe.
async fn forward_lines<R>(reader: R, stream: StreamId, tx: mpsc::Sender<StageEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut open = true;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if !open {
                    continue;
                }
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                let text = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(StageEvent::Line { stream, text }).await.is_err() {
                    open = false;
                }
            }
            Err(e) => {
                warn!(?stream, error = %e, "Failed to read stage output");
                break;
            }
        }
    }
}

#[async_trait]
impl StageRunner for ProcessRunner {
    async fn run_inherited(&self, invocation: &StageInvocation) -> Result<i32, StageError> {
        debug!(stage = %invocation.stage, command = %invocation.command_line(), "Spawning stage");

        let mut child = Self::command(invocation)
            .spawn()
            .map_err(|e| Self::spawn_error(invocation, e))?;

        let status = child.wait().await.map_err(|source| StageError::Io {
            stage: invocation.stage,
            source,
        })?;

        Ok(exit_code(status))
    }

    async fn run_streamed(&self, invocation: &StageInvocation) -> Result<StreamedStage, StageError> {
        debug!(stage = %invocation.stage, command = %invocation.command_line(), "Spawning streamed stage");

        let mut piped = invocation.clone();
        piped.stdio = StdioMode::Piped;

        let mut child = Self::command(&piped)
            .spawn()
            .map_err(|e| Self::spawn_error(invocation, e))?;

        let stage = invocation.stage;
        let pid = child.id();
        let stdout = child.stdout.take().ok_or(StageError::MissingPipe {
            stage,
            stream: StreamId::Stdout,
        })?;
        let stderr = child.stderr.take().ok_or(StageError::MissingPipe {
            stage,
            stream: StreamId::Stderr,
        })?;

        let (tx, rx) = mpsc::channel::<StageEvent>(self.channel_capacity);

        tokio::spawn(async move {
            let stdout_task = tokio::spawn(forward_lines(stdout, StreamId::Stdout, tx.clone()));
            let stderr_task = tokio::spawn(forward_lines(stderr, StreamId::Stderr, tx.clone()));

            // Both pipes close before the exit event goes out
            let _ = stdout_task.await;
            let _ = stderr_task.await;

            let code = match child.wait().await {
                Ok(status) => exit_code(status),
                Err(e) => {
                    warn!(%stage, error = %e, "Failed to wait for stage process");
                    -1
                }
            };

            let _ = tx.send(StageEvent::Exited(code)).await;
        });

        Ok(StreamedStage { pid, events: rx })
    }

    fn spawn_detached(&self, invocation: &StageInvocation) -> Result<(), StageError> {
        debug!(stage = %invocation.stage, command = %invocation.command_line(), "Spawning detached stage");

        let mut cmd = std::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own group: terminal signals aimed at us never reach the child
            cmd.process_group(0);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        let child = cmd.spawn().map_err(|e| Self::spawn_error(invocation, e))?;
        debug!(stage = %invocation.stage, pid = child.id(), "Detached stage launched");

        // Dropping a std Child neither waits for nor kills it
        drop(child);
        Ok(())
    }
}
