//! Main orchestrator for the build-optimize-simulate loop.
//!
//! Sequences the stages, wires each stage's output path into the next, routes
//! simulator output through the classifier, and hands the replay to the
//! player. Nothing is retried: the first failing stage ends the run.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{ProcessRunner, StageError, StageRunner, StreamedStage};
use crate::config::{ArtifactPaths, ResolvedConfig};
use crate::domain::{format_kb, PipelineRun, RunState, Stage, StageEvent, StreamId};

use super::classifier::{LineClassifier, MarkerClassifier};
use super::invocations;
use super::log_sink::{LogSink, RouteCounts};
use super::playback::PlaybackLauncher;

/// Resolves when the user presses Ctrl+C
pub type InterruptFuture = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

/// Yields a fresh `InterruptFuture` for each press awaited
pub type InterruptSource = Box<dyn Fn() -> InterruptFuture + Send + Sync>;

fn ctrl_c() -> InterruptFuture {
    Box::pin(tokio::signal::ctrl_c())
}

/// Main pipeline orchestrator
pub struct Orchestrator<R: StageRunner = ProcessRunner> {
    /// Launches the external tools
    runner: R,

    /// Demultiplexes simulator stdout
    classifier: Box<dyn LineClassifier>,

    /// Ctrl+C presses to forward to the simulator
    interrupts: InterruptSource,
}

impl Default for Orchestrator<ProcessRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator<ProcessRunner> {
    /// Create an orchestrator that spawns real processes
    pub fn new() -> Self {
        Self::with_runner(ProcessRunner::new())
    }
}

impl<R: StageRunner> Orchestrator<R> {
    /// Create an orchestrator around a custom runner
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            classifier: Box::new(MarkerClassifier),
            interrupts: Box::new(ctrl_c),
        }
    }

    /// Replace the simulator log classifier
    pub fn with_classifier(mut self, classifier: impl LineClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Replace where Ctrl+C presses come from
    pub fn with_interrupts(
        mut self,
        source: impl Fn() -> InterruptFuture + Send + Sync + 'static,
    ) -> Self {
        self.interrupts = Box::new(source);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Execute one full pipeline run.
    ///
    /// Stage failures are reported in the returned run's state, not as `Err`.
    /// `Err` means the orchestrator itself could not continue (sink I/O).
    #[instrument(skip_all, fields(project = %config.project_name, target = %config.target_triple))]
    pub async fn run_pipeline(
        &self,
        config: &ResolvedConfig,
        playback: bool,
        sink: &mut dyn LogSink,
    ) -> Result<PipelineRun> {
        let mut run = PipelineRun::new(playback);
        let paths = config.artifact_paths();
        info!(run_id = %run.id, "Starting pipeline");

        // Build
        run.transition(RunState::Building)?;
        let build = invocations::build(config);
        let code = match self.runner.run_inherited(&build).await {
            Ok(code) => code,
            Err(e) => return self.handle_spawn_failure(&mut run, sink, e),
        };
        if !self.record_exit(&mut run, sink, Stage::Build, code)? {
            return Ok(run);
        }

        // Optimize
        run.transition(RunState::Optimizing)?;
        let optimize = invocations::optimize(config, &paths);
        let stage = match self.runner.run_streamed(&optimize).await {
            Ok(stage) => stage,
            Err(e) => return self.handle_spawn_failure(&mut run, sink, e),
        };
        let code = self.drain_optimizer(stage, sink).await?;
        if !self.record_exit(&mut run, sink, Stage::Optimize, code)? {
            return Ok(run);
        }

        // Simulate
        run.transition(RunState::Simulating)?;
        let simulate = invocations::simulate(config, &paths);
        let stage = match self.runner.run_streamed(&simulate).await {
            Ok(stage) => stage,
            Err(e) => return self.handle_spawn_failure(&mut run, sink, e),
        };
        let code = self
            .consume_simulation(
                stage,
                sink,
                config.forward_interrupts,
                simulate.own_process_group,
            )
            .await?;
        run.exit_code = Some(code);
        sink.console(&format!("{} stage exited with code {}", Stage::Simulate, code))?;

        self.report_replay_size(&mut run, &paths, sink).await?;
        run.transition(RunState::Done)?;
        sink.flush()?;
        info!(run_id = %run.id, exit_code = code, "Simulation finished");

        // Playback handoff
        if run.playback_requested {
            if let Err(e) = PlaybackLauncher::new(&self.runner).launch(config, &paths) {
                warn!(error = %e, "Failed to launch player");
                sink.console_error(&format!("Error: {}", e))?;
            }
        }

        Ok(run)
    }

    /// Record a stage's exit code; on nonzero, fail the run and return false
    fn record_exit(
        &self,
        run: &mut PipelineRun,
        sink: &mut dyn LogSink,
        stage: Stage,
        code: i32,
    ) -> Result<bool> {
        run.exit_code = Some(code);

        if code == 0 {
            debug!(%stage, "Stage succeeded");
            return Ok(true);
        }

        let reason = format!("{} stage exited with code {}", stage, code);
        error!(%stage, exit_code = code, "Stage failed");
        sink.console_error(&reason)?;
        sink.flush()?;
        run.fail(stage, Some(code), reason)?;
        Ok(false)
    }

    /// Fail the run because a stage never started
    fn handle_spawn_failure(
        &self,
        run: &mut PipelineRun,
        sink: &mut dyn LogSink,
        err: StageError,
    ) -> Result<PipelineRun> {
        let stage = run.state.active_stage().unwrap_or(Stage::Build);
        let reason = err.to_string();
        error!(%stage, error = %reason, "Stage could not be started");

        sink.console_error(&format!("Error: {}", reason))?;
        sink.flush()?;
        run.fail(stage, None, reason)?;
        Ok(run.clone())
    }

    /// Wait for the optimizer, surfacing its stderr
    async fn drain_optimizer(&self, mut stage: StreamedStage, sink: &mut dyn LogSink) -> Result<i32> {
        while let Some(event) = stage.events.recv().await {
            match event {
                StageEvent::Line {
                    stream: StreamId::Stdout,
                    text,
                } => debug!(line = %text, "optimizer"),
                StageEvent::Line {
                    stream: StreamId::Stderr,
                    text,
                } => {
                    let text = text.trim();
                    if !text.is_empty() {
                        sink.console_error(text)?;
                    }
                }
                StageEvent::Exited(code) => return Ok(code),
            }
        }

        warn!("Optimizer output closed without an exit status");
        Ok(-1)
    }

    /// Route simulator output until it exits.
    ///
    /// The first Ctrl+C is forwarded as SIGINT to the simulator's group; every
    /// later one kills the group outright.
    async fn consume_simulation(
        &self,
        mut stage: StreamedStage,
        sink: &mut dyn LogSink,
        forward_interrupts: bool,
        own_group: bool,
    ) -> Result<i32> {
        let mut counts = RouteCounts::default();
        let mut presses = 0u32;
        let mut listening = forward_interrupts;
        let mut interrupt = (self.interrupts)();

        let code = loop {
            tokio::select! {
                event = stage.events.recv() => match event {
                    Some(StageEvent::Line { stream: StreamId::Stdout, text }) => {
                        let line = self.classifier.classify(&text);
                        if let Err(e) = counts.route(sink, line) {
                            return Err(self.abandon_simulation(&mut stage, own_group, e).await);
                        }
                    }
                    Some(StageEvent::Line { stream: StreamId::Stderr, text }) => {
                        let text = text.trim();
                        if !text.is_empty() {
                            counts.stderr += 1;
                            if let Err(e) = sink.console_error(text) {
                                return Err(self.abandon_simulation(&mut stage, own_group, e).await);
                            }
                        }
                    }
                    Some(StageEvent::Exited(code)) => break code,
                    None => {
                        warn!("Simulator output closed without an exit status");
                        break -1;
                    }
                },
                signal = &mut interrupt, if listening => match signal {
                    Ok(()) => {
                        presses += 1;
                        self.forward_interrupt(stage.pid, presses);
                        interrupt = (self.interrupts)();
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to listen for interrupts");
                        listening = false;
                    }
                },
            }
        };

        debug!(
            console = counts.console,
            file = counts.file,
            dropped = counts.dropped,
            stderr = counts.stderr,
            interrupts = presses,
            "Simulator output routed"
        );
        Ok(code)
    }

    fn forward_interrupt(&self, pid: Option<u32>, presses: u32) {
        let Some(pid) = pid else {
            warn!("Interrupt received but simulator pid is unknown");
            return;
        };

        let result = if presses == 1 {
            warn!(pid, "Interrupt received; forwarding to simulator process group");
            self.runner.interrupt(pid)
        } else {
            warn!(pid, "Interrupt received again; killing simulator process group");
            self.runner.kill(pid, true)
        };

        if let Err(e) = result {
            warn!(pid, error = %e, "Failed to signal simulator");
        }
    }

    /// Kill the simulator after its output could not be written, and wait for
    /// it to exit before surfacing the write error
    async fn abandon_simulation(
        &self,
        stage: &mut StreamedStage,
        own_group: bool,
        err: std::io::Error,
    ) -> anyhow::Error {
        error!(error = %err, "Failed to write simulator output; stopping simulator");

        match stage.pid {
            Some(pid) => {
                if let Err(e) = self.runner.kill(pid, own_group) {
                    warn!(pid, error = %e, "Failed to kill simulator");
                }
            }
            None => warn!("Simulator pid is unknown; cannot stop it"),
        }

        while let Some(event) = stage.events.recv().await {
            if let StageEvent::Exited(code) = event {
                debug!(exit_code = code, "Simulator stopped");
                break;
            }
        }

        anyhow::Error::new(err).context("Failed to write simulator output")
    }

    /// Print the replay size; a missing replay is not an error
    async fn report_replay_size(
        &self,
        run: &mut PipelineRun,
        paths: &ArtifactPaths,
        sink: &mut dyn LogSink,
    ) -> Result<()> {
        match paths.replay_artifact().size_bytes().await {
            Ok(bytes) => {
                run.replay_size_bytes = Some(bytes);
                sink.console(&format!("Replay file size: {}", format_kb(bytes)))?;
            }
            Err(e) => {
                debug!(replay = %paths.replay.display(), error = %e, "Replay size unavailable");
            }
        }
        Ok(())
    }
}
