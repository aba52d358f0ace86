//! Command-line interface for simloop.
//!
//! Runs the full build-optimize-simulate loop. Any positional argument (or
//! `--play`) launches the replay viewer when the run finishes, so the other
//! modes sit behind long flags that cannot be typed by accident.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::adapters::ProcessRunner;
use crate::config::ResolvedConfig;
use crate::core::{Orchestrator, PlaybackLauncher, TerminalSink};
use crate::domain::{PipelineRun, RunState};

/// simloop - Build, optimize, simulate and replay a wasm fleet program
#[derive(Parser, Debug)]
#[command(name = "simloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (skips .simloop/config.yaml discovery)
    #[arg(short, long, env = "SIMLOOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Launch the replay viewer when the simulation finishes
    #[arg(short, long)]
    pub play: bool,

    /// Open the last replay in the viewer without running anything
    #[arg(long, conflicts_with = "show_config")]
    pub play_only: bool,

    /// Show resolved configuration and artifact paths, then exit
    #[arg(long)]
    pub show_config: bool,

    /// Print the configuration as JSON
    #[arg(long, requires = "show_config")]
    pub json: bool,

    /// Any extra argument also requests playback; its value is ignored
    #[arg(hide = true)]
    pub trigger: Vec<String>,
}

/// What one invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Build, optimize and simulate, then optionally hand off to the player
    Run { playback: bool },
    /// Relaunch the player on the existing replay
    PlayOnly,
    ShowConfig { json: bool },
}

impl Cli {
    /// Whether the run should end with a playback handoff
    pub fn playback_requested(&self) -> bool {
        self.play || !self.trigger.is_empty()
    }

    pub fn action(&self) -> Action {
        if self.show_config {
            Action::ShowConfig { json: self.json }
        } else if self.play_only {
            Action::PlayOnly
        } else {
            Action::Run {
                playback: self.playback_requested(),
            }
        }
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = ResolvedConfig::load(self.config.as_deref())?;

        match self.action() {
            Action::Run { playback } => run_loop(&config, playback).await,
            Action::PlayOnly => launch_player(&config),
            Action::ShowConfig { json } => show_config(&config, json),
        }
    }
}

/// Run the full pipeline and exit with the outcome's code
async fn run_loop(config: &ResolvedConfig, playback: bool) -> Result<()> {
    let mut sink = TerminalSink::create(&config.file_log)?;

    let orchestrator = Orchestrator::new();
    let run = orchestrator.run_pipeline(config, playback, &mut sink).await?;

    if let Some(summary) = run_summary(&run) {
        eprintln!("\n{}", summary);
    }

    let code = run.process_exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Closing line for runs that did not finish cleanly
fn run_summary(run: &PipelineRun) -> Option<String> {
    match &run.state {
        RunState::Done => match run.exit_code {
            Some(code) if code != 0 => Some(format!(
                "[Run {} finished: simulator exited with code {}]",
                run.id, code
            )),
            _ => None,
        },
        RunState::Failed { stage, reason } => {
            Some(format!("[Run {} failed at {}: {}]", run.id, stage, reason))
        }
        other => Some(format!("[Run {} ended in state: {}]", run.id, other.name())),
    }
}

/// Launch the viewer on the existing replay
fn launch_player(config: &ResolvedConfig) -> Result<()> {
    let paths = config.artifact_paths();
    let runner = ProcessRunner::new();

    PlaybackLauncher::new(&runner)
        .launch(config, &paths)
        .context("Failed to launch player")?;

    Ok(())
}

/// Show resolved configuration (debug)
fn show_config(config: &ResolvedConfig, json: bool) -> Result<()> {
    let paths = config.artifact_paths();

    if json {
        let value = serde_json::json!({
            "config": config,
            "artifacts": paths,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("simloop configuration");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Project:");
    println!("  Root:    {}", config.root.display());
    println!("  Name:    {}", config.project_name);
    println!("  Target:  {}", config.target_triple);
    println!();
    println!("Tools:");
    println!("  Build:      {}", config.tools.build.display());
    println!("  Optimizer:  {}", config.tools.optimizer.display());
    println!("  Simulator:  {}", config.tools.simulator.display());
    println!("  Player:     {}", config.tools.player.display());
    println!();
    println!("Artifacts:");
    println!("  Raw build:  {}", paths.raw_build.display());
    println!("  Optimized:  {}", paths.optimized.display());
    println!("  Replay:     {}", paths.replay.display());
    println!("  File log:   {}", config.file_log.display());
    println!();
    println!("Yield imports:");
    for import in &config.yield_imports {
        println!("  {}", import);
    }
    println!();
    println!(
        "Interrupt forwarding: {}",
        if config.forward_interrupts { "on" } else { "off" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_no_args_runs_without_playback() {
        let cli = parse(&["simloop"]);
        assert_eq!(cli.action(), Action::Run { playback: false });
    }

    #[test]
    fn test_any_extra_arg_requests_playback() {
        for word in ["1", "x", "play", "config"] {
            let cli = parse(&["simloop", word]);
            assert_eq!(cli.action(), Action::Run { playback: true }, "trigger {word}");
        }
    }

    #[test]
    fn test_play_flag_requests_playback() {
        let cli = parse(&["simloop", "--play"]);
        assert_eq!(cli.action(), Action::Run { playback: true });
    }

    #[test]
    fn test_play_only() {
        let cli = parse(&["simloop", "--play-only"]);
        assert_eq!(cli.action(), Action::PlayOnly);
    }

    #[test]
    fn test_show_config() {
        let cli = parse(&["simloop", "--show-config"]);
        assert_eq!(cli.action(), Action::ShowConfig { json: false });

        let cli = parse(&["simloop", "--show-config", "--json"]);
        assert_eq!(cli.action(), Action::ShowConfig { json: true });
    }

    #[test]
    fn test_invalid_flag_combinations() {
        assert!(Cli::try_parse_from(["simloop", "--json"]).is_err());
        assert!(Cli::try_parse_from(["simloop", "--play-only", "--show-config"]).is_err());
    }

    #[test]
    fn test_explicit_config_path() {
        let cli = parse(&["simloop", "--config", "/tmp/sim.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sim.yaml")));
    }

    #[test]
    fn test_run_summary() {
        let mut run = PipelineRun::new(false);
        run.transition(RunState::Building).unwrap();
        run.transition(RunState::Optimizing).unwrap();
        run.transition(RunState::Simulating).unwrap();
        run.exit_code = Some(0);
        run.transition(RunState::Done).unwrap();
        assert!(run_summary(&run).is_none());

        run.exit_code = Some(3);
        let summary = run_summary(&run).unwrap();
        assert!(summary.contains("simulator exited with code 3"));
    }
}
