//! Run state for one end-to-end pipeline execution.
//!
//! A `PipelineRun` lives only as long as the invocation that created it.
//! It is never written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::stage::Stage;

/// A single pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique identifier for this run (log correlation only)
    pub id: Uuid,

    /// Current state of the run
    pub state: RunState,

    /// Every state the run has entered, in order, starting with `Idle`
    pub history: Vec<RunState>,

    /// Whether the replay viewer should be launched on completion
    pub playback_requested: bool,

    /// Exit code of the last stage that terminated
    pub exit_code: Option<i32>,

    /// Replay artifact size, when it could be read after the simulation
    pub replay_size_bytes: Option<u64>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached `Done` or `Failed`
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Create a new idle run
    pub fn new(playback_requested: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Idle,
            history: vec![RunState::Idle],
            playback_requested,
            exit_code: None,
            replay_size_bytes: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: RunState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(&next) {
            return Err(TransitionError {
                from: self.state.name(),
                to: next.name(),
            });
        }

        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.history.push(next.clone());
        self.state = next;
        Ok(())
    }

    /// Mark the run failed at `stage`
    pub fn fail(
        &mut self,
        stage: Stage,
        exit_code: Option<i32>,
        reason: impl Into<String>,
    ) -> Result<(), TransitionError> {
        if exit_code.is_some() {
            self.exit_code = exit_code;
        }
        self.transition(RunState::Failed {
            stage,
            reason: reason.into(),
        })
    }

    /// Check if the run is still in progress
    pub fn is_running(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, RunState::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, RunState::Failed { .. })
    }

    /// True if the run ever entered the state for `stage`
    pub fn visited(&self, stage: Stage) -> bool {
        self.history.iter().any(|s| s.active_stage() == Some(stage))
    }

    /// Exit code the orchestrator process should report for this run
    pub fn process_exit_code(&self) -> i32 {
        match (&self.state, self.exit_code) {
            (RunState::Done, Some(code)) => code,
            (RunState::Done, None) => 0,
            (RunState::Failed { .. }, Some(code)) if code != 0 => code,
            _ => 1,
        }
    }
}

/// State of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Not started
    Idle,

    /// Compiler running
    Building,

    /// Optimizer running
    Optimizing,

    /// Simulator running, output being classified
    Simulating,

    /// Simulation finished (whatever the simulator's own exit code)
    Done,

    /// A stage could not be spawned or exited nonzero
    Failed { stage: Stage, reason: String },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Optimizing => "optimizing",
            Self::Simulating => "simulating",
            Self::Done => "done",
            Self::Failed { .. } => "failed",
        }
    }

    /// `Done` and `Failed` end the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    /// The stage whose process is live while in this state
    pub fn active_stage(&self) -> Option<Stage> {
        match self {
            Self::Building => Some(Stage::Build),
            Self::Optimizing => Some(Stage::Optimize),
            Self::Simulating => Some(Stage::Simulate),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: &RunState) -> bool {
        match (self, next) {
            (Self::Idle, Self::Building)
            | (Self::Building, Self::Optimizing)
            | (Self::Optimizing, Self::Simulating)
            | (Self::Simulating, Self::Done) => true,
            (Self::Building | Self::Optimizing | Self::Simulating, Self::Failed { .. }) => true,
            _ => false,
        }
    }
}

/// Rejected state machine move
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid run transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_creation() {
        let run = PipelineRun::new(true);

        assert_eq!(run.state, RunState::Idle);
        assert_eq!(run.history, vec![RunState::Idle]);
        assert!(run.playback_requested);
        assert!(run.is_running());
        assert!(run.completed_at.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut run = PipelineRun::new(false);
        run.transition(RunState::Building).unwrap();
        run.transition(RunState::Optimizing).unwrap();
        run.transition(RunState::Simulating).unwrap();
        run.transition(RunState::Done).unwrap();

        assert!(run.is_done());
        assert!(run.completed_at.is_some());
        assert!(run.visited(Stage::Build));
        assert!(run.visited(Stage::Simulate));
        assert_eq!(run.history.len(), 5);
    }

    #[test]
    fn test_cannot_skip_stages() {
        let mut run = PipelineRun::new(false);
        let err = run.transition(RunState::Simulating).unwrap_err();

        assert_eq!(err.from, "idle");
        assert_eq!(err.to, "simulating");
        assert_eq!(run.state, RunState::Idle);
    }

    #[test]
    fn test_idle_cannot_fail() {
        let mut run = PipelineRun::new(false);
        assert!(run.fail(Stage::Build, Some(1), "nope").is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut run = PipelineRun::new(false);
        run.transition(RunState::Building).unwrap();
        run.fail(Stage::Build, Some(2), "exited with code 2").unwrap();

        assert!(run.is_failed());
        assert!(run.transition(RunState::Optimizing).is_err());
        assert!(!run.visited(Stage::Optimize));
        assert_eq!(run.process_exit_code(), 2);
    }

    #[test]
    fn test_process_exit_code() {
        let mut run = PipelineRun::new(false);
        run.transition(RunState::Building).unwrap();
        run.fail(Stage::Build, None, "spawn failed").unwrap();
        assert_eq!(run.process_exit_code(), 1);

        let mut run = PipelineRun::new(false);
        run.transition(RunState::Building).unwrap();
        run.transition(RunState::Optimizing).unwrap();
        run.transition(RunState::Simulating).unwrap();
        run.exit_code = Some(3);
        run.transition(RunState::Done).unwrap();
        assert_eq!(run.process_exit_code(), 3);
    }

    #[test]
    fn test_state_serialization() {
        let state = RunState::Failed {
            stage: Stage::Optimize,
            reason: "exited with code 1".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""status":"failed""#));
        assert!(json.contains(r#""stage":"optimize""#));

        let parsed: RunState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
