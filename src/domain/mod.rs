//! Domain types for the simloop pipeline.
//!
//! This module contains the core data structures:
//! - Artifact: Files passed from one stage to the next
//! - Run: Transient state of one pipeline execution
//! - Stage: Process invocations and the events they stream back

pub mod artifact;
pub mod run;
pub mod stage;

// Re-export commonly used types
pub use artifact::{format_kb, Artifact, ArtifactKind};
pub use run::{PipelineRun, RunState, TransitionError};
pub use stage::{Stage, StageEvent, StageInvocation, StdioMode, StreamId};
