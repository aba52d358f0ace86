//! simloop - Build, optimize, simulate and replay loop
//!
//! Drives the local development cycle for a wasm program that competes
//! inside an external simulator.
//!
//! # Pipeline
//!
//! ```text
//! cargo build ──▶ wasm-opt (asyncify) ──▶ simulator (slot A vs slot B) ──▶ [player]
//!   {project}.wasm    opt_{project}.wasm      opt_{project}.wasm.json.deflate
//! ```
//!
//! Each stage is an opaque external process. A nonzero exit ends the run;
//! nothing is retried. The player is launched detached and outlives simloop.
//!
//! # Modules
//!
//! - `adapters`: Process launching (`StageRunner`, `ProcessRunner`)
//! - `core`: Orchestration logic (Orchestrator, Classifier, LogSink)
//! - `domain`: Data structures (PipelineRun, Stage, Artifact)
//! - `config`: Configuration and artifact paths
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Build, optimize and simulate
//! simloop
//!
//! # Same, then open the replay (any extra word works too)
//! simloop --play
//! simloop play
//!
//! # Reopen the last replay
//! simloop --play-only
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{ProcessRunner, StageError, StageRunner};
pub use config::{ArtifactPaths, ResolvedConfig};
pub use crate::core::{classify, ClassifiedLine, Orchestrator};
pub use domain::{PipelineRun, RunState, Stage};
