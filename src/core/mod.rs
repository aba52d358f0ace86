//! Core orchestration logic.
//!
//! This module contains:
//! - Classifier: Demultiplexes simulator output by marker substrings
//! - LogSink: Console and file destinations for classified lines
//! - Invocations: Command-line contracts of the external tools
//! - Playback: Detached replay viewer launch
//! - Orchestrator: Stage sequencing

pub mod classifier;
pub mod invocations;
pub mod log_sink;
pub mod orchestrator;
pub mod playback;

// Re-export commonly used types
pub use classifier::{classify, ClassifiedLine, LineClassifier, MarkerClassifier, Slot};
pub use log_sink::{LogSink, MemorySink, RouteCounts, TerminalSink};
pub use orchestrator::{InterruptFuture, InterruptSource, Orchestrator};
pub use playback::PlaybackLauncher;
