//! Artifacts produced by pipeline stages.
//!
//! Artifacts are files on disk. One stage writes them, the next reads them,
//! and nothing in the pipeline ever deletes them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file produced by one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// What this file is
    pub kind: ArtifactKind,

    /// Absolute location (may not exist yet)
    pub path: PathBuf,
}

impl Artifact {
    /// Create a new artifact reference
    pub fn new(kind: ArtifactKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size on disk in bytes
    pub async fn size_bytes(&self) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }
}

/// Types of artifacts the pipeline moves between stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Compiler output, untouched
    RawBuild,

    /// Optimizer output fed to the simulator
    Optimized,

    /// Compressed replay written by the simulator
    Replay,
}

/// Format a byte count the way the run summary reports it (rounded kilobytes)
pub fn format_kb(bytes: u64) -> String {
    format!("{}kb", (bytes + 500) / 1000)
}
