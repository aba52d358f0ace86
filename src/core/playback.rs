//! Replay viewer handoff.
//!
//! The viewer is fire-and-forget: launched detached, never awaited, and left
//! running after simloop exits.

use tracing::{info, warn};

use crate::adapters::{StageError, StageRunner};
use crate::config::{ArtifactPaths, ResolvedConfig};

use super::invocations;

/// Launches the replay viewer for a finished run
pub struct PlaybackLauncher<'a> {
    runner: &'a dyn StageRunner,
}

impl<'a> PlaybackLauncher<'a> {
    pub fn new(runner: &'a dyn StageRunner) -> Self {
        Self { runner }
    }

    /// Spawn the player on `paths.replay` and release it
    pub fn launch(&self, config: &ResolvedConfig, paths: &ArtifactPaths) -> Result<(), StageError> {
        if !paths.replay.exists() {
            warn!(replay = %paths.replay.display(), "Replay artifact not found; launching player anyway");
        }

        let invocation = invocations::playback(config, paths);
        self.runner.spawn_detached(&invocation)?;

        info!(replay = %paths.replay.display(), "Player launched");
        Ok(())
    }
}
