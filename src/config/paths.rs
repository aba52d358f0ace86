//! Canonical artifact paths for one project.
//!
//! Single source of truth - every stage gets its input and output paths
//! from here instead of formatting them itself.
//!
//! ## Layout
//!
//! | Artifact | Path |
//! |----------|------|
//! | Raw build | `{root}/target/{triple}/release/{project}.wasm` |
//! | Optimized | `{root}/target/{triple}/release/opt_{project}.wasm` |
//! | Replay | `{optimized}.json.deflate` |
//!
//! Nothing here touches the filesystem; paths need not exist yet.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::{Artifact, ArtifactKind};

/// File name prefix the optimizer output carries
pub const OPTIMIZED_PREFIX: &str = "opt_";

/// Suffix the simulator appends to its `-o` path for the replay
pub const REPLAY_SUFFIX: &str = ".json.deflate";

/// The three artifacts of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub raw_build: PathBuf,
    pub optimized: PathBuf,
    pub replay: PathBuf,
}

impl ArtifactPaths {
    /// Compute all paths from the project layout
    pub fn resolve(root: &Path, target_triple: &str, project: &str) -> Self {
        Self::from_raw_build(raw_build_path(root, target_triple, project))
    }

    /// Derive the downstream paths from an already-known raw build path
    pub fn from_raw_build(raw_build: PathBuf) -> Self {
        let optimized = optimized_path(&raw_build);
        let replay = replay_path(&optimized);
        Self {
            raw_build,
            optimized,
            replay,
        }
    }

    pub fn raw_build_artifact(&self) -> Artifact {
        Artifact::new(ArtifactKind::RawBuild, &self.raw_build)
    }

    pub fn optimized_artifact(&self) -> Artifact {
        Artifact::new(ArtifactKind::Optimized, &self.optimized)
    }

    pub fn replay_artifact(&self) -> Artifact {
        Artifact::new(ArtifactKind::Replay, &self.replay)
    }
}

/// `{root}/target/{triple}/release/{project}.wasm`
pub fn release_dir(root: &Path, target_triple: &str) -> PathBuf {
    root.join("target").join(target_triple).join("release")
}

pub fn raw_build_path(root: &Path, target_triple: &str, project: &str) -> PathBuf {
    release_dir(root, target_triple).join(format!("{}.wasm", project))
}

/// Same directory as the raw build, file name prefixed with `opt_`
pub fn optimized_path(raw_build: &Path) -> PathBuf {
    let mut name = OsString::from(OPTIMIZED_PREFIX);
    if let Some(file_name) = raw_build.file_name() {
        name.push(file_name);
    }
    raw_build.with_file_name(name)
}

/// The simulator writes its replay next to the optimized binary
pub fn replay_path(optimized: &Path) -> PathBuf {
    let mut path = optimized.as_os_str().to_owned();
    path.push(REPLAY_SUFFIX);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = ArtifactPaths::resolve(Path::new("/work/fleet"), "wasm32-wasi", "fleet");

        assert_eq!(
            paths.raw_build,
            PathBuf::from("/work/fleet/target/wasm32-wasi/release/fleet.wasm")
        );
        assert_eq!(
            paths.optimized,
            PathBuf::from("/work/fleet/target/wasm32-wasi/release/opt_fleet.wasm")
        );
        assert_eq!(
            paths.replay,
            PathBuf::from("/work/fleet/target/wasm32-wasi/release/opt_fleet.wasm.json.deflate")
        );
    }

    #[test]
    fn test_optimized_keeps_directory() {
        let raw = Path::new("/a/b/thing.wasm");
        let opt = optimized_path(raw);
        assert_eq!(opt.parent(), raw.parent());
        assert_eq!(opt.file_name().unwrap(), "opt_thing.wasm");
    }

    #[test]
    fn test_artifact_kinds() {
        let paths = ArtifactPaths::resolve(Path::new("/p"), "wasm32-wasi", "x");
        assert_eq!(paths.raw_build_artifact().kind, ArtifactKind::RawBuild);
        assert_eq!(paths.optimized_artifact().path, paths.optimized);
        assert_eq!(paths.replay_artifact().kind, ArtifactKind::Replay);
    }
}
