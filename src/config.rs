//! Configuration for the simloop pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SIMLOOP_ROOT, SIMLOOP_TARGET, SIMLOOP_PROJECT,
//!    SIMLOOP_BUILD, SIMLOOP_OPTIMIZER, SIMLOOP_SIMULATOR, SIMLOOP_PLAYER)
//! 2. Config file (.simloop/config.yaml, or ~/.config/simloop/config.yaml)
//! 3. Defaults (current directory, wasm32-wasi, bundled tool locations)
//!
//! Config file discovery:
//! - Searches current directory and parents for .simloop/config.yaml
//! - The directory holding .simloop/ becomes the project root
//! - Relative tool paths are resolved against the project root

use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod paths;

pub use paths::ArtifactPaths;

/// Directory name marking a project root
pub const CONFIG_DIR: &str = ".simloop";

/// Config file name inside `CONFIG_DIR`
pub const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_TARGET: &str = "wasm32-wasi";

/// Imports the optimizer turns into cooperative yield points
pub const DEFAULT_YIELD_IMPORTS: &[&str] = &[
    "wasi_snapshot_preview1.sched_yield",
    "protologic.black_box_yield1",
    "protologic.black_box_yield2",
    "protologic.black_box_yield3",
    "protologic.black_box_yield4",
    "protologic.black_box_yield5",
];

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub optimizer: Option<OptimizerConfig>,
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// Crate name as it appears in the wasm file name
    pub name: Option<String>,
    /// Target platform triple
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    pub build: Option<String>,
    pub optimizer: Option<String>,
    pub simulator: Option<String>,
    pub player: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerConfig {
    pub yield_imports: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Where FILE_SINK lines are written (relative to project root)
    pub file_log: Option<String>,
    pub forward_interrupts: Option<bool>,
}

/// Executables for each stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    pub build: PathBuf,
    pub optimizer: PathBuf,
    pub simulator: PathBuf,
    pub player: PathBuf,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Absolute path to the project being built
    pub root: PathBuf,
    /// Crate name used in artifact file names
    pub project_name: String,
    /// Compilation target triple
    pub target_triple: String,
    /// Stage executables
    pub tools: ToolPaths,
    /// Symbols handed to the optimizer's asyncify pass
    pub yield_imports: Vec<String>,
    /// FILE_SINK destination
    pub file_log: PathBuf,
    /// Forward Ctrl+C to the simulator's process group
    pub forward_interrupts: bool,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Load configuration from all sources.
    ///
    /// `explicit` skips discovery and reads that file instead.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;

        let config_file = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(&cwd),
        };

        let parsed = match config_file {
            Some(ref path) => Some(load_config_file(path)?),
            None => None,
        };

        Ok(resolve(
            &cwd,
            config_file,
            parsed,
            |key| std::env::var(key).ok(),
        ))
    }

    /// Artifact locations for this project
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::resolve(&self.root, &self.target_triple, &self.project_name)
    }
}

/// Find config file by searching `start` and its parents, then the user config dir
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("simloop").join(CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Bare command names stay as PATH lookups; anything with a separator is a path
fn resolve_tool(root: &Path, value: &str) -> PathBuf {
    if value.contains('/') || value.contains('\\') {
        resolve_path(root, value)
    } else {
        PathBuf::from(value)
    }
}

/// Cargo names the wasm output after the crate, with `-` replaced by `_`
fn default_project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().replace('-', "_"))
        .unwrap_or_else(|| "main".to_string())
}

/// Merge file, env and defaults into a `ResolvedConfig`
fn resolve(
    cwd: &Path,
    config_file: Option<PathBuf>,
    parsed: Option<ConfigFile>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Root is the parent of .simloop/ for project-local config files
    let file_root = config_file.as_ref().and_then(|path| {
        let dir = path.parent()?;
        if dir.file_name()? == CONFIG_DIR {
            dir.parent().map(Path::to_path_buf)
        } else {
            None
        }
    });

    let root = env("SIMLOOP_ROOT")
        .map(|r| resolve_path(cwd, &r))
        .or(file_root)
        .unwrap_or_else(|| cwd.to_path_buf());

    let (project, tools, optimizer, simulation) = match parsed {
        Some(file) => (file.project, file.tools, file.optimizer, file.simulation),
        None => (ProjectConfig::default(), ToolsConfig::default(), None, None),
    };

    let project_name = env("SIMLOOP_PROJECT")
        .or(project.name)
        .unwrap_or_else(|| default_project_name(&root));

    let target_triple = env("SIMLOOP_TARGET")
        .or(project.target)
        .unwrap_or_else(|| DEFAULT_TARGET.to_string());

    let tool = |env_key: &str, configured: Option<String>, default: String| {
        let value = env(env_key).or(configured).unwrap_or(default);
        resolve_tool(&root, &value)
    };

    let tools = ToolPaths {
        build: tool("SIMLOOP_BUILD", tools.build, "cargo".to_string()),
        optimizer: tool(
            "SIMLOOP_OPTIMIZER",
            tools.optimizer,
            format!("binaryen/bin/wasm-opt{}", EXE_SUFFIX),
        ),
        simulator: tool(
            "SIMLOOP_SIMULATOR",
            tools.simulator,
            format!("sim/Protologic.Terminal{}", EXE_SUFFIX),
        ),
        player: tool(
            "SIMLOOP_PLAYER",
            tools.player,
            format!("player/SaturnsEnvy{}", EXE_SUFFIX),
        ),
    };

    let yield_imports = optimizer
        .and_then(|o| o.yield_imports)
        .unwrap_or_else(|| DEFAULT_YIELD_IMPORTS.iter().map(|s| s.to_string()).collect());

    let file_log = simulation
        .as_ref()
        .and_then(|s| s.file_log.as_deref())
        .map(|p| resolve_path(&root, p))
        .unwrap_or_else(|| root.join("target").join("sim_file.log"));

    let forward_interrupts = simulation
        .as_ref()
        .and_then(|s| s.forward_interrupts)
        .unwrap_or(true);

    ResolvedConfig {
        root,
        project_name,
        target_triple,
        tools,
        yield_imports,
        file_log,
        forward_interrupts,
        config_file,
    }
}
