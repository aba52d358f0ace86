//! Command-line contracts of the external tools.
//!
//! Each builder returns the exact argument vector a stage expects. Paths are
//! taken from `ArtifactPaths` so each stage's output is the next one's input.

use crate::config::{ArtifactPaths, ResolvedConfig};
use crate::domain::{Stage, StageInvocation, StdioMode};

/// Optimizer flags that follow the asyncify pass arguments
const OPTIMIZER_FEATURE_FLAGS: &[&str] = &[
    "--enable-bulk-memory",
    "--enable-nontrapping-float-to-int",
    "--enable-simd",
    "-O4",
];

/// `cargo build --target {triple} --release`
pub fn build(config: &ResolvedConfig) -> StageInvocation {
    StageInvocation::new(Stage::Build, &config.tools.build, StdioMode::Inherited)
        .arg("build")
        .arg("--target")
        .arg(config.target_triple.as_str())
        .arg("--release")
}

/// `wasm-opt {raw} -o {optimized} --strip-dwarf --asyncify ... -O4`
pub fn optimize(config: &ResolvedConfig, paths: &ArtifactPaths) -> StageInvocation {
    StageInvocation::new(Stage::Optimize, &config.tools.optimizer, StdioMode::Piped)
        .arg(paths.raw_build.display().to_string())
        .arg("-o")
        .arg(paths.optimized.display().to_string())
        .arg("--strip-dwarf")
        .arg("--asyncify")
        .arg(format!(
            "--pass-arg=asyncify-imports@{}",
            config.yield_imports.join(",")
        ))
        .args(OPTIMIZER_FEATURE_FLAGS.iter().copied())
}

/// `-f {optimized} {optimized} -d true false -o {optimized}`
///
/// Both slots run the same program; the `-d` pair marks slot A deterministic
/// and slot B not. The simulator appends `.json.deflate` to the `-o` path.
///
/// With interrupt forwarding off the simulator stays in the terminal's process
/// group, so a Ctrl+C that ends simloop ends the simulator too.
pub fn simulate(config: &ResolvedConfig, paths: &ArtifactPaths) -> StageInvocation {
    let program = paths.optimized.display().to_string();

    let invocation =
        StageInvocation::new(Stage::Simulate, &config.tools.simulator, StdioMode::Piped)
            .arg("-f")
            .arg(program.as_str())
            .arg(program.as_str())
            .arg("-d")
            .arg("true")
            .arg("false")
            .arg("-o")
            .arg(program);

    if config.forward_interrupts {
        invocation.in_own_process_group()
    } else {
        invocation
    }
}

/// `{player} {replay}`
pub fn playback(config: &ResolvedConfig, paths: &ArtifactPaths) -> StageInvocation {
    StageInvocation::new(Stage::Playback, &config.tools.player, StdioMode::Null)
        .arg(paths.replay.display().to_string())
}
