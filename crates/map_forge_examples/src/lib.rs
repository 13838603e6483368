#![forbid(unsafe_code)]
//! Shared helpers for the map_forge example binaries.
use std::fs;
use std::path::Path;

use anyhow::Context;
use map_forge::prelude::{GeneratedMap, GenerationConfig, MapMask};

/// Route `tracing` output through `env_logger`. Defaults to `info` unless `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

/// Load a [`GenerationConfig`] from a RON file. Missing fields keep their defaults.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<GenerationConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: GenerationConfig =
        ron::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

/// Config from the first CLI argument, or the bundled default.
pub fn config_from_args() -> anyhow::Result<GenerationConfig> {
    match std::env::args().nth(1) {
        Some(path) => load_config(path),
        None => load_config(format!(
            "{}/assets/default.ron",
            env!("CARGO_MANIFEST_DIR")
        )),
    }
}

/// One line per output: stage, endpoint and a short description of the mask.
pub fn summarize(map: &GeneratedMap) -> Vec<String> {
    let mut lines = Vec::new();
    for (stage, outputs) in map.artifact.stages() {
        for (name, mask) in outputs {
            let detail = match mask {
                MapMask::Boolean(m) => format!("{} cells set", m.count()),
                MapMask::Float(m) => match m.min_max() {
                    Some((min, max)) => format!("range {min:.3}..{max:.3}"),
                    None => "empty".to_string(),
                },
                MapMask::Vector4(m) => {
                    let (w, h) = m.size();
                    format!("{w}x{h} vectors")
                }
            };
            lines.push(format!("{stage:<9} {name:<14} {detail}"));
        }
    }
    lines
}
