use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use chunkmap::{InputFaultPolicy, ParallelConfig};

/// Project-level defaults file looked up from the working directory upwards
pub const PROJECT_CONFIG_NAME: &str = ".chunkmap.json";

/// Input fault policy used when the config file does not name one
///
/// Line readers stay usable after an undecodable line, and end their input
/// on a read error, so resuming is safe for them.
pub const DEFAULT_LINE_POLICY: InputFaultPolicy = InputFaultPolicy::Resume;

fn line_defaults() -> ParallelConfig {
    ParallelConfig::default().with_input_fault_policy(DEFAULT_LINE_POLICY)
}

/// Find project-level config by walking up directory tree
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let config_path = current.join(PROJECT_CONFIG_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }
        if !current.pop() {
            // Reached filesystem root
            return None;
        }
    }
}

/// Load defaults from `explicit`, else the nearest project file, else built-ins
pub fn load_config(explicit: Option<&Path>) -> Result<(ParallelConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::current_dir()
            .ok()
            .and_then(|dir| find_project_config(&dir)),
    };

    let Some(path) = path else {
        return Ok((line_defaults(), None));
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    let names_policy = value.get("input_fault_policy").is_some();
    let mut config: ParallelConfig = serde_json::from_value(value)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    if !names_policy {
        config.input_fault_policy = DEFAULT_LINE_POLICY;
    }
    Ok((config, Some(path)))
}
