//! Configuration file discovery
//!
//! Finds the configuration file in standard locations.

use std::path::PathBuf;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./test-orchestrator.yaml",
    "./test-orchestrator.yml",
    "./.test-orchestrator.yaml",
    "./test-orchestrator.json",
    "~/.config/test-orchestrator/config.yaml",
    "~/.test-orchestrator.yaml",
];

/// Find configuration file in standard locations
pub fn find_config() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Expand ~ to home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
