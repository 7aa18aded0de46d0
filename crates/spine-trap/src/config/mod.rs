//! Configuration management following XDG Base Directory specification.

mod backtrace;
mod logging;

pub use backtrace::BacktraceConfig;
pub use logging::LogConfig;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name for XDG directories.
const APP_NAME: &str = "spine-trap";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub backtrace: BacktraceConfig,
}

/// Get the XDG config directory for this application.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}

/// Get the path to the config file.
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("spine-trap.toml"))
}

/// Load configuration from file, or return defaults if not found.
pub fn load_config() -> Config {
    let Some(config_path) = config_file_path() else {
        return Config::default();
    };

    if !config_path.exists() {
        return Config::default();
    }

    load_config_from_path(&config_path)
}

/// Load configuration from a specific path.
pub fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        log::warn!("Config file not found: {:?}", path);
        return Config::default();
    }

    match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Invalid config file {:?}: {}", path, e);
            Config::default()
        }),
        Err(e) => {
            log::warn!("Failed to read config file: {}", e);
            Config::default()
        }
    }
}

/// Generate default configuration as a TOML string with comments.
pub fn generate_default_config() -> anyhow::Result<String> {
    let toml_content = toml::to_string_pretty(&Config::default())?;

    let header = r#"# spine-trap configuration file
#
# [log] date_order: "mdy", "dmy" or "ymd"
# [backtrace] frames: stack frames printed on a segmentation fault (0 disables, max 64)

"#;

    Ok(format!("{}{}", header, toml_content))
}

/// Initialize a default configuration file at the XDG config location.
///
/// Returns the path where the config was written.
pub fn init_config(force: bool) -> anyhow::Result<PathBuf> {
    let config_path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    init_config_at(&config_path, force)?;
    Ok(config_path)
}

/// Write a default configuration file to `path`.
pub fn init_config_at(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, generate_default_config()?)?;
    Ok(())
}
