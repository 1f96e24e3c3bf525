//! Node Configuration
//!
//! Exact-line editing of the consensus engine's config.toml and read-only
//! access to the validator identity file. Everything else in the config is
//! the engine's business and is left byte-for-byte untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid validator key file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config has no {0} entry")]
    MissingKey(&'static str),
}

const PERSISTENT_PEERS_KEY: &str = "persistent_peers";

/// Overwrite the `persistent_peers` line in place, leaving every other line
/// untouched. The prior file is kept as a timestamped backup.
pub fn set_persistent_peers(config_path: &Path, peers: &str) -> Result<(), ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path.to_path_buf()));
    }

    let content = fs::read_to_string(config_path)?;
    let mut replaced = false;
    let mut lines: Vec<String> = Vec::new();
    for line in content.lines() {
        let key = line.split('=').next().map(str::trim);
        if !replaced && key == Some(PERSISTENT_PEERS_KEY) {
            lines.push(format!("{} = \"{}\"", PERSISTENT_PEERS_KEY, peers));
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        return Err(ConfigError::MissingKey(PERSISTENT_PEERS_KEY));
    }

    let backup = backup_path(config_path);
    fs::copy(config_path, &backup)?;
    info!(backup = %backup.display(), "prior config preserved");

    let mut output = lines.join("\n");
    output.push('\n');
    fs::write(config_path, output)?;

    Ok(())
}

fn backup_path(config_path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    config_path.with_extension(format!("toml.{}.bak", stamp))
}

#[derive(Debug, Deserialize)]
struct ValidatorKey {
    address: String,
}

/// Read the validator identity file for display. Never written.
pub fn read_validator_address(key_path: &Path) -> Result<String, ConfigError> {
    if !key_path.exists() {
        return Err(ConfigError::NotFound(key_path.to_path_buf()));
    }
    let content = fs::read_to_string(key_path)?;
    let key: ValidatorKey = serde_json::from_str(&content)?;
    Ok(key.address)
}
