//! Generic YAML configuration I/O
//!
//! Works with any serializable configuration type. Loading is forgiving: a
//! missing or unparseable file falls back to defaults with a warning instead
//! of refusing to start the player.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file.
///
/// A missing file returns the default config; an invalid one logs a warning
/// and also returns the default.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("no config at {:?}, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => {
                log::info!("loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("failed to parse config {:?}: {}, using defaults", path, e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("failed to read config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("failed to write config file {:?}", path))?;

    log::info!("saved config to {:?}", path);
    Ok(())
}
