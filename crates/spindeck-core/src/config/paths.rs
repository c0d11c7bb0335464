//! Player configuration and its standard location

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;

/// Top-level player configuration, persisted as YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,
    /// Default playback speed applied to newly loaded decks
    #[serde(default)]
    pub default_speed: Option<f64>,
}

/// Standard config file location: `~/.config/spindeck/{filename}`
/// (platform equivalent via `dirs`)
pub fn default_config_path(filename: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spindeck")
        .join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_includes_app_dir_and_filename() {
        let path = default_config_path("config.yaml");
        assert!(path.ends_with("spindeck/config.yaml"));
    }

    #[test]
    fn player_config_defaults_are_serializable() {
        let yaml = serde_yaml::to_string(&PlayerConfig::default()).unwrap();
        let back: PlayerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(back.default_speed.is_none());
    }
}
