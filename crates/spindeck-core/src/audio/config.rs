//! Audio output configuration

use serde::{Deserialize, Serialize};

/// Default buffer size when no preference is specified (frames).
/// 512 frames (~10.7ms at 48kHz) is a safe default on most systems.
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the system choose
    #[default]
    Default,
    /// Request a specific size in frames (the device may adjust it)
    Fixed(u32),
}

impl BufferSize {
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some(*frames),
        }
    }
}

/// Audio device identifier
///
/// Carries the host backend alongside the device name so a device can be
/// picked from a specific host (ALSA vs JACK vs PulseAudio) on systems with
/// several backends available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g. "ALSA", "JACK"); None = any host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio output stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub output_device: Option<DeviceId>,

    /// Preferred buffer size
    #[serde(default)]
    pub buffer_size: BufferSize,

    /// Preferred sample rate (None = 48kHz, falling back to what the
    /// device supports)
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.output_device = Some(device);
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = AudioConfig::default()
            .with_device(DeviceId::with_host("hw:0,0", "ALSA"))
            .with_buffer_frames(256)
            .with_sample_rate(44100);

        assert_eq!(config.buffer_size.as_frames(), Some(256));
        assert_eq!(config.sample_rate, Some(44100));
        assert_eq!(
            config.output_device.unwrap().display_label(),
            "[ALSA] hw:0,0"
        );
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = AudioConfig::default().with_buffer_frames(128);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: AudioConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.buffer_size, BufferSize::Fixed(128));
        assert!(back.output_device.is_none());
    }
}
