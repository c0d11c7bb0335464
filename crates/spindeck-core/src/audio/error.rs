//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while setting up the audio output
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output devices found")]
    NoDevices,

    #[error("failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to get device config: {0}")]
    ConfigError(String),

    #[error("failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("failed to start audio stream: {0}")]
    StreamPlayError(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
