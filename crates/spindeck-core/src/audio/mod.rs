//! Audio output backend (cpal)

mod config;
mod device;
mod error;
mod output;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE};
pub use device::{find_device_by_id, get_default_device, get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
pub use output::{start_audio_system, AudioOutputHandle, AudioSystemResult};
