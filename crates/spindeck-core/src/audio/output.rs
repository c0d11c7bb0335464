//! cpal output stream
//!
//! One stereo output stream. The `AudioEngine` moves into the stream callback
//! and is owned there exclusively; the control side keeps only the lock-free
//! command sender and the deck monitors, so the callback never contends with
//! another thread:
//!
//! ```text
//! control thread ──send()──► command queue (SPSC) ──pop()──► cpal callback
//!                                                            (owns AudioEngine)
//! control thread ◄──relaxed atomic loads── DeckMonitor ◄──── publish per block
//! ```

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use crate::engine::{AudioEngine, BlockSource, CommandSender, DeckMonitor, MAX_BLOCK_SIZE};
use crate::types::{StereoBuffer, DEFAULT_SAMPLE_RATE};

use super::config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE};
use super::device::{find_device_by_id, get_default_device};
use super::error::{AudioError, AudioResult};

/// Keeps the output stream alive. Drop this to stop audio.
pub struct AudioOutputHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioOutputHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer size in frames, as negotiated with the device
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Everything the control side needs after the audio system starts
pub struct AudioSystemResult {
    pub handle: AudioOutputHandle,
    pub commands: CommandSender,
    pub monitors: Vec<Arc<DeckMonitor>>,
    pub sample_rate: u32,
    pub buffer_size: u32,
}

/// Start the audio output: pick a device, negotiate a config, build the
/// engine and hand it to the stream callback.
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let device = match &config.output_device {
        Some(id) => find_device_by_id(id)?,
        None => get_default_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("using audio device: {}", device_name);

    let (supported_config, buffer_size) = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    log::info!(
        "audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        (buffer_size as f32 / sample_rate as f32) * 1000.0
    );

    let (mut engine, commands, monitors) = AudioEngine::new();
    engine.prepare(buffer_size as usize, sample_rate);

    let stream = build_output_stream(&device, &stream_config, engine)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("audio stream started");

    Ok(AudioSystemResult {
        handle: AudioOutputHandle {
            _stream: stream,
            sample_rate,
            buffer_size,
        },
        commands,
        monitors,
        sample_rate,
        buffer_size,
    })
}

/// Pick the best output configuration for a device.
/// Returns (SupportedStreamConfig, buffer size in frames).
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "no supported output configurations".to_string(),
        ));
    }

    let target_sample_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);

    // Prefer f32 stereo at the target rate; degrade gracefully from there
    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| {
            target_sample_rate >= c.min_sample_rate().0
                && target_sample_rate <= c.max_sample_rate().0
        })
        .or_else(|| supported_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported_configs.first())
        .ok_or_else(|| {
            AudioError::ConfigError("no suitable output configuration found".to_string())
        })?;

    let sample_rate = if target_sample_rate >= best_config.min_sample_rate().0
        && target_sample_rate <= best_config.max_sample_rate().0
    {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "audio device doesn't support {}Hz, falling back to {}Hz (tracks will be resampled)",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    let stream_config = best_config.clone().with_sample_rate(sample_rate);

    let buffer_size = match config.buffer_size {
        BufferSize::Default => DEFAULT_BUFFER_SIZE,
        BufferSize::Fixed(frames) => frames.clamp(64, MAX_BLOCK_SIZE as u32),
    };

    Ok((stream_config, buffer_size))
}

/// Build the output stream. The engine and a pre-allocated render buffer
/// move into the callback; everything inside is allocation-free.
fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: AudioEngine,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut buffer = StereoBuffer::silence(MAX_BLOCK_SIZE);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let n_frames = (data.len() / channels).min(MAX_BLOCK_SIZE);
                buffer.set_len_from_capacity(n_frames);
                engine.render_block(&mut buffer);

                let samples = buffer.as_slice();
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    if i < samples.len() {
                        let sample = samples[i];
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    } else {
                        for ch in frame.iter_mut() {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}
