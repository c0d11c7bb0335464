//! Audio file loading
//!
//! Decodes an audio file (mp3/flac/wav/ogg via symphonia) into a fully
//! in-memory stereo `LoadedTrack` at the engine sample rate. Keeping tracks
//! decoded in RAM means the render path is a bounds-checked copy, never disk
//! I/O. Sample-rate conversion happens once here, at load time, through
//! rubato - the engine's own resampling stage is reserved for the playback
//! speed control.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{Sample, StereoSample};

/// Errors that can occur while loading a track
#[derive(Error, Debug)]
pub enum TrackLoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt file: {0}")]
    Unsupported(String),

    #[error("file contains no decodable audio track")]
    NoAudioTrack,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("file decoded to zero samples")]
    Empty,

    #[error("sample rate conversion failed: {0}")]
    Resample(String),
}

/// A fully decoded track, ready for the render thread
///
/// Immutable once constructed; decks share it through
/// `basedrop::Shared<LoadedTrack>` so replacing it never frees memory on the
/// audio thread.
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    /// Stereo samples at the engine sample rate
    pub samples: Vec<StereoSample>,
    /// Sample rate the samples are stored at (== engine rate)
    pub sample_rate: u32,
    /// Source file, for display and logging
    pub path: PathBuf,
}

impl LoadedTrack {
    /// Build a track from raw samples (used by tests and tone generators)
    pub fn from_samples(samples: Vec<StereoSample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            path: PathBuf::new(),
        }
    }

    /// Track length in samples
    pub fn duration_samples(&self) -> usize {
        self.samples.len()
    }

    /// Nominal track length in seconds (from metadata, unaffected by the
    /// playback speed setting)
    pub fn length_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a file into a `LoadedTrack` at `target_rate`.
///
/// Blocking and allocation-heavy - call from a loader thread, never from the
/// audio callback.
pub fn load_track(path: &Path, target_rate: u32) -> Result<LoadedTrack, TrackLoadError> {
    let (samples, source_rate) = decode_file(path)?;
    if samples.is_empty() {
        return Err(TrackLoadError::Empty);
    }

    let samples = if source_rate == target_rate {
        samples
    } else {
        log::info!(
            "resampling {:?} from {}Hz to {}Hz",
            path.file_name().unwrap_or_default(),
            source_rate,
            target_rate
        );
        resample_stereo(&samples, source_rate, target_rate)?
    };

    log::info!(
        "loaded {:?}: {} samples ({:.1}s) at {}Hz",
        path.file_name().unwrap_or_default(),
        samples.len(),
        samples.len() as f64 / target_rate as f64,
        target_rate
    );

    Ok(LoadedTrack {
        samples,
        sample_rate: target_rate,
        path: path.to_path_buf(),
    })
}

/// Decode the whole file to stereo f32 at its native rate
fn decode_file(path: &Path) -> Result<(Vec<StereoSample>, u32), TrackLoadError> {
    let file = File::open(path).map_err(|source| TrackLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| TrackLoadError::Unsupported(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(TrackLoadError::NoAudioTrack)?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| TrackLoadError::Unsupported(e.to_string()))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);

    let mut interleaved: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream is reported as an IO error in symphonia 0.5
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(TrackLoadError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate == 0 {
                    sample_rate = spec.rate;
                }
                if channels == 0 {
                    channels = spec.channels.count();
                }
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                });
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
            // A corrupt packet is skippable; a fatal error is not
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("skipping corrupt packet in {:?}: {}", path, e);
            }
            Err(e) => return Err(TrackLoadError::Decode(e.to_string())),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(TrackLoadError::NoAudioTrack);
    }

    Ok((interleaved_to_stereo(&interleaved, channels), sample_rate))
}

/// Fold an interleaved buffer of any channel count down to stereo.
/// Mono is duplicated; extra channels beyond the first two are dropped.
fn interleaved_to_stereo(interleaved: &[Sample], channels: usize) -> Vec<StereoSample> {
    match channels {
        0 => Vec::new(),
        1 => interleaved.iter().map(|&s| StereoSample::mono(s)).collect(),
        n => interleaved
            .chunks_exact(n)
            .map(|frame| StereoSample::new(frame[0], frame[1]))
            .collect(),
    }
}

/// Offline stereo sample-rate conversion via rubato's windowed-sinc resampler
fn resample_stereo(
    samples: &[StereoSample],
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<StereoSample>, TrackLoadError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    const CHUNK: usize = 1024;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        CHUNK,
        2,
    )
    .map_err(|e| TrackLoadError::Resample(e.to_string()))?;

    let left: Vec<f32> = samples.iter().map(|s| s.left).collect();
    let right: Vec<f32> = samples.iter().map(|s| s.right).collect();

    let expected_len =
        (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();

    let mut out: Vec<StereoSample> = Vec::with_capacity(expected_len + CHUNK);
    let mut push_output = |chans: &[Vec<f32>]| {
        for (&l, &r) in chans[0].iter().zip(chans[1].iter()) {
            out.push(StereoSample::new(l, r));
        }
    };

    let mut pos = 0;
    while pos + CHUNK <= left.len() {
        let chans = resampler
            .process(&[&left[pos..pos + CHUNK], &right[pos..pos + CHUNK]], None)
            .map_err(|e| TrackLoadError::Resample(e.to_string()))?;
        push_output(&chans);
        pos += CHUNK;
    }

    // Feed the remainder, then flush the sinc filter tail
    let chans = resampler
        .process_partial(Some(&[&left[pos..], &right[pos..]]), None)
        .map_err(|e| TrackLoadError::Resample(e.to_string()))?;
    push_output(&chans);
    let chans = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| TrackLoadError::Resample(e.to_string()))?;
    push_output(&chans);

    // Strip the resampler's group delay and trim to the expected length
    let mut out: Vec<StereoSample> = out.into_iter().skip(delay).collect();
    out.truncate(expected_len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_is_duplicated_to_both_channels() {
        let stereo = interleaved_to_stereo(&[0.1, 0.2, 0.3], 1);
        assert_eq!(stereo.len(), 3);
        assert_eq!(stereo[1], StereoSample::new(0.2, 0.2));
    }

    #[test]
    fn multichannel_keeps_first_pair() {
        let stereo = interleaved_to_stereo(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3);
        assert_eq!(stereo.len(), 2);
        assert_eq!(stereo[0], StereoSample::new(1.0, 2.0));
        assert_eq!(stereo[1], StereoSample::new(4.0, 5.0));
    }

    #[test]
    fn length_seconds_guards_zero_rate() {
        let track = LoadedTrack::from_samples(vec![StereoSample::silence(); 100], 0);
        assert_eq!(track.length_seconds(), 0.0);
    }

    #[test]
    fn resample_preserves_duration_within_tolerance() {
        let samples = vec![StereoSample::mono(0.5); 44100];
        let out = resample_stereo(&samples, 44100, 48000).unwrap();
        assert_eq!(out.len(), 48000);
        // Constant input stays constant away from the filter edges
        assert!((out[24000].left - 0.5).abs() < 0.01);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_track(Path::new("/nonexistent/no-such-track.flac"), 48000).unwrap_err();
        assert!(matches!(err, TrackLoadError::Io { .. }));
    }
}
