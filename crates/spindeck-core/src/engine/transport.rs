//! TransportController - decoded-track ownership, playback cursor, gain
//!
//! The transport is the innermost pull source of a deck: it copies samples
//! from the loaded track into the output block at the current gain and
//! advances the cursor. All control mutations arrive between blocks (via the
//! engine command drain), so plain fields are safe here - the struct is owned
//! by the audio thread after setup.

use basedrop::Shared;

use crate::audio_file::LoadedTrack;
use crate::types::{PlayState, StereoBuffer, StereoSample};

use super::BlockSource;

pub struct TransportController {
    /// Currently loaded track (None renders silence).
    /// `Shared` defers the old track's deallocation to the GC thread when a
    /// load replaces it mid-session.
    track: Option<Shared<LoadedTrack>>,
    /// Playhead position in samples
    position: usize,
    state: PlayState,
    /// Target gain, applied from the start of the next block
    gain: f32,
    /// Gain actually reached at the end of the previous block; the render
    /// ramps from here to `gain` across one block to avoid a step
    applied_gain: f32,
    /// Sample rate from `prepare` (0 = not prepared)
    sample_rate: u32,
}

impl TransportController {
    pub fn new() -> Self {
        Self {
            track: None,
            position: 0,
            state: PlayState::Stopped,
            gain: 1.0,
            applied_gain: 1.0,
            sample_rate: 0,
        }
    }

    /// Load a track, or detach the current one with `None`.
    ///
    /// `load(None)` stops playback, clears the cursor and releases the track
    /// (idempotent). Loading a track replaces the old handle only after the
    /// new one is in place; the old allocation is reclaimed off-thread.
    pub fn load(&mut self, track: Option<Shared<LoadedTrack>>) {
        // The old handle drops here; its memory is reclaimed by the GC
        // thread, not the audio thread.
        self.track = track;
        self.position = 0;
        self.state = PlayState::Stopped;
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    pub fn track(&self) -> Option<&Shared<LoadedTrack>> {
        self.track.as_ref()
    }

    /// Set output gain. Values outside [0, 1] are rejected and leave the
    /// prior gain unchanged.
    pub fn set_gain(&mut self, gain: f32) {
        if !(0.0..=1.0).contains(&gain) {
            log::warn!("transport: gain {} out of range [0, 1], ignored", gain);
            return;
        }
        self.gain = gain;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn start(&mut self) {
        if self.track.is_some() {
            self.state = PlayState::Playing;
        }
    }

    /// Pause playback. The cursor stays where it is, unlike `load(None)`.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Cursor position in samples
    pub fn position(&self) -> usize {
        self.position
    }

    /// Seek to an absolute position in seconds
    pub fn set_position_seconds(&mut self, seconds: f64) {
        if seconds < 0.0 {
            log::warn!("transport: negative seek position {}, ignored", seconds);
            return;
        }
        let Some(track) = &self.track else {
            log::warn!("transport: seek with no track loaded, ignored");
            return;
        };
        let target = (seconds * self.sample_rate as f64) as usize;
        self.position = target.min(track.duration_samples().saturating_sub(1));
    }

    /// Seek to a position relative to the track length, r in [0, 1].
    /// Out-of-range input is rejected with no state change.
    pub fn set_position_relative(&mut self, relative: f64) {
        if !(0.0..=1.0).contains(&relative) {
            log::warn!(
                "transport: relative position {} out of range [0, 1], ignored",
                relative
            );
            return;
        }
        let seconds = self.length_seconds() * relative;
        self.set_position_seconds(seconds);
    }

    /// Cursor position as a fraction of the track length.
    /// Returns 0 when no track is loaded or the length is unknown.
    pub fn position_relative(&self) -> f64 {
        let duration = self
            .track
            .as_ref()
            .map(|t| t.duration_samples())
            .unwrap_or(0);
        if duration == 0 {
            return 0.0;
        }
        self.position as f64 / duration as f64
    }

    pub fn position_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.position as f64 / self.sample_rate as f64
    }

    /// Nominal track length in seconds (0 when nothing is loaded)
    pub fn length_seconds(&self) -> f64 {
        self.track.as_ref().map(|t| t.length_seconds()).unwrap_or(0.0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl BlockSource for TransportController {
    fn prepare(&mut self, _block_size: usize, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.applied_gain = self.gain;
    }

    /// Real-time entry point: copy the next `out.len()` samples at the
    /// current gain, advancing the cursor. Past end of stream the block is
    /// padded with silence and the transport stops - never an error.
    fn render_block(&mut self, out: &mut StereoBuffer) {
        let n = out.len();
        if n == 0 {
            return;
        }

        let (Some(track), PlayState::Playing) = (&self.track, self.state) else {
            out.fill_silence();
            self.applied_gain = self.gain;
            return;
        };

        let duration = track.duration_samples();
        let g0 = self.applied_gain;
        let g1 = self.gain;
        let step = (g1 - g0) / n as f32;

        let samples = &track.samples;
        let dst = out.as_mut_slice();
        for (i, slot) in dst.iter_mut().enumerate() {
            let read_pos = self.position + i;
            let g = g0 + step * (i + 1) as f32;
            *slot = if read_pos < duration {
                samples[read_pos] * g
            } else {
                StereoSample::silence()
            };
        }
        self.applied_gain = g1;

        self.position += n;
        if self.position >= duration {
            self.position = duration.saturating_sub(1);
            self.state = PlayState::Stopped;
        }
    }

    fn release(&mut self) {
        self.sample_rate = 0;
    }
}

impl Default for TransportController {
    fn default() -> Self {
        Self::new()
    }
}
