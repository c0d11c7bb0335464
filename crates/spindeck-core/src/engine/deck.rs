//! DeckPipeline - one deck's complete signal chain
//!
//! transport -> resampler -> tone, rendered as a unit. The pipeline also
//! publishes playback state into a shared `DeckMonitor` after every block,
//! so UI threads poll position and state with relaxed atomic loads instead
//! of registering callbacks into the audio thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use crate::audio_file::LoadedTrack;
use crate::types::{PlayState, StereoBuffer};

use super::{BlockSource, ResamplingStage, ToneBand, ToneFilterStage, TransportController};

/// Lock-free snapshot of a deck's playback state, written by the audio
/// thread after each block and polled from anywhere.
///
/// f64 values are stored as raw bits in `AtomicU64`; each field is
/// individually consistent, which is all position display needs.
#[derive(Debug, Default)]
pub struct DeckMonitor {
    position_relative: AtomicU64,
    position_seconds: AtomicU64,
    length_seconds: AtomicU64,
    playing: AtomicBool,
    loaded: AtomicBool,
}

impl DeckMonitor {
    /// Playhead as a fraction of track length, [0, 1]
    pub fn position_relative(&self) -> f64 {
        f64::from_bits(self.position_relative.load(Ordering::Relaxed))
    }

    pub fn position_seconds(&self) -> f64 {
        f64::from_bits(self.position_seconds.load(Ordering::Relaxed))
    }

    /// Nominal track length in seconds (unaffected by the speed setting)
    pub fn length_seconds(&self) -> f64 {
        f64::from_bits(self.length_seconds.load(Ordering::Relaxed))
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    fn publish(&self, transport: &TransportController) {
        self.position_relative
            .store(transport.position_relative().to_bits(), Ordering::Relaxed);
        self.position_seconds
            .store(transport.position_seconds().to_bits(), Ordering::Relaxed);
        self.length_seconds
            .store(transport.length_seconds().to_bits(), Ordering::Relaxed);
        self.playing
            .store(transport.state() == PlayState::Playing, Ordering::Relaxed);
        self.loaded.store(transport.has_track(), Ordering::Relaxed);
    }
}

pub struct DeckPipeline {
    resampler: ResamplingStage<TransportController>,
    tone: ToneFilterStage,
    monitor: Arc<DeckMonitor>,
}

impl DeckPipeline {
    pub fn new() -> Self {
        Self {
            resampler: ResamplingStage::new(TransportController::new()),
            tone: ToneFilterStage::new(),
            monitor: Arc::new(DeckMonitor::default()),
        }
    }

    /// Shared handle for polling this deck's playback state
    pub fn monitor(&self) -> Arc<DeckMonitor> {
        Arc::clone(&self.monitor)
    }

    fn transport(&self) -> &TransportController {
        self.resampler.source()
    }

    fn transport_mut(&mut self) -> &mut TransportController {
        self.resampler.source_mut()
    }

    /// Load a track (or unload with `None`). Resampler history and filter
    /// state are flushed so the old track can't bleed into the new one.
    pub fn load(&mut self, track: Option<Shared<LoadedTrack>>) {
        self.transport_mut().load(track);
        self.resampler.reset_history();
        self.tone.reset();
        self.monitor.publish(self.transport());
    }

    pub fn play(&mut self) {
        self.transport_mut().start();
    }

    pub fn pause(&mut self) {
        self.transport_mut().stop();
    }

    pub fn toggle_play(&mut self) {
        match self.transport().state() {
            PlayState::Playing => self.pause(),
            PlayState::Stopped => self.play(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport().state() == PlayState::Playing
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.transport_mut().set_gain(gain);
    }

    pub fn gain(&self) -> f32 {
        self.transport().gain()
    }

    pub fn set_speed(&mut self, ratio: f64) {
        self.resampler.set_ratio(ratio);
    }

    pub fn speed(&self) -> f64 {
        self.resampler.ratio()
    }

    /// Select the tone band. Requires a loaded track, matching the rest of
    /// the per-track controls.
    pub fn set_tone(&mut self, band: ToneBand) {
        if !self.transport().has_track() {
            log::warn!("deck: tone change with no track loaded, ignored");
            return;
        }
        self.tone.set_band(band);
    }

    pub fn tone(&self) -> ToneBand {
        self.tone.band()
    }

    pub fn seek_seconds(&mut self, seconds: f64) {
        self.transport_mut().set_position_seconds(seconds);
        self.resampler.reset_history();
        self.tone.reset();
        self.monitor.publish(self.transport());
    }

    pub fn seek_relative(&mut self, relative: f64) {
        self.transport_mut().set_position_relative(relative);
        self.resampler.reset_history();
        self.tone.reset();
        self.monitor.publish(self.transport());
    }
}

impl BlockSource for DeckPipeline {
    fn prepare(&mut self, block_size: usize, sample_rate: u32) {
        self.resampler.prepare(block_size, sample_rate);
        self.tone.prepare(sample_rate);
    }

    fn render_block(&mut self, out: &mut StereoBuffer) {
        self.resampler.render_block(out);
        self.tone.process(out);
        self.monitor.publish(self.transport());
    }

    fn release(&mut self) {
        self.resampler.release();
        self.tone.release();
    }
}

impl Default for DeckPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc::gc_handle;
    use crate::types::StereoSample;

    fn deck_with_track(value: f32, len: usize) -> DeckPipeline {
        let mut deck = DeckPipeline::new();
        deck.prepare(64, 48000);
        let track = Shared::new(
            &gc_handle(),
            LoadedTrack::from_samples(vec![StereoSample::mono(value); len], 48000),
        );
        deck.load(Some(track));
        deck
    }

    #[test]
    fn empty_deck_renders_silence() {
        let mut deck = DeckPipeline::new();
        deck.prepare(64, 48000);

        let mut out = StereoBuffer::silence(64);
        out.as_mut_slice()[10] = StereoSample::mono(0.8);
        deck.render_block(&mut out);
        assert_eq!(out.peak(), 0.0);
        assert!(!deck.monitor().is_loaded());
    }

    #[test]
    fn tone_requires_a_loaded_track() {
        let mut deck = DeckPipeline::new();
        deck.prepare(64, 48000);

        deck.set_tone(ToneBand::Bass(6.0));
        assert_eq!(deck.tone(), ToneBand::Bypass);

        let mut deck = deck_with_track(0.5, 48000);
        deck.set_tone(ToneBand::Bass(6.0));
        assert_eq!(deck.tone(), ToneBand::Bass(6.0));
    }

    #[test]
    fn toggle_flips_playback_state() {
        let mut deck = deck_with_track(0.5, 48000);
        assert!(!deck.is_playing());

        deck.toggle_play();
        assert!(deck.is_playing());
        deck.toggle_play();
        assert!(!deck.is_playing());
    }

    #[test]
    fn double_speed_consumes_track_twice_as_fast() {
        let mut deck = deck_with_track(0.5, 480_000);
        deck.set_speed(2.0);
        deck.play();

        // Nominal length comes from metadata, not the speed setting
        assert!((deck.monitor().length_seconds() - 10.0).abs() < 1e-9);

        let mut out = StereoBuffer::silence(64);
        for _ in 0..100 {
            deck.render_block(&mut out);
        }

        // 100 blocks of 64 at ratio 2.0: ~12800 track samples consumed.
        // The transport position advances in whole upstream blocks, so allow
        // one block of slack.
        let pos = deck.monitor().position_seconds() * 48000.0;
        assert!(
            (pos - 12800.0).abs() <= 66.0,
            "position {} samples",
            pos
        );
    }

    #[test]
    fn monitor_tracks_position_and_state() {
        let mut deck = deck_with_track(0.5, 48000);
        let monitor = deck.monitor();
        assert!(monitor.is_loaded());
        assert!((monitor.length_seconds() - 1.0).abs() < 1e-9);

        deck.play();
        let mut out = StereoBuffer::silence(64);
        deck.render_block(&mut out);
        assert!(monitor.is_playing());
        assert!(monitor.position_seconds() > 0.0);

        deck.seek_relative(0.5);
        assert!((monitor.position_relative() - 0.5).abs() < 1e-3);

        deck.load(None);
        assert!(!monitor.is_loaded());
        assert_eq!(monitor.position_seconds(), 0.0);
    }
}
