//! AudioEngine - decks, mixer and command drain, owned by the audio thread
//!
//! Constructed on the control thread, then moved whole into the output
//! callback. Everything that crosses back out is lock-free: commands in
//! through the rtrb queue, playback state out through the deck monitors.

use std::sync::Arc;

use crate::types::{StereoBuffer, NUM_DECKS};

use super::{
    BlockSource, CommandSender, DeckMonitor, DeckPipeline, EngineCommand, MixerStage,
    COMMAND_QUEUE_CAPACITY,
};

pub struct AudioEngine {
    mixer: MixerStage,
    commands: rtrb::Consumer<EngineCommand>,
    sample_rate: u32,
}

impl AudioEngine {
    /// Build an engine with `NUM_DECKS` decks. Returns the engine (moves to
    /// the audio thread), the command sender and the per-deck monitors
    /// (both stay on the control side).
    pub fn new() -> (Self, CommandSender, Vec<Arc<DeckMonitor>>) {
        let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);

        let mut mixer = MixerStage::new();
        let mut monitors = Vec::with_capacity(NUM_DECKS);
        for _ in 0..NUM_DECKS {
            let deck = DeckPipeline::new();
            monitors.push(deck.monitor());
            mixer.add_input(deck);
        }

        let engine = Self {
            mixer,
            commands: consumer,
            sample_rate: 0,
        };
        (engine, CommandSender::new(producer), monitors)
    }

    pub fn num_decks(&self) -> usize {
        self.mixer.num_inputs()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn deck(&self, index: usize) -> Option<&DeckPipeline> {
        self.mixer.input(index)
    }

    pub fn deck_mut(&mut self, index: usize) -> Option<&mut DeckPipeline> {
        self.mixer.input_mut(index)
    }

    /// Apply every queued command. Runs at the top of each block, so all
    /// control changes land on block boundaries.
    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        let index = command.deck();
        let Some(deck) = self.mixer.input_mut(index) else {
            log::warn!("command {} for unknown deck {}, ignored", command.label(), index);
            return;
        };
        match command {
            EngineCommand::LoadTrack { track, .. } => deck.load(Some(track)),
            EngineCommand::UnloadTrack { .. } => deck.load(None),
            EngineCommand::Play { .. } => deck.play(),
            EngineCommand::Pause { .. } => deck.pause(),
            EngineCommand::TogglePlay { .. } => deck.toggle_play(),
            EngineCommand::SeekSeconds { seconds, .. } => deck.seek_seconds(seconds),
            EngineCommand::SeekRelative { position, .. } => deck.seek_relative(position),
            EngineCommand::SetVolume { gain, .. } => deck.set_gain(gain),
            EngineCommand::SetSpeed { ratio, .. } => deck.set_speed(ratio),
            EngineCommand::SetTone { band, .. } => deck.set_tone(band),
        }
    }
}

impl BlockSource for AudioEngine {
    fn prepare(&mut self, block_size: usize, sample_rate: u32) {
        log::info!(
            "engine prepared: {} decks, block {} frames at {}Hz",
            self.num_decks(),
            block_size,
            sample_rate
        );
        self.sample_rate = sample_rate;
        self.mixer.prepare(block_size, sample_rate);
    }

    fn render_block(&mut self, out: &mut StereoBuffer) {
        self.drain_commands();
        self.mixer.render_block(out);
    }

    fn release(&mut self) {
        self.sample_rate = 0;
        self.mixer.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::LoadedTrack;
    use crate::engine::gc::gc_handle;
    use crate::engine::ToneBand;
    use crate::types::StereoSample;
    use basedrop::Shared;

    fn test_track(value: f32, len: usize) -> Shared<LoadedTrack> {
        Shared::new(
            &gc_handle(),
            LoadedTrack::from_samples(vec![StereoSample::mono(value); len], 48000),
        )
    }

    #[test]
    fn commands_drive_playback_end_to_end() {
        let (mut engine, mut sender, monitors) = AudioEngine::new();
        engine.prepare(64, 48000);

        sender.send(EngineCommand::LoadTrack { deck: 0, track: test_track(0.8, 480_000) });
        sender.send(EngineCommand::SetVolume { deck: 0, gain: 0.5 });
        sender.send(EngineCommand::Play { deck: 0 });

        let mut out = StereoBuffer::silence(64);
        engine.render_block(&mut out);
        engine.render_block(&mut out);
        assert!(monitors[0].is_playing());
        assert!((out[0].left - 0.4).abs() < 1e-6);

        sender.send(EngineCommand::Pause { deck: 0 });
        engine.render_block(&mut out);
        assert!(!monitors[0].is_playing());
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn unknown_deck_index_is_ignored() {
        let (mut engine, mut sender, _monitors) = AudioEngine::new();
        engine.prepare(64, 48000);

        sender.send(EngineCommand::Play { deck: 99 });
        sender.send(EngineCommand::SetTone { deck: NUM_DECKS, band: ToneBand::Bass(3.0) });

        let mut out = StereoBuffer::silence(64);
        engine.render_block(&mut out);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn unload_detaches_the_track() {
        let (mut engine, mut sender, monitors) = AudioEngine::new();
        engine.prepare(64, 48000);

        sender.send(EngineCommand::LoadTrack { deck: 1, track: test_track(0.3, 48000) });
        let mut out = StereoBuffer::silence(64);
        engine.render_block(&mut out);
        assert!(monitors[1].is_loaded());

        sender.send(EngineCommand::UnloadTrack { deck: 1 });
        engine.render_block(&mut out);
        assert!(!monitors[1].is_loaded());
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn both_decks_mix_into_the_output() {
        let (mut engine, mut sender, _monitors) = AudioEngine::new();
        engine.prepare(64, 48000);

        sender.send(EngineCommand::LoadTrack { deck: 0, track: test_track(0.2, 480_000) });
        sender.send(EngineCommand::LoadTrack { deck: 1, track: test_track(0.3, 480_000) });
        sender.send(EngineCommand::Play { deck: 0 });
        sender.send(EngineCommand::Play { deck: 1 });

        let mut out = StereoBuffer::silence(64);
        engine.render_block(&mut out);
        engine.render_block(&mut out);
        assert!((out[0].left - 0.5).abs() < 1e-6);
    }
}
