//! MixerStage - sums registered deck pipelines into one output
//!
//! Plain unity-gain summation; per-deck level lives in each transport's gain,
//! so the crossfade is two faders, not an equal-power law. Decks are rendered
//! and summed in registration order, which makes the output deterministic.
//! A deck with no track contributes exact silence.

use crate::types::StereoBuffer;

use super::{BlockSource, DeckPipeline, MAX_BLOCK_SIZE};

pub struct MixerStage {
    inputs: Vec<DeckPipeline>,
    /// Per-deck render target, pre-allocated so summation never allocates
    scratch: StereoBuffer,
}

impl MixerStage {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            scratch: StereoBuffer::with_capacity(MAX_BLOCK_SIZE),
        }
    }

    /// Register a deck; returns its index. Registration order is summation
    /// order. Not for use while the engine is rendering.
    pub fn add_input(&mut self, deck: DeckPipeline) -> usize {
        self.inputs.push(deck);
        self.inputs.len() - 1
    }

    /// Remove a deck by index, returning it. Later decks shift down, so the
    /// remaining summation order stays the registration order. Not for use
    /// while the engine is rendering.
    pub fn remove_input(&mut self, index: usize) -> Option<DeckPipeline> {
        if index < self.inputs.len() {
            Some(self.inputs.remove(index))
        } else {
            None
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn input(&self, index: usize) -> Option<&DeckPipeline> {
        self.inputs.get(index)
    }

    pub fn input_mut(&mut self, index: usize) -> Option<&mut DeckPipeline> {
        self.inputs.get_mut(index)
    }
}

impl BlockSource for MixerStage {
    fn prepare(&mut self, block_size: usize, sample_rate: u32) {
        for input in &mut self.inputs {
            input.prepare(block_size, sample_rate);
        }
        self.scratch.set_len_from_capacity(block_size.min(MAX_BLOCK_SIZE));
    }

    fn render_block(&mut self, out: &mut StereoBuffer) {
        out.fill_silence();
        for input in &mut self.inputs {
            self.scratch.set_len_from_capacity(out.len());
            input.render_block(&mut self.scratch);
            out.add_buffer(&self.scratch);
        }
    }

    fn release(&mut self) {
        for input in &mut self.inputs {
            input.release();
        }
        self.scratch.set_len_from_capacity(0);
    }
}

impl Default for MixerStage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::LoadedTrack;
    use crate::engine::gc::gc_handle;
    use crate::types::StereoSample;
    use basedrop::Shared;

    fn playing_deck(value: f32) -> DeckPipeline {
        let mut deck = DeckPipeline::new();
        let track = Shared::new(
            &gc_handle(),
            LoadedTrack::from_samples(vec![StereoSample::mono(value); 48000], 48000),
        );
        deck.load(Some(track));
        deck.play();
        deck
    }

    #[test]
    fn no_inputs_renders_silence() {
        let mut mixer = MixerStage::new();
        mixer.prepare(64, 48000);

        let mut out = StereoBuffer::silence(64);
        out.as_mut_slice()[5] = StereoSample::mono(1.0);
        mixer.render_block(&mut out);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn silent_deck_plus_signal_equals_signal() {
        let mut mixer = MixerStage::new();
        mixer.add_input(playing_deck(0.4));
        mixer.add_input(DeckPipeline::new()); // nothing loaded
        mixer.prepare(64, 48000);

        let mut out = StereoBuffer::silence(64);
        mixer.render_block(&mut out);
        mixer.render_block(&mut out); // past the gain ramp-in
        for i in 0..64 {
            assert_eq!(out[i], StereoSample::mono(0.4), "sample {}", i);
        }
    }

    #[test]
    fn removed_deck_stops_contributing() {
        let mut mixer = MixerStage::new();
        mixer.add_input(playing_deck(0.25));
        mixer.add_input(playing_deck(0.5));
        mixer.prepare(64, 48000);

        let removed = mixer.remove_input(0).unwrap();
        assert!(removed.is_playing());
        assert_eq!(mixer.num_inputs(), 1);
        assert!(mixer.remove_input(5).is_none());

        let mut out = StereoBuffer::silence(64);
        mixer.render_block(&mut out);
        mixer.render_block(&mut out);
        assert!((out[0].left - 0.5).abs() < 1e-6);
    }

    #[test]
    fn two_decks_sum_sample_wise() {
        let mut mixer = MixerStage::new();
        mixer.add_input(playing_deck(0.25));
        mixer.add_input(playing_deck(0.5));
        mixer.prepare(64, 48000);

        let mut out = StereoBuffer::silence(64);
        mixer.render_block(&mut out);
        mixer.render_block(&mut out);
        assert!((out[0].left - 0.75).abs() < 1e-6);
        assert!((out[63].right - 0.75).abs() < 1e-6);
    }
}
