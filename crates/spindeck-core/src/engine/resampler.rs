//! ResamplingStage - variable-speed playback by linear interpolation
//!
//! Wraps an upstream `BlockSource` and resamples it by the playback ratio:
//! ratio 2.0 consumes upstream audio twice as fast (double speed, pitch up an
//! octave), ratio 0.5 half as fast. Output blocks always have the length the
//! caller asked for; the variable quantity is how much upstream audio gets
//! consumed, roughly N * ratio samples per N-sample block.
//!
//! Interpolation state is a two-sample history plus a fractional phase, so
//! consumption stays continuous across block boundaries at any ratio. The
//! upstream is always pulled in whole blocks into a pre-allocated chunk
//! buffer, which keeps the render path free of allocation.

use crate::types::{StereoBuffer, StereoSample};

use super::{BlockSource, MAX_BLOCK_SIZE};

/// Fastest supported playback ratio
pub const MAX_SPEED_RATIO: f64 = 100.0;

pub struct ResamplingStage<S: BlockSource> {
    source: S,
    /// Playback speed ratio (upstream samples consumed per output sample)
    ratio: f64,
    /// Fractional read position between `s0` and `s1`.
    /// Starts at 2.0 so the first output pulls two real samples into the
    /// history and ratio 1.0 reproduces the input exactly.
    phase: f64,
    s0: StereoSample,
    s1: StereoSample,
    /// Upstream pull buffer, refilled one whole block at a time
    chunk: StereoBuffer,
    chunk_pos: usize,
    /// Total upstream samples consumed since the last reset
    consumed: u64,
}

impl<S: BlockSource> ResamplingStage<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            ratio: 1.0,
            phase: 2.0,
            s0: StereoSample::silence(),
            s1: StereoSample::silence(),
            chunk: StereoBuffer::with_capacity(MAX_BLOCK_SIZE),
            chunk_pos: 0,
            consumed: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Set the playback speed ratio. Values outside (0, 100] are rejected
    /// and leave the prior ratio unchanged.
    pub fn set_ratio(&mut self, ratio: f64) {
        if !(ratio > 0.0 && ratio <= MAX_SPEED_RATIO) {
            log::warn!(
                "resampler: speed ratio {} out of range (0, {}], ignored",
                ratio,
                MAX_SPEED_RATIO
            );
            return;
        }
        self.ratio = ratio;
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Upstream samples consumed since the last `prepare`/`reset_history`
    pub fn consumed_samples(&self) -> u64 {
        self.consumed
    }

    /// Discard interpolation history and buffered upstream audio.
    ///
    /// Called after a load or seek so stale samples from the old read
    /// position don't bleed into the new one. The speed ratio is kept.
    pub fn reset_history(&mut self) {
        self.s0 = StereoSample::silence();
        self.s1 = StereoSample::silence();
        self.phase = 2.0;
        self.chunk_pos = self.chunk.len();
        self.consumed = 0;
    }

    #[inline]
    fn next_input(&mut self) -> StereoSample {
        if self.chunk_pos >= self.chunk.len() {
            self.source.render_block(&mut self.chunk);
            self.chunk_pos = 0;
        }
        let sample = self.chunk[self.chunk_pos];
        self.chunk_pos += 1;
        self.consumed += 1;
        sample
    }
}

impl<S: BlockSource> BlockSource for ResamplingStage<S> {
    fn prepare(&mut self, block_size: usize, sample_rate: u32) {
        self.source.prepare(block_size, sample_rate);
        self.chunk.set_len_from_capacity(block_size.min(MAX_BLOCK_SIZE));
        self.reset_history();
    }

    fn render_block(&mut self, out: &mut StereoBuffer) {
        if self.chunk.is_empty() {
            // Not prepared
            out.fill_silence();
            return;
        }

        for slot in out.iter_mut() {
            while self.phase >= 1.0 {
                self.s0 = self.s1;
                self.s1 = self.next_input();
                self.phase -= 1.0;
            }
            let frac = self.phase as f32;
            *slot = self.s0 * (1.0 - frac) + self.s1 * frac;
            self.phase += self.ratio;
        }
    }

    fn release(&mut self) {
        self.source.release();
        self.chunk.set_len_from_capacity(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic upstream producing a known monotone ramp, one value per
    /// consumed sample, so consumption and interpolation are observable.
    struct RampSource {
        next: f32,
        step: f32,
    }

    impl RampSource {
        fn new(step: f32) -> Self {
            Self { next: 0.0, step }
        }
    }

    impl BlockSource for RampSource {
        fn prepare(&mut self, _block_size: usize, _sample_rate: u32) {}

        fn render_block(&mut self, out: &mut StereoBuffer) {
            for slot in out.iter_mut() {
                *slot = StereoSample::mono(self.next);
                self.next += self.step;
            }
        }

        fn release(&mut self) {}
    }

    #[test]
    fn unity_ratio_reproduces_input_exactly() {
        let mut stage = ResamplingStage::new(RampSource::new(1.0));
        stage.prepare(32, 48000);

        let mut out = StereoBuffer::silence(32);
        stage.render_block(&mut out);
        for i in 0..32 {
            assert_eq!(out[i].left, i as f32, "sample {}", i);
        }

        // Continuity across the block boundary
        stage.render_block(&mut out);
        assert_eq!(out[0].left, 32.0);
        assert_eq!(out[31].left, 63.0);
    }

    #[test]
    fn output_length_is_fixed_and_consumption_scales_with_ratio() {
        for ratio in [0.5, 1.0, 2.0, 3.7] {
            let mut stage = ResamplingStage::new(RampSource::new(1.0));
            stage.prepare(64, 48000);
            stage.set_ratio(ratio);

            let mut out = StereoBuffer::silence(64);
            for _ in 0..16 {
                stage.render_block(&mut out);
                assert_eq!(out.len(), 64);
            }

            let expected = (16.0 * 64.0 * ratio) as f64;
            let consumed = stage.consumed_samples() as f64;
            // Within one upstream block plus the interpolation history
            assert!(
                (consumed - expected).abs() <= 64.0 + 2.0,
                "ratio {}: consumed {} vs expected {}",
                ratio,
                consumed,
                expected
            );
        }
    }

    #[test]
    fn double_speed_skips_every_other_sample() {
        let mut stage = ResamplingStage::new(RampSource::new(1.0));
        stage.prepare(16, 48000);
        stage.set_ratio(2.0);

        let mut out = StereoBuffer::silence(16);
        stage.render_block(&mut out);
        for i in 0..16 {
            assert_eq!(out[i].left, (2 * i) as f32, "sample {}", i);
        }
    }

    #[test]
    fn half_speed_interpolates_midpoints() {
        let mut stage = ResamplingStage::new(RampSource::new(1.0));
        stage.prepare(16, 48000);
        stage.set_ratio(0.5);

        let mut out = StereoBuffer::silence(16);
        stage.render_block(&mut out);
        // 0, 0.5, 1, 1.5, ... on a linear ramp
        for i in 0..16 {
            assert!((out[i].left - i as f32 * 0.5).abs() < 1e-6, "sample {}", i);
        }
    }

    #[test]
    fn ratio_range_is_enforced()  {
        let mut stage = ResamplingStage::new(RampSource::new(0.0));
        stage.set_ratio(1.5);
        assert_eq!(stage.ratio(), 1.5);

        stage.set_ratio(0.0);
        assert_eq!(stage.ratio(), 1.5);
        stage.set_ratio(-1.0);
        assert_eq!(stage.ratio(), 1.5);
        stage.set_ratio(100.5);
        assert_eq!(stage.ratio(), 1.5);
        stage.set_ratio(100.0);
        assert_eq!(stage.ratio(), 100.0);
    }

    #[test]
    fn unprepared_stage_renders_silence() {
        let mut stage = ResamplingStage::new(RampSource::new(1.0));
        let mut out = StereoBuffer::silence(8);
        out.as_mut_slice()[3] = StereoSample::mono(0.9);
        stage.render_block(&mut out);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn reset_history_drops_buffered_audio() {
        let mut stage = ResamplingStage::new(RampSource::new(1.0));
        stage.prepare(8, 48000);

        let mut out = StereoBuffer::silence(8);
        stage.render_block(&mut out);
        assert!(stage.consumed_samples() > 0);

        stage.reset_history();
        assert_eq!(stage.consumed_samples(), 0);
        // First value after a reset comes from a fresh upstream pull, not
        // the stale chunk (the ramp has already produced 0..15 into chunks)
        stage.render_block(&mut out);
        assert_eq!(out[0].left, 16.0);
    }
}
