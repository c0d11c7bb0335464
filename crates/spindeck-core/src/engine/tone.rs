//! ToneFilterStage - single-band shelf/peak EQ per deck
//!
//! One biquad per deck, retuned when the band selection changes. The band is
//! exclusive: selecting treble drops any bass or mid setting, and `Bypass`
//! passes audio through untouched. Coefficients follow the RBJ audio EQ
//! cookbook; filter state is kept per channel and reset on band switches so
//! the new filter doesn't ring with the old one's history.

use crate::types::{StereoBuffer, StereoSample};

/// Gain limits for every tone band, in dB
pub const MAX_TONE_GAIN_DB: f32 = 12.0;

/// Low shelf corner for the bass band
pub const BASS_SHELF_HZ: f32 = 100.0;
/// Peaking filter center for the mid band
pub const MID_PEAK_HZ: f32 = 1000.0;
/// High shelf corner for the treble band
pub const TREBLE_SHELF_HZ: f32 = 5000.0;

const TONE_Q: f32 = 0.707;

/// The active tone band and its gain in dB.
///
/// Exactly one band can be active at a time; the enum makes the exclusivity
/// structural instead of a runtime rule.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ToneBand {
    #[default]
    Bypass,
    Bass(f32),
    Mid(f32),
    Treble(f32),
}

impl ToneBand {
    pub fn gain_db(&self) -> Option<f32> {
        match self {
            ToneBand::Bypass => None,
            ToneBand::Bass(db) | ToneBand::Mid(db) | ToneBand::Treble(db) => Some(*db),
        }
    }

    /// True when both values select the same band, regardless of gain
    fn same_band(&self, other: &ToneBand) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Normalized biquad coefficients (a0 divided out)
#[derive(Debug, Clone, Copy, Default)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    fn identity() -> Self {
        Self { b0: 1.0, ..Default::default() }
    }

    fn low_shelf(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        let a = 10f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * TONE_Q);
        let beta = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + beta;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + beta)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - beta)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - beta) / a0,
        }
    }

    fn peaking(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        let a = 10f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * TONE_Q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    fn high_shelf(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        let a = 10f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * TONE_Q);
        let beta = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + beta;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + beta)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - beta)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - beta) / a0,
        }
    }
}

/// Direct form I state, stereo (both channels filtered with one set of
/// coefficients)
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: StereoSample,
    x2: StereoSample,
    y1: StereoSample,
    y2: StereoSample,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, c: &BiquadCoeffs, x: StereoSample) -> StereoSample {
        let y = x * c.b0
            + self.x1 * c.b1
            + self.x2 * c.b2
            + self.y1 * -c.a1
            + self.y2 * -c.a2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

pub struct ToneFilterStage {
    band: ToneBand,
    coeffs: BiquadCoeffs,
    state: BiquadState,
    sample_rate: u32,
}

impl ToneFilterStage {
    pub fn new() -> Self {
        Self {
            band: ToneBand::Bypass,
            coeffs: BiquadCoeffs::identity(),
            state: BiquadState::default(),
            sample_rate: 0,
        }
    }

    pub fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.state = BiquadState::default();
        self.retune();
    }

    pub fn release(&mut self) {
        self.sample_rate = 0;
    }

    pub fn band(&self) -> ToneBand {
        self.band
    }

    /// Select the active band. Gains outside [-12, 12] dB are rejected and
    /// leave the prior band unchanged. Switching to a different band resets
    /// the filter state; adjusting the gain of the current band does not.
    pub fn set_band(&mut self, band: ToneBand) {
        if self.sample_rate == 0 {
            log::warn!("tone: band change before prepare, ignored");
            return;
        }
        if let Some(db) = band.gain_db() {
            if !(-MAX_TONE_GAIN_DB..=MAX_TONE_GAIN_DB).contains(&db) {
                log::warn!(
                    "tone: gain {} dB out of range [-{}, {}], ignored",
                    db,
                    MAX_TONE_GAIN_DB,
                    MAX_TONE_GAIN_DB
                );
                return;
            }
        }
        if !band.same_band(&self.band) {
            self.state = BiquadState::default();
        }
        self.band = band;
        self.retune();
    }

    /// Clear filter history (after a load or seek, so audio from the old
    /// position doesn't ring into the new one)
    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }

    fn retune(&mut self) {
        if self.sample_rate == 0 {
            return;
        }
        let rate = self.sample_rate as f32;
        self.coeffs = match self.band {
            ToneBand::Bypass => BiquadCoeffs::identity(),
            ToneBand::Bass(db) => BiquadCoeffs::low_shelf(rate, BASS_SHELF_HZ, db),
            ToneBand::Mid(db) => BiquadCoeffs::peaking(rate, MID_PEAK_HZ, db),
            ToneBand::Treble(db) => BiquadCoeffs::high_shelf(rate, TREBLE_SHELF_HZ, db),
        };
    }

    /// Filter a block in place. Bypass (and an unprepared stage) leaves the
    /// buffer untouched.
    pub fn process(&mut self, buf: &mut StereoBuffer) {
        if self.band == ToneBand::Bypass || self.sample_rate == 0 {
            return;
        }
        let coeffs = self.coeffs;
        for sample in buf.iter_mut() {
            *sample = self.state.process(&coeffs, *sample);
        }
    }
}

impl Default for ToneFilterStage {
    fn default() -> Self {
        Self::new()
    }
}
