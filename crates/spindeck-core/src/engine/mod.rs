//! Audio engine - the real-time half of the player
//!
//! Components, inner to outer:
//! - TransportController: decoded-track ownership, playback cursor, gain
//! - ResamplingStage: variable-speed playback by linear interpolation
//! - ToneFilterStage: one-band shelf/peak EQ per deck
//! - DeckPipeline: transport → resampler → tone, one per deck
//! - MixerStage: sums the registered deck pipelines into one output
//! - AudioEngine: decks + mixer + command drain, owned by the audio thread

mod command;
mod deck;
#[allow(clippy::module_inception)]
mod engine;
pub mod gc;
mod mixer;
mod resampler;
mod tone;
mod transport;

pub use command::*;
pub use deck::*;
pub use engine::*;
pub use mixer::*;
pub use resampler::*;
pub use tone::*;
pub use transport::*;

use crate::types::StereoBuffer;

/// Maximum block size to pre-allocate for real-time safety.
/// Covers all common device configurations (64..4096 frames); pre-allocating
/// to this size eliminates allocations in the audio callback.
pub const MAX_BLOCK_SIZE: usize = 8192;

/// The prepare/render/release lifecycle every pull-based stage honors.
///
/// `prepare` may allocate and must be called before the first render and
/// again whenever the engine block size or sample rate changes.
/// `render_block` runs on the audio thread: it must fill `out` completely
/// and must never block, allocate, or panic. `release` drops prepared
/// buffers; a released stage renders silence until prepared again.
pub trait BlockSource {
    fn prepare(&mut self, block_size: usize, sample_rate: u32);
    fn render_block(&mut self, out: &mut StereoBuffer);
    fn release(&mut self);
}
