//! Spindeck Core - two-deck DJ mixing engine
//!
//! The library is split into a real-time half (`engine`, pulled by the audio
//! callback) and a control half (`loader`, `config`, command producers) that
//! runs on ordinary threads and may block or allocate.

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod engine;
pub mod loader;
pub mod types;

pub use types::*;
