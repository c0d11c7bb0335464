//! Spindeck mixdown - offline render of both decks to a WAV file
//!
//! Usage: spindeck-mixdown <out.wav> <track-a> [track-b]
//!
//! Loads the given tracks, starts both decks from the top and renders the
//! mixed output block by block until every deck has played out. No audio
//! device is involved; this is the same engine the live player runs, pulled
//! synchronously.

use std::path::Path;

use anyhow::{bail, Context, Result};

use spindeck_core::audio_file::load_track;
use spindeck_core::engine::{gc::gc_handle, AudioEngine, BlockSource};
use spindeck_core::{StereoBuffer, DEFAULT_SAMPLE_RATE};

const BLOCK_SIZE: usize = 512;

/// Hard cap so a bad speed setting can't produce an unbounded file
const MAX_RENDER_SECONDS: f64 = 3600.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("usage: spindeck-mixdown <out.wav> <track-a> [track-b]");
    }
    let out_path = Path::new(&args[0]);
    let track_paths = &args[1..];

    let (mut engine, _commands, monitors) = AudioEngine::new();
    engine.prepare(BLOCK_SIZE, DEFAULT_SAMPLE_RATE);

    let gc = gc_handle();
    for (deck, path) in track_paths.iter().enumerate() {
        let track = load_track(Path::new(path), DEFAULT_SAMPLE_RATE)
            .with_context(|| format!("could not load {}", path))?;
        println!("deck {}: {} ({:.1}s)", deck, path, track.length_seconds());

        let deck_pipeline = engine.deck_mut(deck).context("deck index out of range")?;
        deck_pipeline.load(Some(basedrop::Shared::new(&gc, track)));
        deck_pipeline.play();
    }

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: DEFAULT_SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(out_path, spec)
        .with_context(|| format!("could not create {}", out_path.display()))?;

    let mut block = StereoBuffer::silence(BLOCK_SIZE);
    let max_blocks =
        (MAX_RENDER_SECONDS * DEFAULT_SAMPLE_RATE as f64 / BLOCK_SIZE as f64) as usize;
    let mut frames_written: u64 = 0;

    for _ in 0..max_blocks {
        engine.render_block(&mut block);
        for &value in block.as_interleaved() {
            writer.write_sample(value)?;
        }
        frames_written += BLOCK_SIZE as u64;

        if monitors.iter().all(|m| !m.is_playing()) {
            break;
        }
    }

    writer.finalize().context("failed to finalize WAV")?;
    println!(
        "wrote {} ({:.1}s)",
        out_path.display(),
        frames_written as f64 / DEFAULT_SAMPLE_RATE as f64
    );

    Ok(())
}
