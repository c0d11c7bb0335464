//! Spindeck player - interactive two-deck playback from the terminal
//!
//! Usage: spindeck-play <track-a> [track-b]
//!
//! Starts the audio output, loads the given files onto decks 0 and 1, and
//! reads mixing commands from stdin:
//!
//!   play <deck> | pause <deck> | toggle <deck>
//!   vol <deck> <0..1>
//!   speed <deck> <ratio>
//!   bass|mid|treble <deck> <dB>     flat <deck>
//!   seek <deck> <0..1>
//!   pos
//!   quit

use std::io::BufRead;
use std::path::Path;

use anyhow::{bail, Context, Result};

use spindeck_core::audio::start_audio_system;
use spindeck_core::config::{default_config_path, load_config, PlayerConfig};
use spindeck_core::engine::{EngineCommand, ToneBand};
use spindeck_core::loader::TrackLoader;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.len() > 2 {
        bail!("usage: spindeck-play <track-a> [track-b]");
    }

    let config: PlayerConfig = load_config(&default_config_path("config.yaml"));

    let mut system =
        start_audio_system(&config.audio).context("failed to start audio output")?;
    log::info!(
        "output running at {}Hz, {} frames (~{:.1}ms)",
        system.sample_rate,
        system.buffer_size,
        system.handle.latency_ms()
    );

    // Decode in the background, push tracks at the engine as they finish
    let loader = TrackLoader::new(system.sample_rate);
    for (deck, path) in args.iter().enumerate() {
        loader.request_load(deck, Path::new(path));
    }
    for _ in 0..args.len() {
        let result = loader.wait().context("loader thread exited")?;
        match result.outcome {
            Ok(track) => {
                println!(
                    "deck {}: {} ({:.1}s)",
                    result.deck,
                    result.path.display(),
                    track.length_seconds()
                );
                if let Some(speed) = config.default_speed {
                    system
                        .commands
                        .send(EngineCommand::SetSpeed { deck: result.deck, ratio: speed });
                }
                system
                    .commands
                    .send(EngineCommand::LoadTrack { deck: result.deck, track });
            }
            Err(e) => bail!("could not load {}: {}", result.path.display(), e),
        }
    }

    println!("ready - type 'play 0' to start deck 0, 'quit' to exit");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        match run_command(&parts, &mut system) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => println!("error: {}", e),
        }
    }

    Ok(())
}

/// Execute one console command. Returns true to quit.
fn run_command(
    parts: &[&str],
    system: &mut spindeck_core::audio::AudioSystemResult,
) -> Result<bool> {
    let Some(&verb) = parts.first() else {
        return Ok(false);
    };

    match verb {
        "quit" | "q" => return Ok(true),
        "pos" => {
            for (i, monitor) in system.monitors.iter().enumerate() {
                println!(
                    "deck {}: {:>7.1}s / {:.1}s ({:.0}%){}{}",
                    i,
                    monitor.position_seconds(),
                    monitor.length_seconds(),
                    monitor.position_relative() * 100.0,
                    if monitor.is_playing() { "  playing" } else { "" },
                    if monitor.is_loaded() { "" } else { "  (empty)" },
                );
            }
        }
        "play" => system.commands.send(EngineCommand::Play { deck: deck_arg(parts)? }),
        "pause" => system.commands.send(EngineCommand::Pause { deck: deck_arg(parts)? }),
        "toggle" => system.commands.send(EngineCommand::TogglePlay { deck: deck_arg(parts)? }),
        "vol" => {
            let (deck, gain) = deck_value(parts)?;
            system.commands.send(EngineCommand::SetVolume { deck, gain: gain as f32 });
        }
        "speed" => {
            let (deck, ratio) = deck_value(parts)?;
            system.commands.send(EngineCommand::SetSpeed { deck, ratio });
        }
        "seek" => {
            let (deck, position) = deck_value(parts)?;
            system.commands.send(EngineCommand::SeekRelative { deck, position });
        }
        "bass" => {
            let (deck, db) = deck_value(parts)?;
            system.commands.send(EngineCommand::SetTone { deck, band: ToneBand::Bass(db as f32) });
        }
        "mid" => {
            let (deck, db) = deck_value(parts)?;
            system.commands.send(EngineCommand::SetTone { deck, band: ToneBand::Mid(db as f32) });
        }
        "treble" => {
            let (deck, db) = deck_value(parts)?;
            system
                .commands
                .send(EngineCommand::SetTone { deck, band: ToneBand::Treble(db as f32) });
        }
        "flat" => {
            system
                .commands
                .send(EngineCommand::SetTone { deck: deck_arg(parts)?, band: ToneBand::Bypass });
        }
        other => println!("unknown command: {}", other),
    }

    Ok(false)
}

fn deck_arg(parts: &[&str]) -> Result<usize> {
    parts
        .get(1)
        .and_then(|s| s.parse().ok())
        .context("expected a deck index")
}

fn deck_value(parts: &[&str]) -> Result<(usize, f64)> {
    let deck = deck_arg(parts)?;
    let value = parts
        .get(2)
        .and_then(|s| s.parse().ok())
        .context("expected a numeric value")?;
    Ok((deck, value))
}
