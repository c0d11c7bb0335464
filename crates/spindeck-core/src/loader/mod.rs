//! Background track loading
//!
//! Decoding a file takes seconds; the control thread shouldn't stall for it
//! and the audio thread absolutely can't. The loader owns a worker thread:
//! requests go in over a crossbeam channel, decoded tracks come back as
//! `Shared<LoadedTrack>` handles ready to push at the engine. Allocation
//! happens here; the audio thread only ever receives the finished handle.

use std::path::{Path, PathBuf};
use std::thread;

use basedrop::Shared;
use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::audio_file::{load_track, LoadedTrack, TrackLoadError};
use crate::engine::gc::gc_handle;

struct LoadRequest {
    deck: usize,
    path: PathBuf,
}

/// Outcome of a load request, tagged with the deck it was meant for
pub struct LoadResult {
    pub deck: usize,
    pub path: PathBuf,
    pub outcome: Result<Shared<LoadedTrack>, TrackLoadError>,
}

pub struct TrackLoader {
    requests: Sender<LoadRequest>,
    results: Receiver<LoadResult>,
}

impl TrackLoader {
    /// Spawn the loader worker. Tracks are decoded and resampled to
    /// `target_rate` (the engine sample rate).
    pub fn new(target_rate: u32) -> Self {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (result_tx, result_rx) = unbounded::<LoadResult>();

        thread::Builder::new()
            .name("track-loader".to_string())
            .spawn(move || {
                let gc = gc_handle();
                // Exits when the TrackLoader (and its sender) is dropped
                for request in request_rx {
                    log::info!("loading {:?} for deck {}", request.path, request.deck);
                    let outcome = load_track(&request.path, target_rate)
                        .map(|track| Shared::new(&gc, track));
                    if let Err(ref e) = outcome {
                        log::error!("failed to load {:?}: {}", request.path, e);
                    }
                    if result_tx
                        .send(LoadResult {
                            deck: request.deck,
                            path: request.path,
                            outcome,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            })
            .expect("failed to spawn track loader thread");

        Self {
            requests: request_tx,
            results: result_rx,
        }
    }

    /// Queue a file for decoding. Returns immediately; the result arrives
    /// through `poll` once the worker is done.
    pub fn request_load(&self, deck: usize, path: &Path) {
        let _ = self.requests.send(LoadRequest {
            deck,
            path: path.to_path_buf(),
        });
    }

    /// Non-blocking check for a finished load
    pub fn poll(&self) -> Option<LoadResult> {
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the next load finishes (None if the worker has exited)
    pub fn wait(&self) -> Option<LoadResult> {
        self.results.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, frames: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(8000i16).unwrap();
            writer.write_sample(-8000i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn loads_a_wav_file_in_the_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 4800);

        let loader = TrackLoader::new(48000);
        loader.request_load(1, &path);

        let result = loader.wait().expect("loader thread gone");
        assert_eq!(result.deck, 1);
        let track = result.outcome.expect("load failed");
        assert_eq!(track.duration_samples(), 4800);
        assert_eq!(track.sample_rate, 48000);
    }

    #[test]
    fn missing_file_reports_an_error_for_the_right_deck() {
        let loader = TrackLoader::new(48000);
        loader.request_load(0, Path::new("/nonexistent/missing.flac"));

        let result = loader.wait().expect("loader thread gone");
        assert_eq!(result.deck, 0);
        assert!(matches!(result.outcome, Err(TrackLoadError::Io { .. })));
    }

    #[test]
    fn poll_is_non_blocking() {
        let loader = TrackLoader::new(48000);
        assert!(loader.poll().is_none());
    }
}
