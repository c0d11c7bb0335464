//! RT-safe deferred deallocation for track data
//!
//! Loading a track swaps the deck's `basedrop::Shared<LoadedTrack>` handle on
//! the audio thread. Dropping the old handle there must not call into the
//! allocator - freeing a few hundred megabytes of decoded audio can stall for
//! longer than a whole render deadline. `basedrop` solves this: the drop only
//! enqueues a pointer (~50ns), and a background collector thread does the
//! actual deallocation where latency doesn't matter.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// How often the collector sweeps deferred drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    // The Collector is !Sync, so it lives on its own thread and we only
    // hand out clonable Handles.
    thread::Builder::new()
        .name("track-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("failed to send GC handle");

            log::info!("track GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("failed to spawn track GC thread");

    rx.recv().expect("failed to receive GC handle")
}

/// Get a handle for creating `Shared<T>` allocations.
///
/// The first call spawns the collector thread; the handle is lightweight
/// and can be cloned freely.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
