//! Control-to-audio command channel
//!
//! All engine mutations travel as `EngineCommand` values through a wait-free
//! SPSC ring buffer (rtrb). The audio thread drains the queue at the start of
//! every block, so commands apply on block boundaries and the control side
//! never takes a lock the audio thread can block on.

use basedrop::Shared;

use crate::audio_file::LoadedTrack;
use crate::engine::ToneBand;

/// Capacity of the command ring buffer. Commands are a few words each;
/// this is far more than a UI can plausibly emit between two blocks.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

pub enum EngineCommand {
    /// Put a decoded track on a deck. The `Shared` handle moves through the
    /// queue, so the audio thread takes ownership without an allocation.
    LoadTrack { deck: usize, track: Shared<LoadedTrack> },
    /// Detach the deck's track; the handle is dropped on the audio thread
    /// and reclaimed by the GC thread
    UnloadTrack { deck: usize },
    Play { deck: usize },
    Pause { deck: usize },
    TogglePlay { deck: usize },
    SeekSeconds { deck: usize, seconds: f64 },
    SeekRelative { deck: usize, position: f64 },
    SetVolume { deck: usize, gain: f32 },
    SetSpeed { deck: usize, ratio: f64 },
    SetTone { deck: usize, band: ToneBand },
}

impl EngineCommand {
    pub fn label(&self) -> &'static str {
        match self {
            EngineCommand::LoadTrack { .. } => "LoadTrack",
            EngineCommand::UnloadTrack { .. } => "UnloadTrack",
            EngineCommand::Play { .. } => "Play",
            EngineCommand::Pause { .. } => "Pause",
            EngineCommand::TogglePlay { .. } => "TogglePlay",
            EngineCommand::SeekSeconds { .. } => "SeekSeconds",
            EngineCommand::SeekRelative { .. } => "SeekRelative",
            EngineCommand::SetVolume { .. } => "SetVolume",
            EngineCommand::SetSpeed { .. } => "SetSpeed",
            EngineCommand::SetTone { .. } => "SetTone",
        }
    }

    /// Deck index the command targets
    pub fn deck(&self) -> usize {
        match self {
            EngineCommand::LoadTrack { deck, .. }
            | EngineCommand::UnloadTrack { deck }
            | EngineCommand::Play { deck }
            | EngineCommand::Pause { deck }
            | EngineCommand::TogglePlay { deck }
            | EngineCommand::SeekSeconds { deck, .. }
            | EngineCommand::SeekRelative { deck, .. }
            | EngineCommand::SetVolume { deck, .. }
            | EngineCommand::SetSpeed { deck, .. }
            | EngineCommand::SetTone { deck, .. } => *deck,
        }
    }
}

/// Control-side handle to the engine command queue
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub(crate) fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Enqueue a command. If the queue is full (audio thread stalled or
    /// gone) the command is dropped with a warning rather than blocking.
    pub fn send(&mut self, command: EngineCommand) {
        let label = command.label();
        if self.producer.push(command).is_err() {
            log::warn!("engine command queue full, dropping {}", label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (producer, consumer) = rtrb::RingBuffer::new(2);
        let mut sender = CommandSender::new(producer);

        for _ in 0..5 {
            sender.send(EngineCommand::Play { deck: 0 });
        }
        // Still alive and non-blocking; the consumer sees the capacity
        assert_eq!(consumer.slots(), 2);
    }

    #[test]
    fn commands_report_their_target_deck() {
        assert_eq!(EngineCommand::Play { deck: 1 }.deck(), 1);
        assert_eq!(
            EngineCommand::SetVolume { deck: 0, gain: 0.5 }.deck(),
            0
        );
    }
}
