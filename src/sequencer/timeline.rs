/// Timeline builder - turns instruments into per-instrument blocks of note events
use super::instrument::{Instrument, Step};

/// Ticks per beat (sixteenth-note resolution)
pub const TICKS_PER_BEAT: u32 = 4;

/// General MIDI percussion channel (channel 10, zero-based)
pub const DRUM_CHANNEL: u8 = 9;

pub const NOTE_VELOCITY: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub voice: u8,
    pub on: bool,
    /// 1-based step index
    pub tick: u64,
}

impl NoteEvent {
    /// MIDI short message for this event on the percussion channel
    pub fn to_midi(&self) -> [u8; 3] {
        let status = if self.on { 0x90 } else { 0x80 };
        [status | DRUM_CHANNEL, self.voice, NOTE_VELOCITY]
    }
}

/// Derived event timeline. One block per instrument, in instrument order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    blocks: Vec<Vec<NoteEvent>>,
}

impl Timeline {
    pub fn build(instruments: &[Instrument]) -> Self {
        Self {
            blocks: instruments.iter().map(block_for).collect(),
        }
    }

    pub fn blocks(&self) -> &[Vec<NoteEvent>] {
        &self.blocks
    }

    pub fn events(&self) -> impl Iterator<Item = &NoteEvent> {
        self.blocks.iter().flatten()
    }

    /// Total number of events across all blocks
    pub fn len(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Vec::is_empty)
    }

    /// Last tick of the loop, 0 for a silent timeline
    pub fn max_tick(&self) -> u64 {
        self.events().map(|event| event.tick).max().unwrap_or(0)
    }

    /// Events at `tick`, in block order
    pub fn events_at(&self, tick: u64) -> impl Iterator<Item = &NoteEvent> {
        self.events().filter(move |event| event.tick == tick)
    }

    pub(crate) fn push_block(&mut self, block: Vec<NoteEvent>) {
        self.blocks.push(block);
    }

    pub(crate) fn insert_block(&mut self, index: usize, block: Vec<NoteEvent>) {
        self.blocks.insert(index, block);
    }

    pub(crate) fn remove_block(&mut self, index: usize) -> Vec<NoteEvent> {
        self.blocks.remove(index)
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

/// Events for a single instrument: one per step, at its 1-based position
pub fn block_for(instrument: &Instrument) -> Vec<NoteEvent> {
    instrument
        .steps()
        .zip(1u64..)
        .map(|(step, tick)| NoteEvent {
            voice: instrument.code(),
            on: step == Step::Hit,
            tick,
        })
        .collect()
}
