/// Core sequencer logic - the track list and its derived timeline
/// Instruments and timeline blocks are kept index-aligned through every edit
use crate::error::{DrumError, Result};
use log::debug;

pub mod instrument;
pub mod playback;
pub mod timeline;

use instrument::Instrument;
use timeline::{block_for, Timeline};

/// Where `replace_instrument` leaves the replaced track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacePolicy {
    /// The new instrument takes the old one's index
    #[default]
    InPlace,
    /// Remove then append; the edited track moves to the end
    MoveToEnd,
}

#[derive(Debug, Clone)]
pub struct TrackList {
    instruments: Vec<Instrument>,
    timeline: Timeline,
    bpm: u32,
    replace_policy: ReplacePolicy,
}

impl TrackList {
    pub fn new(bpm: u32) -> Result<Self> {
        check_tempo(bpm)?;
        Ok(Self {
            instruments: Vec::new(),
            timeline: Timeline::default(),
            bpm,
            replace_policy: ReplacePolicy::default(),
        })
    }

    pub fn with_replace_policy(mut self, policy: ReplacePolicy) -> Self {
        self.replace_policy = policy;
        self
    }

    pub fn replace_policy(&self) -> ReplacePolicy {
        self.replace_policy
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Change the tempo. The timeline is tick-based and is not touched.
    pub fn set_tempo(&mut self, bpm: u32) -> Result<()> {
        check_tempo(bpm)?;
        self.bpm = bpm;
        Ok(())
    }

    /// Append an instrument and its block, returning its index
    pub fn add_instrument(&mut self, instrument: Instrument) -> usize {
        debug!(
            "Adding track {} ({}) pattern {:?}",
            instrument.code(),
            instrument.name(),
            instrument.pattern()
        );
        self.timeline.push_block(block_for(&instrument));
        self.instruments.push(instrument);
        self.debug_check_alignment();
        self.instruments.len() - 1
    }

    pub fn remove_instrument(&mut self, index: usize) -> Result<Instrument> {
        self.check_index(index)?;
        self.timeline.remove_block(index);
        let removed = self.instruments.remove(index);
        debug!("Removed track {} ({})", index, removed.name());
        self.debug_check_alignment();
        Ok(removed)
    }

    /// Swap the instrument at `index` for a new one and return where it landed
    pub fn replace_instrument(&mut self, index: usize, instrument: Instrument) -> Result<usize> {
        self.check_index(index)?;
        match self.replace_policy {
            ReplacePolicy::InPlace => {
                self.timeline.remove_block(index);
                self.timeline.insert_block(index, block_for(&instrument));
                self.instruments[index] = instrument;
                debug!("Replaced track {} in place", index);
                self.debug_check_alignment();
                Ok(index)
            }
            ReplacePolicy::MoveToEnd => {
                self.remove_instrument(index)?;
                Ok(self.add_instrument(instrument))
            }
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.instruments.len() {
            Ok(())
        } else {
            Err(DrumError::IndexOutOfRange {
                index,
                len: self.instruments.len(),
            })
        }
    }

    fn debug_check_alignment(&self) {
        debug_assert_eq!(self.instruments.len(), self.timeline.block_count());
    }
}

fn check_tempo(bpm: u32) -> Result<()> {
    if bpm == 0 {
        return Err(DrumError::InvalidTempo(0));
    }
    Ok(())
}
