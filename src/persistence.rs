/// JSON persistence for the track list (tempo + instruments only)
use crate::error::{DrumError, Result};
use crate::sequencer::instrument::Instrument;
use crate::sequencer::TrackList;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// On-disk record. The timeline is rebuilt on load, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackListRecord {
    pub bpm: i64,
    pub instruments: Vec<InstrumentRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub number: i64,
    pub notes: String,
}

impl From<&TrackList> for TrackListRecord {
    fn from(tracks: &TrackList) -> Self {
        Self {
            bpm: i64::from(tracks.bpm()),
            instruments: tracks
                .instruments()
                .iter()
                .map(|instrument| InstrumentRecord {
                    number: i64::from(instrument.code()),
                    notes: instrument.pattern().to_string(),
                })
                .collect(),
        }
    }
}

impl TryFrom<TrackListRecord> for TrackList {
    type Error = DrumError;

    fn try_from(record: TrackListRecord) -> Result<Self> {
        let bpm = u32::try_from(record.bpm)
            .ok()
            .filter(|bpm| *bpm > 0)
            .ok_or(DrumError::InvalidTempo(record.bpm))?;

        let mut tracks = TrackList::new(bpm)?;
        for instrument in record.instruments {
            tracks.add_instrument(Instrument::new(instrument.number, instrument.notes)?);
        }
        Ok(tracks)
    }
}

pub fn to_json(tracks: &TrackList) -> Result<String> {
    Ok(serde_json::to_string_pretty(&TrackListRecord::from(tracks))?)
}

pub fn from_json(json: &str) -> Result<TrackList> {
    let record: TrackListRecord = serde_json::from_str(json)?;
    TrackList::try_from(record)
}

/// Reads and writes one JSON file
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(&self, tracks: &TrackList) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, to_json(tracks)?)?;
        info!(
            "Saved {} tracks at {} bpm to {}",
            tracks.len(),
            tracks.bpm(),
            self.path.display()
        );
        Ok(())
    }

    pub fn read(&self) -> Result<TrackList> {
        let json = fs::read_to_string(&self.path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => DrumError::NotFound(self.path.clone()),
            _ => DrumError::Io(err),
        })?;
        let tracks = from_json(&json)?;
        info!(
            "Loaded {} tracks at {} bpm from {}",
            tracks.len(),
            tracks.bpm(),
            self.path.display()
        );
        Ok(tracks)
    }
}
