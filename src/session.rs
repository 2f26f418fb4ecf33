/// Session - the front-end boundary. Commands from a GUI or text menu land
/// here and are applied to the track list and the playback controller.
use crate::config::Config;
use crate::error::Result;
use crate::persistence::JsonStore;
use crate::sequencer::instrument::Instrument;
use crate::sequencer::playback::{Engine, PlaybackController};
use crate::sequencer::TrackList;
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddInstrument(Instrument),
    RemoveInstrument(usize),
    ReplaceInstrument(usize, Instrument),
    SetTempo(u32),
    Start,
    Stop,
    Save,
    Load,
}

pub struct Session<E: Engine> {
    tracks: TrackList,
    playback: PlaybackController<E>,
    store: JsonStore,
}

impl<E: Engine> Session<E> {
    pub fn new(config: &Config, engine: E) -> Result<Self> {
        let tracks = TrackList::new(config.bpm)?.with_replace_policy(config.replace_policy);
        Ok(Self {
            tracks,
            playback: PlaybackController::new(engine),
            store: JsonStore::new(config.store_path.clone()),
        })
    }

    pub fn tracks(&self) -> &TrackList {
        &self.tracks
    }

    pub fn playback(&self) -> &PlaybackController<E> {
        &self.playback
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_running()
    }

    pub fn dispatch(&mut self, command: Command) -> Result<()> {
        debug!("Dispatching {:?}", command);
        match command {
            Command::AddInstrument(instrument) => {
                self.add_instrument(instrument);
            }
            Command::RemoveInstrument(index) => {
                self.remove_instrument(index)?;
            }
            Command::ReplaceInstrument(index, instrument) => {
                self.replace_instrument(index, instrument)?;
            }
            Command::SetTempo(bpm) => self.set_tempo(bpm)?,
            Command::Start => self.start()?,
            Command::Stop => self.stop(),
            Command::Save => self.save()?,
            Command::Load => self.load()?,
        }
        Ok(())
    }

    // Structural edits always stop playback first; the clock is never
    // handed a timeline that changes under it.

    pub fn add_instrument(&mut self, instrument: Instrument) -> usize {
        self.playback.stop();
        self.tracks.add_instrument(instrument)
    }

    pub fn remove_instrument(&mut self, index: usize) -> Result<Instrument> {
        self.playback.stop();
        self.tracks.remove_instrument(index)
    }

    pub fn replace_instrument(&mut self, index: usize, instrument: Instrument) -> Result<usize> {
        self.playback.stop();
        self.tracks.replace_instrument(index, instrument)
    }

    pub fn set_tempo(&mut self, bpm: u32) -> Result<()> {
        self.tracks.set_tempo(bpm)?;
        self.playback.change_tempo(bpm);
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.playback.start(&self.tracks)
    }

    pub fn stop(&mut self) {
        self.playback.stop();
    }

    pub fn save(&self) -> Result<()> {
        self.store.write(&self.tracks)
    }

    /// Replace the session's tracks with the stored ones. On error the
    /// current tracks are kept (playback is still stopped).
    pub fn load(&mut self) -> Result<()> {
        self.playback.stop();
        let policy = self.tracks.replace_policy();
        self.tracks = self.store.read()?.with_replace_policy(policy);
        Ok(())
    }
}
