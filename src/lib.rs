/// DRUMLOOP - a step-sequencer drum machine library
///
/// This library provides the core components for building a drum machine:
/// - Instruments: a percussion voice plus a hit/rest step pattern
/// - Track list and the per-instrument event timeline derived from it
/// - Playback controller driving a looping clock engine
/// - JSON persistence, MIDI output, and a preview audio voice

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod persistence;
pub mod sequencer;
pub mod session;

// Re-export commonly used types
pub use audio::{AudioOutput, AudioVoice};
pub use config::Config;
pub use error::{DrumError, Result};
pub use midi::MidiOutputDevice;
pub use persistence::JsonStore;
pub use sequencer::instrument::{voice_code, voice_label, voice_name, voices, Instrument, Step};
pub use sequencer::playback::{
    ClockEngine, Engine, OutputConnector, PlaybackController, PlaybackEvent, PlaybackState,
    VoiceOutput,
};
pub use sequencer::timeline::{NoteEvent, Timeline};
pub use sequencer::{ReplacePolicy, TrackList};
pub use session::{Command, Session};
