/// MIDI output using midir, on the General MIDI percussion channel
use crate::error::{DrumError, Result};
use crate::sequencer::playback::VoiceOutput;
use crate::sequencer::timeline::NoteEvent;
use log::{info, warn};
use midir::{MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "drumloop MIDI Output";

pub struct MidiOutputDevice {
    connection: MidiOutputConnection,
}

impl MidiOutputDevice {
    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    /// Connect to the port at `port_index`
    pub fn open(port_index: usize) -> Result<Self> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| {
            DrumError::EngineUnavailable(format!("Failed to create MIDI output: {}", e))
        })?;

        let ports = midi_out.ports();
        let port = ports.get(port_index).ok_or_else(|| {
            DrumError::EngineUnavailable(format!("Invalid MIDI port index {}", port_index))
        })?;
        let port_name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "drumloop")
            .map_err(|e| DrumError::EngineUnavailable(format!("Failed to connect: {}", e)))?;

        info!("Connected to MIDI port {:?}", port_name);
        Ok(Self { connection })
    }
}

impl VoiceOutput for MidiOutputDevice {
    fn play(&mut self, event: &NoteEvent) {
        let message = event.to_midi();
        if let Err(e) = self.connection.send(&message) {
            warn!("Failed to send MIDI message {:02x?}: {}", message, e);
        }
    }
}
