/// Preview audio output using cpal
/// A decaying tone per hit, pitched by voice code. Used when no MIDI port is connected.
use crate::error::{DrumError, Result};
use crate::sequencer::playback::VoiceOutput;
use crate::sequencer::timeline::{NoteEvent, NOTE_VELOCITY};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info};
use std::sync::{Arc, Mutex, PoisonError};

// Per-sample envelope multiplier, roughly a 100ms ring at 44.1kHz
const DECAY: f32 = 0.9992;
const SILENCE: f32 = 0.001;

#[derive(Debug, Default)]
struct VoiceState {
    phase: f32,
    frequency: f32,
    level: f32,
}

impl VoiceState {
    fn next_sample(&mut self, sample_rate: f32) -> f32 {
        if self.level < SILENCE {
            self.level = 0.0;
            self.phase = 0.0;
            return 0.0;
        }
        let sample = (self.phase * 2.0 * std::f32::consts::PI).sin() * 0.2 * self.level;
        self.phase += self.frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.level *= DECAY;
        sample
    }
}

/// Owns the cpal stream; must stay on the thread that created it
pub struct AudioOutput {
    _stream: cpal::Stream,
    state: Arc<Mutex<VoiceState>>,
}

impl AudioOutput {
    pub fn new() -> Result<Self> {
        let state = Arc::new(Mutex::new(VoiceState::default()));
        let stream = Self::setup_audio_stream(Arc::clone(&state))?;
        info!("Preview audio output ready");

        Ok(Self {
            _stream: stream,
            state,
        })
    }

    fn setup_audio_stream(state: Arc<Mutex<VoiceState>>) -> Result<cpal::Stream> {
        let unavailable = |what: &str| DrumError::EngineUnavailable(what.to_string());

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| unavailable("no default audio output device"))?;
        let config = device
            .default_output_config()
            .map_err(|e| unavailable(&format!("no usable output config: {}", e)))?;

        let sample_rate = config.sample_rate().0 as f32;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut voice = state.lock().unwrap_or_else(PoisonError::into_inner);
                    for sample in data.iter_mut() {
                        *sample = voice.next_sample(sample_rate);
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            ),
            other => {
                return Err(unavailable(&format!("unsupported sample format {:?}", other)));
            }
        };

        let stream = stream.map_err(|e| unavailable(&format!("failed to build stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| unavailable(&format!("failed to play stream: {}", e)))?;
        Ok(stream)
    }

    /// Handle the clock thread can trigger hits through
    pub fn voice(&self) -> AudioVoice {
        AudioVoice {
            state: Arc::clone(&self.state),
        }
    }
}

#[derive(Clone)]
pub struct AudioVoice {
    state: Arc<Mutex<VoiceState>>,
}

impl VoiceOutput for AudioVoice {
    fn play(&mut self, event: &NoteEvent) {
        // Drums ring out; note-off has nothing to cut
        if !event.on {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.frequency = voice_to_frequency(event.voice);
        state.level = NOTE_VELOCITY as f32 / 127.0;
        state.phase = 0.0;
    }
}

fn voice_to_frequency(voice: u8) -> f32 {
    440.0 * 2.0_f32.powf((voice as f32 - 69.0) / 12.0)
}
