/// Instruments: a General MIDI percussion voice plus its step pattern
use crate::error::{DrumError, Result};

/// Lowest voice code in the percussion key map
pub const FIRST_VOICE: u8 = 35;
/// Highest voice code in the percussion key map
pub const LAST_VOICE: u8 = 81;

/// Symbol for a hit in a step pattern
pub const HIT_SYMBOL: char = 'x';
/// Symbol for a rest in a step pattern
pub const REST_SYMBOL: char = '-';

// Indexed by `code - FIRST_VOICE`
static VOICE_NAMES: [&str; (LAST_VOICE - FIRST_VOICE + 1) as usize] = [
    "Acoustic Bass Drum",
    "Bass Drum 1",
    "Side Stick",
    "Acoustic Snare",
    "Hand Clap",
    "Electric Snare",
    "Low Floor Tom",
    "Closed Hi-Hat",
    "High Floor Tom",
    "Pedal Hi-Hat",
    "Low Tom",
    "Open Hi-Hat",
    "Low Mid-Tom",
    "Hi-Mid Tom",
    "Crash Cymbal 1",
    "High Tom",
    "Ride Cymbal 1",
    "Chinese Cymbal",
    "Ride Bell",
    "Tambourine",
    "Splash Cymbal",
    "Cowbell",
    "Crash Cymbal 2",
    "Vibraslap",
    "Ride Cymbal 2",
    "Hi Bongo",
    "Low Bongo",
    "Mute Hi Conga",
    "Open Hi Conga",
    "Low Conga",
    "High Timbale",
    "Low Timbale",
    "High Agogo",
    "Low Agogo",
    "Cabasa",
    "Maracas",
    "Short Whistle",
    "Long Whistle",
    "Short Guiro",
    "Long Guiro",
    "Claves",
    "Hi Wood Block",
    "Low Wood Block",
    "Mute Cuica",
    "Open Cuica",
    "Mute Triangle",
    "Open Triangle",
];

/// Name of a percussion voice, or `None` when the code is outside the key map
pub fn voice_name(code: u8) -> Option<&'static str> {
    code.checked_sub(FIRST_VOICE)
        .and_then(|offset| VOICE_NAMES.get(offset as usize))
        .copied()
}

/// Display label for a voice code, e.g. `"38 Acoustic Snare"`
pub fn voice_label(code: u8) -> String {
    match voice_name(code) {
        Some(name) => format!("{} {}", code, name),
        None => format!("{} ?", code),
    }
}

/// Reverse lookup, case-insensitive
pub fn voice_code(name: &str) -> Option<u8> {
    let name = name.trim();
    VOICE_NAMES
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(name))
        .map(|offset| FIRST_VOICE + offset as u8)
}

/// All `(code, name)` pairs in code order
pub fn voices() -> impl Iterator<Item = (u8, &'static str)> {
    VOICE_NAMES
        .iter()
        .enumerate()
        .map(|(offset, name)| (FIRST_VOICE + offset as u8, *name))
}

fn validate_code(code: i64) -> Result<u8> {
    u8::try_from(code)
        .ok()
        .filter(|code| (FIRST_VOICE..=LAST_VOICE).contains(code))
        .ok_or(DrumError::InvalidVoiceCode(code))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Hit,
    Rest,
}

impl Step {
    /// Anything other than the hit symbol is read as a rest
    pub fn from_symbol(symbol: char) -> Self {
        if symbol == HIT_SYMBOL {
            Step::Hit
        } else {
            Step::Rest
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Step::Hit => HIT_SYMBOL,
            Step::Rest => REST_SYMBOL,
        }
    }
}

/// A percussion voice and the pattern it plays.
///
/// Code and pattern are replaced wholesale; there is no per-step mutation.
/// The pattern string is kept verbatim so it round-trips through storage
/// exactly, including any symbols the timeline treats as rests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    code: u8,
    pattern: String,
}

impl Instrument {
    pub fn new(code: i64, pattern: impl Into<String>) -> Result<Self> {
        Ok(Self {
            code: validate_code(code)?,
            pattern: pattern.into(),
        })
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn name(&self) -> &'static str {
        // The code is validated on every write, so the lookup cannot miss.
        voice_name(self.code).unwrap_or("Unknown")
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.pattern.chars().map(Step::from_symbol)
    }

    pub fn step_count(&self) -> usize {
        self.pattern.chars().count()
    }

    /// Replace the voice; on error the instrument is left unchanged
    pub fn replace_code(&mut self, code: i64) -> Result<()> {
        self.code = validate_code(code)?;
        Ok(())
    }

    pub fn replace_pattern(&mut self, pattern: impl Into<String>) {
        self.pattern = pattern.into();
    }

    /// Copy of this instrument with one step flipped, for toggle-grid editors.
    /// Positions past the end of the pattern pad it with rests first.
    pub fn with_step_toggled(&self, position: usize) -> Self {
        let mut steps: Vec<Step> = self.steps().collect();
        if steps.len() <= position {
            steps.resize(position + 1, Step::Rest);
        }
        steps[position] = match steps[position] {
            Step::Hit => Step::Rest,
            Step::Rest => Step::Hit,
        };
        Self {
            code: self.code,
            pattern: steps.iter().map(|step| step.symbol()).collect(),
        }
    }
}
