/// Error types shared by the sequencer core, persistence and engines
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DrumError {
    #[error("Invalid voice code {0} (expected 35..=81)")]
    InvalidVoiceCode(i64),

    #[error("Invalid tempo {0} bpm (must be positive)")]
    InvalidTempo(i64),

    #[error("Track index {index} out of range (track list has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Sound engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DrumError>;
