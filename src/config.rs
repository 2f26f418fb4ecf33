/// Runtime configuration, read from the environment with sane defaults
use crate::sequencer::ReplacePolicy;
use log::warn;
use std::path::PathBuf;

pub const DEFAULT_BPM: u32 = 120;
pub const DEFAULT_STORE: &str = "./data/drumloop.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Tempo of a fresh session
    pub bpm: u32,
    /// File used by save/load
    pub store_path: PathBuf,
    pub replace_policy: ReplacePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            store_path: PathBuf::from(DEFAULT_STORE),
            replace_policy: ReplacePolicy::InPlace,
        }
    }
}

impl Config {
    /// `DRUMLOOP_BPM`, `DRUMLOOP_STORE`, `DRUMLOOP_REPLACE` (in-place | move-to-end)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bpm) = var("DRUMLOOP_BPM") {
            match bpm.trim().parse::<u32>() {
                Ok(bpm) if bpm > 0 => config.bpm = bpm,
                _ => warn!("Ignoring DRUMLOOP_BPM={:?}: not a positive integer", bpm),
            }
        }

        if let Some(path) = var("DRUMLOOP_STORE") {
            config.store_path = PathBuf::from(path);
        }

        if let Some(policy) = var("DRUMLOOP_REPLACE") {
            match policy.trim() {
                "in-place" => config.replace_policy = ReplacePolicy::InPlace,
                "move-to-end" => config.replace_policy = ReplacePolicy::MoveToEnd,
                other => warn!("Ignoring DRUMLOOP_REPLACE={:?}", other),
            }
        }

        config
    }
}
