//! Player configuration.
//!
//! Defaults reproduce the classic demo: General MIDI piano (bank 0,
//! preset 0) on channel 0, middle C at velocity 100, held for one second.
//! A JSON file can override any subset of the fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A small general-purpose SoundFont used when no local file is selected.
pub const DEFAULT_SOUNDFONT_URL: &str =
    "https://cdn.jsdelivr.net/gh/jet2jet/js-synthesizer@1.1.0/test/soundfonts/GeneralUser_gs_mini.sf2";

/// Runtime configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SoundFont fetched in note mode when no local file was chosen.
    /// `None` disables the fallback.
    pub soundfont_url: Option<String>,
    /// MIDI channel used for the test note (0-15).
    pub channel: u8,
    /// SoundFont bank number.
    pub bank: u16,
    /// Preset (program) number within the bank.
    pub preset: u8,
    /// MIDI note number of the test note. 60 = C4.
    pub note: u8,
    /// Note velocity (0-127).
    pub velocity: u8,
    /// How long the test note is held before note-off.
    pub note_hold_ms: u64,
    /// Synthesis sample rate in Hz.
    pub sample_rate: u32,
    /// Number of samples exposed to the waveform visualizer.
    pub analyser_size: usize,
    /// Silence rendered after the last event so releases can ring out.
    pub release_tail_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            soundfont_url: Some(DEFAULT_SOUNDFONT_URL.to_string()),
            channel: 0,
            bank: 0,
            preset: 0,
            note: 60,
            velocity: 100,
            note_hold_ms: 1000,
            sample_rate: 44100,
            analyser_size: 2048,
            release_tail_ms: 2000,
        }
    }
}

impl Config {
    /// Loads a configuration file. Missing fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Hold duration of the test note.
    pub fn note_hold(&self) -> Duration {
        Duration::from_millis(self.note_hold_ms)
    }

    /// Release tail appended to offline renders.
    pub fn release_tail(&self) -> Duration {
        Duration::from_millis(self.release_tail_ms)
    }
}
