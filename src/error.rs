//! Error types for loading resources and running playback attempts.

use std::path::PathBuf;

/// Errors that can end a playback attempt or reject a selected file.
///
/// Every variant is recovered the same way: the message becomes the status
/// line and the Start control is re-enabled.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The audio engine could not be brought up (e.g. no output device).
    #[error("synthesizer engine not ready: {0}")]
    EngineNotReady(String),
    /// The engine reported the failure sentinel for a SoundFont.
    #[error("failed to load SoundFont from {0}; check the file or URL")]
    SoundFontLoad(String),
    /// A user-selected file could not be read.
    #[error("could not read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Downloading a SoundFont URL failed.
    #[error("could not fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    /// The selected MIDI file could not be parsed.
    #[error("invalid MIDI file {name}: {reason}")]
    MidiParse { name: String, reason: String },
    /// The MIDI player failed while running.
    #[error("player error: {0}")]
    Player(String),
    /// Anything else raised during an attempt.
    #[error("{0}")]
    Unexpected(String),
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, PlayerError>;
