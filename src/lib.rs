//! sfplayer - A terminal SoundFont player.
//!
//! This library provides the synthesizer session, the playback state machine
//! and the controller that the terminal front end drives.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod loader;
pub mod midi;
pub mod session;
pub mod ui;
pub mod visualizer;

// Re-export commonly used types
pub use app::{App, Mode};
pub use audio::{render_to_wav, Analyser, RustySynthFactory, SynthEngine};
pub use config::Config;
pub use error::{PlayerError, Result};
pub use loader::{ResourceBuffer, SoundFontSource};
pub use midi::MidiClip;
pub use session::{Phase, SynthSession, Transition};
