//! Audio engine for SoundFont synthesis and playback.
//!
//! This module provides real-time synthesis using rustysynth
//! and audio output via rodio. It supports:
//! - Loading SoundFonts from memory
//! - Direct note playback and MIDI file playback
//! - A time-domain analyser for visualizing the output
//! - Offline WAV rendering

pub mod analyser;
pub mod engine;
pub mod export;

pub use analyser::Analyser;
pub use engine::{
    EngineFactory, EngineOptions, PlayerEvent, RustySynthFactory, SoundFontId, SynthEngine,
};
pub use export::{render_to_wav, RenderJob};
