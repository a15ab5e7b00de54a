//! Synthesizer sessions and playback attempts.
//!
//! A [`SynthSession`] owns one engine for the length of one playback attempt.
//! [`attempt`] runs the attempt's steps in order on a worker thread and
//! reports progress to the controller.

pub mod attempt;
#[cfg(test)]
pub(crate) mod mock;
pub mod phase;

pub use attempt::{spawn_attempt, AttemptPlan, AttemptUpdate, PlaybackKind};
pub use phase::{Phase, Transition};

use crate::audio::{Analyser, EngineFactory, EngineOptions, PlayerEvent, SoundFontId, SynthEngine};
use crate::config::Config;
use crate::error::{PlayerError, Result};
use crate::loader::SoundFontSource;
use crate::midi::MidiClip;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Parameters of a direct note playback. Passed to the engine unchecked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteRequest {
    pub channel: u8,
    pub bank: u16,
    pub preset: u8,
    pub note: u8,
    pub velocity: u8,
    /// Time between note-on and note-off.
    pub hold: Duration,
}

impl NoteRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            channel: config.channel,
            bank: config.bank,
            preset: config.preset,
            note: config.note,
            velocity: config.velocity,
            hold: config.note_hold(),
        }
    }
}

/// One engine instance plus the SoundFont loaded into it.
pub struct SynthSession {
    engine: Box<dyn SynthEngine>,
    soundfont: Option<SoundFontId>,
}

impl SynthSession {
    /// Creates an engine and waits until it is ready.
    pub fn initialize(factory: &dyn EngineFactory, options: EngineOptions) -> Result<Self> {
        let mut engine = factory.create(options);
        engine.wait_for_ready()?;
        Ok(Self {
            engine,
            soundfont: None,
        })
    }

    /// Loads a SoundFont, converting the engine's failure sentinel into an error.
    pub fn load_soundfont(&mut self, source: &SoundFontSource) -> Result<SoundFontId> {
        let buffer = source.resolve()?;
        let raw = self.engine.load_soundfont(buffer.bytes());
        let id = SoundFontId::from_raw(raw)
            .ok_or_else(|| PlayerError::SoundFontLoad(source.describe().to_string()))?;

        tracing::info!(%id, source = source.describe(), "SoundFont loaded");
        self.soundfont = Some(id);
        Ok(id)
    }

    /// Selects the instrument on the request's channel.
    pub fn select_instrument(&mut self, request: &NoteRequest) -> Result<()> {
        let sfont = self
            .soundfont
            .ok_or_else(|| PlayerError::Unexpected("no SoundFont loaded".to_string()))?;
        self.engine
            .program_select(request.channel, sfont, request.bank, request.preset)
    }

    /// Plays one note: note-on, `while_held`, wait out the hold, note-off.
    ///
    /// Exactly one note-off is sent, for the same channel and key.
    pub fn play_note(&mut self, request: &NoteRequest, while_held: impl FnOnce()) {
        self.engine
            .note_on(request.channel, request.note, request.velocity);
        while_held();
        std::thread::sleep(request.hold);
        self.engine.note_off(request.channel, request.note);
    }

    /// Starts a player for `clip`.
    pub fn play_file(&mut self, clip: &MidiClip) -> Result<Receiver<PlayerEvent>> {
        if self.soundfont.is_none() {
            return Err(PlayerError::Unexpected("no SoundFont loaded".to_string()));
        }
        self.engine.start_player(clip)
    }

    pub fn soundfont(&self) -> Option<SoundFontId> {
        self.soundfont
    }

    /// The output context the engine feeds, if it was bound to one.
    pub fn analyser(&self) -> Option<&Analyser> {
        self.engine.analyser()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Call, MockFactory};
    use super::*;
    use crate::loader::ResourceBuffer;

    fn options() -> EngineOptions {
        EngineOptions {
            sample_rate: 44100,
            analyser: None,
        }
    }

    fn font() -> SoundFontSource {
        SoundFontSource::Buffer(ResourceBuffer::new("test.sf2", vec![0; 8]))
    }

    #[test]
    fn test_initialize_waits_for_ready() {
        let factory = MockFactory::new();
        SynthSession::initialize(&factory, options()).unwrap();
        assert_eq!(factory.calls(), vec![Call::WaitForReady]);
    }

    #[test]
    fn test_engine_not_ready() {
        let factory = MockFactory::new().not_ready("no device");
        let err = SynthSession::initialize(&factory, options()).err().unwrap();
        assert!(matches!(err, PlayerError::EngineNotReady(_)));
    }

    #[test]
    fn test_sentinel_becomes_error() {
        let factory = MockFactory::new().soundfont_result(-1);
        let mut session = SynthSession::initialize(&factory, options()).unwrap();
        let err = session.load_soundfont(&font()).unwrap_err();
        assert!(matches!(err, PlayerError::SoundFontLoad(ref s) if s == "test.sf2"));
        assert_eq!(session.soundfont(), None);
    }

    #[test]
    fn test_select_requires_soundfont() {
        let factory = MockFactory::new();
        let mut session = SynthSession::initialize(&factory, options()).unwrap();
        let request = NoteRequest::from_config(&Config::default());
        assert!(session.select_instrument(&request).is_err());
    }

    #[test]
    fn test_program_select_error_propagates() {
        let factory = MockFactory::new().program_select_error("bad rate");
        let mut session = SynthSession::initialize(&factory, options()).unwrap();
        session.load_soundfont(&font()).unwrap();
        let request = NoteRequest::from_config(&Config::default());
        assert!(matches!(
            session.select_instrument(&request),
            Err(PlayerError::Player(ref s)) if s == "bad rate"
        ));
    }

    #[test]
    fn test_note_on_then_single_matching_note_off() {
        let factory = MockFactory::new();
        let mut session = SynthSession::initialize(&factory, options()).unwrap();
        let id = session.load_soundfont(&font()).unwrap();

        let request = NoteRequest {
            channel: 3,
            bank: 0,
            preset: 19,
            note: 64,
            velocity: 90,
            hold: Duration::from_millis(30),
        };
        session.select_instrument(&request).unwrap();

        let mut held = false;
        session.play_note(&request, || held = true);
        assert!(held);

        assert_eq!(
            factory.calls(),
            vec![
                Call::WaitForReady,
                Call::LoadSoundFont(8),
                Call::ProgramSelect {
                    channel: 3,
                    sfont: id.as_i32(),
                    bank: 0,
                    preset: 19
                },
                Call::NoteOn {
                    channel: 3,
                    key: 64,
                    velocity: 90
                },
                Call::NoteOff { channel: 3, key: 64 },
            ]
        );
        let gap = factory.note_gap().unwrap();
        assert!(gap >= Duration::from_millis(30));
    }
}
