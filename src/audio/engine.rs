//! Audio engine for SoundFont synthesis.
//!
//! Defines the engine contract the playback session drives, and the
//! production implementation: rustysynth for synthesis, rodio for output.

use crate::audio::analyser::Analyser;
use crate::error::{PlayerError, Result};
use crate::midi::MidiClip;
use rodio::{OutputStream, OutputStreamHandle, Source};
use rustysynth::{MidiFileSequencer, SoundFont, Synthesizer, SynthesizerSettings};
use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Audio buffer size for low-latency playback.
/// Smaller = lower latency but higher CPU usage.
const BUFFER_SIZE: usize = 256;

/// Raw identifier returned by [`SynthEngine::load_soundfont`] on failure.
pub const SOUNDFONT_LOAD_FAILED: i32 = -1;

/// Identifier of a SoundFont loaded into an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundFontId(i32);

impl SoundFontId {
    /// Converts an engine's raw identifier. The sentinel, like any other
    /// negative value, is rejected.
    pub fn from_raw(raw: i32) -> Option<Self> {
        (raw >= 0).then_some(Self(raw))
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for SoundFontId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle signals emitted by a MIDI file player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The first block of the file has been rendered.
    Start,
    /// The sequencer passed the end of the file.
    End,
    /// Playback broke off.
    Error(String),
}

/// Construction options for an engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub sample_rate: u32,
    /// Output context to feed, if the caller wants to visualize the output.
    pub analyser: Option<Analyser>,
}

/// The synthesizer contract used by a playback session.
///
/// `load_soundfont` reports failure with [`SOUNDFONT_LOAD_FAILED`] rather than
/// an error, like the C synthesizer APIs this mirrors; the session turns the
/// sentinel into a [`PlayerError`].
pub trait SynthEngine {
    /// Blocks until the engine can accept calls.
    fn wait_for_ready(&mut self) -> Result<()>;

    /// Loads SoundFont bytes, returning an identifier or the failure sentinel.
    fn load_soundfont(&mut self, data: &[u8]) -> i32;

    /// Selects bank and preset of a loaded SoundFont on a channel.
    fn program_select(&mut self, channel: u8, sfont: SoundFontId, bank: u16, preset: u8)
        -> Result<()>;

    fn note_on(&mut self, channel: u8, key: u8, velocity: u8);

    fn note_off(&mut self, channel: u8, key: u8);

    /// Attaches a player for `clip` and starts it. Lifecycle events arrive on
    /// the returned channel.
    fn start_player(&mut self, clip: &MidiClip) -> Result<Receiver<PlayerEvent>>;

    /// The output context this engine feeds, if any.
    fn analyser(&self) -> Option<&Analyser>;
}

/// Creates engines on the thread that will own them.
///
/// Audio output handles are tied to their thread, so each playback attempt
/// asks the factory for a fresh engine on its worker thread.
pub trait EngineFactory: Send + Sync {
    fn create(&self, options: EngineOptions) -> Box<dyn SynthEngine>;
}

/// Factory for [`RustySynthEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RustySynthFactory;

impl EngineFactory for RustySynthFactory {
    fn create(&self, options: EngineOptions) -> Box<dyn SynthEngine> {
        Box::new(RustySynthEngine::new(options))
    }
}

/// A player bound to the synthesizer.
struct SequencedVoice {
    sequencer: MidiFileSequencer,
    events: Sender<PlayerEvent>,
    started: bool,
    finished: bool,
}

impl SequencedVoice {
    fn emit(&self, event: PlayerEvent) {
        // The session may already have given up listening.
        let _ = self.events.send(event);
    }
}

/// What the audio thread renders from.
enum Voice {
    /// No SoundFont selected yet.
    Silent,
    /// Direct note playback.
    Live(Synthesizer),
    /// MIDI file playback.
    Sequenced(SequencedVoice),
}

impl Voice {
    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        match self {
            Voice::Silent => {
                left.fill(0.0);
                right.fill(0.0);
            }
            Voice::Live(synth) => synth.render(left, right),
            Voice::Sequenced(voice) => {
                if !voice.started {
                    voice.started = true;
                    voice.emit(PlayerEvent::Start);
                }
                voice.sequencer.render(left, right);
                if !voice.finished && voice.sequencer.end_of_sequence() {
                    voice.finished = true;
                    voice.emit(PlayerEvent::End);
                }
            }
        }
    }
}

/// Audio source that generates samples from the shared voice.
/// Implements rodio's Source trait for playback.
struct SynthSource {
    voice: Arc<Mutex<Voice>>,
    analyser: Option<Analyser>,
    sample_rate: u32,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    buf_pos: usize,
    /// Current channel (0 = left, 1 = right).
    channel: usize,
}

impl SynthSource {
    fn new(voice: Arc<Mutex<Voice>>, analyser: Option<Analyser>, sample_rate: u32) -> Self {
        Self {
            voice,
            analyser,
            sample_rate,
            left_buf: vec![0.0; BUFFER_SIZE],
            right_buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            channel: 0,
        }
    }

    fn render_block(&mut self) {
        match self.voice.lock() {
            Ok(mut voice) => voice.render(&mut self.left_buf, &mut self.right_buf),
            Err(poisoned) => {
                // A panic elsewhere left the voice in an unknown state:
                // tell any player, then fall silent for good.
                let mut voice = poisoned.into_inner();
                if let Voice::Sequenced(seq) = &*voice {
                    if !seq.finished {
                        seq.emit(PlayerEvent::Error("synthesizer state lost".to_string()));
                    }
                }
                *voice = Voice::Silent;
                self.left_buf.fill(0.0);
                self.right_buf.fill(0.0);
            }
        }

        if let Some(analyser) = &self.analyser {
            analyser.push_stereo(&self.left_buf, &self.right_buf);
        }
        self.buf_pos = 0;
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buf_pos >= BUFFER_SIZE {
            self.render_block();
        }

        // Interleave stereo samples: L, R, L, R, ...
        let sample = if self.channel == 0 {
            self.left_buf[self.buf_pos]
        } else {
            self.right_buf[self.buf_pos]
        };

        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.buf_pos += 1;
        }

        Some(sample)
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// SoundFont synthesizer playing through the default audio device.
///
/// SoundFont identifiers start at 1, in load order.
pub struct RustySynthEngine {
    options: EngineOptions,
    soundfonts: Vec<Arc<SoundFont>>,
    /// Index into `soundfonts` of the font the voice was built from.
    active_font: Option<usize>,
    voice: Arc<Mutex<Voice>>,
    /// Audio output (must be kept alive while playing).
    output: Option<(OutputStream, OutputStreamHandle)>,
}

impl RustySynthEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            soundfonts: Vec::new(),
            active_font: None,
            voice: Arc::new(Mutex::new(Voice::Silent)),
            output: None,
        }
    }

    fn with_voice<T>(&self, f: impl FnOnce(&mut Voice) -> T) -> Option<T> {
        self.voice.lock().ok().map(|mut voice| f(&mut voice))
    }

    /// Runs `f` on the live synthesizer. Returns false when there is none.
    fn with_live_synth(&self, f: impl FnOnce(&mut Synthesizer)) -> bool {
        self.with_voice(|voice| match voice {
            Voice::Live(synth) => {
                f(synth);
                true
            }
            _ => false,
        })
        .unwrap_or(false)
    }

    fn build_synth(&self, font_index: usize) -> Result<Synthesizer> {
        let font = self
            .soundfonts
            .get(font_index)
            .ok_or_else(|| PlayerError::Player("no SoundFont selected".to_string()))?;
        let settings = SynthesizerSettings::new(self.options.sample_rate as i32);
        Synthesizer::new(font, &settings)
            .map_err(|e| PlayerError::Player(format!("failed to create synthesizer: {:?}", e)))
    }
}

impl SynthEngine for RustySynthEngine {
    fn wait_for_ready(&mut self) -> Result<()> {
        if self.output.is_some() {
            return Ok(());
        }

        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| PlayerError::EngineNotReady(e.to_string()))?;
        let source = SynthSource::new(
            Arc::clone(&self.voice),
            self.options.analyser.clone(),
            self.options.sample_rate,
        );
        handle
            .play_raw(source)
            .map_err(|e| PlayerError::EngineNotReady(e.to_string()))?;

        tracing::info!(sample_rate = self.options.sample_rate, "audio output opened");
        self.output = Some((stream, handle));
        Ok(())
    }

    fn load_soundfont(&mut self, data: &[u8]) -> i32 {
        match SoundFont::new(&mut Cursor::new(data)) {
            Ok(font) => {
                tracing::info!(
                    bank = font.get_info().get_bank_name().trim(),
                    presets = font.get_presets().len(),
                    "SoundFont parsed"
                );
                self.soundfonts.push(Arc::new(font));
                self.soundfonts.len() as i32
            }
            Err(e) => {
                tracing::warn!("SoundFont rejected: {:?}", e);
                SOUNDFONT_LOAD_FAILED
            }
        }
    }

    fn program_select(
        &mut self,
        channel: u8,
        sfont: SoundFontId,
        bank: u16,
        preset: u8,
    ) -> Result<()> {
        let font_index = usize::try_from(sfont.as_i32() - 1)
            .map_err(|_| PlayerError::Player(format!("unknown SoundFont ID {}", sfont)))?;
        if self.active_font != Some(font_index) {
            let synth = self.build_synth(font_index)?;
            self.with_voice(|voice| *voice = Voice::Live(synth))
                .ok_or_else(|| PlayerError::Player("synthesizer state lost".to_string()))?;
            self.active_font = Some(font_index);
        }

        tracing::debug!(channel, %sfont, bank, preset, "program select");
        let selected = self.with_live_synth(|synth| {
            // Bank select MSB (CC 0), then program change (0xC0)
            synth.process_midi_message(channel as i32, 0xB0, 0x00, bank.min(127) as i32);
            synth.process_midi_message(channel as i32, 0xC0, preset as i32, 0);
        });
        if !selected {
            return Err(PlayerError::Player(
                "no synthesizer to select an instrument on".to_string(),
            ));
        }
        Ok(())
    }

    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        tracing::debug!(channel, key, velocity, "note on");
        self.with_live_synth(|synth| synth.note_on(channel as i32, key as i32, velocity as i32));
    }

    fn note_off(&mut self, channel: u8, key: u8) {
        tracing::debug!(channel, key, "note off");
        self.with_live_synth(|synth| synth.note_off(channel as i32, key as i32));
    }

    fn start_player(&mut self, clip: &MidiClip) -> Result<Receiver<PlayerEvent>> {
        if self.output.is_none() {
            return Err(PlayerError::EngineNotReady(
                "audio output not opened".to_string(),
            ));
        }

        let font_index = self
            .active_font
            .or_else(|| self.soundfonts.len().checked_sub(1))
            .ok_or_else(|| PlayerError::Player("no SoundFont loaded".to_string()))?;

        // Reuse the configured synthesizer when there is one.
        let live = self
            .with_voice(|voice| match std::mem::replace(voice, Voice::Silent) {
                Voice::Live(synth) => Some(synth),
                _ => None,
            })
            .flatten();
        let synth = match live {
            Some(synth) => synth,
            None => self.build_synth(font_index)?,
        };

        let (events, receiver) = mpsc::channel();
        let mut sequencer = MidiFileSequencer::new(synth);
        sequencer.play(clip.file(), false);

        self.with_voice(|voice| {
            *voice = Voice::Sequenced(SequencedVoice {
                sequencer,
                events,
                started: false,
                finished: false,
            })
        })
        .ok_or_else(|| PlayerError::Player("synthesizer state lost".to_string()))?;

        tracing::info!(clip = clip.name(), "MIDI player started");
        Ok(receiver)
    }

    fn analyser(&self) -> Option<&Analyser> {
        self.options.analyser.as_ref()
    }
}

impl Drop for RustySynthEngine {
    fn drop(&mut self) {
        if let Some(analyser) = &self.options.analyser {
            analyser.close();
        }
    }
}
