//! Recording engine for tests.

use crate::audio::{Analyser, EngineFactory, EngineOptions, PlayerEvent, SoundFontId, SynthEngine};
use crate::error::{PlayerError, Result};
use crate::midi::MidiClip;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// An engine call, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WaitForReady,
    /// Length of the SoundFont data.
    LoadSoundFont(usize),
    ProgramSelect {
        channel: u8,
        sfont: i32,
        bank: u16,
        preset: u8,
    },
    NoteOn {
        channel: u8,
        key: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        key: u8,
    },
    StartPlayer(String),
}

#[derive(Clone)]
struct Behaviour {
    not_ready: Option<String>,
    soundfont_result: i32,
    program_select_error: Option<String>,
    /// Events sent as soon as a player starts.
    script: Vec<PlayerEvent>,
    /// Keep the player's sender alive after the script.
    hold_player: bool,
}

type Log = Arc<Mutex<Vec<(Call, Instant)>>>;

/// Factory producing [`MockEngine`]s that share one call log.
#[derive(Clone)]
pub struct MockFactory {
    log: Log,
    behaviour: Behaviour,
    held: Arc<Mutex<Vec<mpsc::Sender<PlayerEvent>>>>,
    dropped: Arc<Mutex<Option<Instant>>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::default(),
            behaviour: Behaviour {
                not_ready: None,
                soundfont_result: 1,
                program_select_error: None,
                script: vec![PlayerEvent::Start, PlayerEvent::End],
                hold_player: false,
            },
            held: Arc::default(),
            dropped: Arc::default(),
        }
    }

    pub fn not_ready(mut self, reason: &str) -> Self {
        self.behaviour.not_ready = Some(reason.to_string());
        self
    }

    pub fn soundfont_result(mut self, raw: i32) -> Self {
        self.behaviour.soundfont_result = raw;
        self
    }

    pub fn program_select_error(mut self, reason: &str) -> Self {
        self.behaviour.program_select_error = Some(reason.to_string());
        self
    }

    pub fn player_script(mut self, script: Vec<PlayerEvent>) -> Self {
        self.behaviour.script = script;
        self
    }

    /// Leaves the player running (sender kept) after its script.
    pub fn hold_player(mut self) -> Self {
        self.behaviour.hold_player = true;
        self
    }

    /// Sends an event from a held player.
    pub fn emit(&self, event: PlayerEvent) {
        for sender in self.held.lock().unwrap().iter() {
            let _ = sender.send(event.clone());
        }
    }

    /// Drops held players, ending their event streams.
    pub fn release_players(&self) {
        self.held.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    /// Time between the first note-on and the first note-off.
    pub fn note_gap(&self) -> Option<Duration> {
        let log = self.log.lock().unwrap();
        let on = log.iter().find(|(c, _)| matches!(c, Call::NoteOn { .. }))?.1;
        let off = log.iter().find(|(c, _)| matches!(c, Call::NoteOff { .. }))?.1;
        Some(off.duration_since(on))
    }

    pub fn note_off_at(&self) -> Option<Instant> {
        let log = self.log.lock().unwrap();
        log.iter()
            .find(|(c, _)| matches!(c, Call::NoteOff { .. }))
            .map(|(_, at)| *at)
    }

    /// When the last engine was dropped.
    pub fn dropped_at(&self) -> Option<Instant> {
        *self.dropped.lock().unwrap()
    }
}

impl EngineFactory for MockFactory {
    fn create(&self, options: EngineOptions) -> Box<dyn SynthEngine> {
        Box::new(MockEngine {
            log: Arc::clone(&self.log),
            behaviour: self.behaviour.clone(),
            held: Arc::clone(&self.held),
            dropped: Arc::clone(&self.dropped),
            analyser: options.analyser,
        })
    }
}

pub struct MockEngine {
    log: Log,
    behaviour: Behaviour,
    held: Arc<Mutex<Vec<mpsc::Sender<PlayerEvent>>>>,
    dropped: Arc<Mutex<Option<Instant>>>,
    analyser: Option<Analyser>,
}

impl MockEngine {
    fn record(&self, call: Call) {
        self.log.lock().unwrap().push((call, Instant::now()));
    }
}

impl SynthEngine for MockEngine {
    fn wait_for_ready(&mut self) -> Result<()> {
        self.record(Call::WaitForReady);
        match &self.behaviour.not_ready {
            Some(reason) => Err(PlayerError::EngineNotReady(reason.clone())),
            None => Ok(()),
        }
    }

    fn load_soundfont(&mut self, data: &[u8]) -> i32 {
        self.record(Call::LoadSoundFont(data.len()));
        self.behaviour.soundfont_result
    }

    fn program_select(
        &mut self,
        channel: u8,
        sfont: SoundFontId,
        bank: u16,
        preset: u8,
    ) -> Result<()> {
        self.record(Call::ProgramSelect {
            channel,
            sfont: sfont.as_i32(),
            bank,
            preset,
        });
        match &self.behaviour.program_select_error {
            Some(reason) => Err(PlayerError::Player(reason.clone())),
            None => Ok(()),
        }
    }

    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        self.record(Call::NoteOn {
            channel,
            key,
            velocity,
        });
    }

    fn note_off(&mut self, channel: u8, key: u8) {
        self.record(Call::NoteOff { channel, key });
    }

    fn start_player(&mut self, clip: &MidiClip) -> Result<Receiver<PlayerEvent>> {
        self.record(Call::StartPlayer(clip.name().to_string()));
        let (sender, receiver) = mpsc::channel();
        for event in &self.behaviour.script {
            let _ = sender.send(event.clone());
        }
        if self.behaviour.hold_player {
            self.held.lock().unwrap().push(sender);
        }
        Ok(receiver)
    }

    fn analyser(&self) -> Option<&Analyser> {
        self.analyser.as_ref()
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        if let Some(analyser) = &self.analyser {
            analyser.close();
        }
        if let Ok(mut dropped) = self.dropped.lock() {
            *dropped = Some(Instant::now());
        }
    }
}
