//! Application state and event handling.
//!
//! The controller owns the loaded resources and the UI state (status line and
//! Start control), starts playback attempts and applies their progress.

use crate::audio::{Analyser, EngineFactory, EngineOptions, PlayerEvent};
use crate::config::Config;
use crate::error::{PlayerError, Result};
use crate::loader::{read_resource, ResourceBuffer, SoundFontSource};
use crate::midi::MidiClip;
use crate::session::{
    spawn_attempt, AttemptPlan, AttemptUpdate, NoteRequest, Phase, PlaybackKind, Transition,
};
use crate::visualizer::Visualizer;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

/// Status shown in file mode until both files are loaded.
pub const NEED_BOTH_FILES: &str = "Please load both a SoundFont and a MIDI file.";
/// Status shown in note mode without a SoundFont file or URL.
pub const NEED_SOUNDFONT: &str = "Please load a SoundFont.";
/// Status shown once playback can start.
pub const READY: &str = "Ready. Press Enter to play.";

/// Which variant of the player is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Play a single test note.
    #[default]
    Note,
    /// Play a MIDI file with the waveform visualizer.
    File,
}

impl Mode {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "note" => Some(Mode::Note),
            "file" | "midi" => Some(Mode::File),
            _ => None,
        }
    }
}

/// What a file browser is choosing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTarget {
    SoundFont,
    Midi,
}

impl FileTarget {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            FileTarget::SoundFont => &["sf2"],
            FileTarget::Midi => &["mid", "midi"],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FileTarget::SoundFont => " Select a SoundFont ",
            FileTarget::Midi => " Select a MIDI file ",
        }
    }
}

/// State for the file browser dialog.
#[derive(Debug, Clone)]
pub struct FileBrowserState {
    pub target: FileTarget,
    /// Current directory path.
    pub current_dir: PathBuf,
    /// List of entries in current directory.
    pub entries: Vec<PathBuf>,
    /// Currently selected index.
    pub selected: usize,
    /// Scroll offset for long lists.
    pub scroll: usize,
    /// Rows the list had when last drawn.
    page: Cell<usize>,
}

/// Rows assumed before the browser is first drawn.
const DEFAULT_BROWSER_PAGE: usize = 10;

impl FileBrowserState {
    pub fn new(target: FileTarget, start_dir: PathBuf) -> Self {
        let mut state = Self {
            target,
            current_dir: start_dir,
            entries: Vec::new(),
            selected: 0,
            scroll: 0,
            page: Cell::new(DEFAULT_BROWSER_PAGE),
        };
        state.refresh_entries();
        state
    }

    fn refresh_entries(&mut self) {
        self.entries.clear();

        // Add parent directory entry if not at root
        if self.current_dir.parent().is_some() {
            self.entries.push(PathBuf::from(".."));
        }

        if let Ok(entries) = std::fs::read_dir(&self.current_dir) {
            let mut dirs: Vec<PathBuf> = Vec::new();
            let mut files: Vec<PathBuf> = Vec::new();

            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    let ext_lower = ext.to_lowercase();
                    if self.target.extensions().contains(&ext_lower.as_str()) {
                        files.push(path);
                    }
                }
            }

            dirs.sort();
            files.sort();

            self.entries.extend(dirs);
            self.entries.extend(files);
        }

        if self.selected >= self.entries.len() {
            self.selected = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            if self.selected < self.scroll {
                self.scroll = self.selected;
            }
        }
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
            let page = self.page.get();
            if self.selected >= self.scroll + page {
                self.scroll = self.selected + 1 - page;
            }
        }
    }

    /// Records how many rows the list is drawn with.
    pub fn set_page(&self, rows: usize) {
        self.page.set(rows.max(1));
    }

    /// First visible entry, keeping the selection on screen even if the
    /// list shrank since the last move.
    pub fn visible_start(&self) -> usize {
        let page = self.page.get();
        let start = self.scroll.min(self.selected);
        if self.selected >= start + page {
            self.selected + 1 - page
        } else {
            start
        }
    }

    /// Returns Some(path) if a file was chosen, None to continue browsing.
    pub fn select(&mut self) -> Option<PathBuf> {
        let selected_path = self.entries.get(self.selected)?.clone();

        if selected_path == Path::new("..") {
            if let Some(parent) = self.current_dir.parent() {
                self.current_dir = parent.to_path_buf();
                self.selected = 0;
                self.scroll = 0;
                self.refresh_entries();
            }
            None
        } else if selected_path.is_dir() {
            self.current_dir = selected_path;
            self.selected = 0;
            self.scroll = 0;
            self.refresh_entries();
            None
        } else {
            Some(selected_path)
        }
    }
}

/// The visible controls: status line and Start control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    pub start_enabled: bool,
    pub status: String,
}

/// A running (or winding down) playback attempt.
struct ActiveAttempt {
    updates: Receiver<AttemptUpdate>,
    /// Output context reported by the session, if it was bound to one.
    analyser: Option<Analyser>,
    /// Set once the Start control has been handed back.
    released: bool,
}

/// Main application state.
pub struct App {
    mode: Mode,
    config: Config,
    factory: Arc<dyn EngineFactory>,
    soundfont: Option<ResourceBuffer>,
    midi: Option<MidiClip>,
    ui: UiState,
    phase: Phase,
    attempt: Option<ActiveAttempt>,
    pub visualizer: Visualizer,
    /// Open file browser, if any.
    pub browser: Option<FileBrowserState>,
    pub should_quit: bool,
}

impl App {
    pub fn new(mode: Mode, config: Config, factory: Arc<dyn EngineFactory>) -> Self {
        let mut app = Self {
            mode,
            config,
            factory,
            soundfont: None,
            midi: None,
            ui: UiState {
                start_enabled: false,
                status: String::new(),
            },
            phase: Phase::Idle,
            attempt: None,
            visualizer: Visualizer::new(),
            browser: None,
            should_quit: false,
        };
        app.refresh_readiness();
        app
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn soundfont(&self) -> Option<&ResourceBuffer> {
        self.soundfont.as_ref()
    }

    pub fn midi(&self) -> Option<&MidiClip> {
        self.midi.as_ref()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.ui.status = message.into();
    }

    fn in_flight(&self) -> bool {
        self.attempt.as_ref().is_some_and(|a| !a.released)
    }

    /// Whether every resource this mode needs is present.
    pub fn is_ready(&self) -> bool {
        match self.mode {
            Mode::Note => self.soundfont.is_some() || self.config.soundfont_url.is_some(),
            Mode::File => self.soundfont.is_some() && self.midi.is_some(),
        }
    }

    /// Re-evaluates the Start control after an input changed.
    ///
    /// Never enables Start while an attempt is in flight, and leaves the
    /// attempt's status alone.
    fn refresh_readiness(&mut self) {
        let ready = self.is_ready();
        if self.in_flight() {
            return;
        }
        self.ui.start_enabled = ready;
        self.ui.status = if ready {
            READY.to_string()
        } else if self.mode == Mode::File {
            NEED_BOTH_FILES.to_string()
        } else {
            NEED_SOUNDFONT.to_string()
        };
    }

    /// Stores a SoundFont buffer.
    pub fn set_soundfont(&mut self, buffer: ResourceBuffer) {
        tracing::info!(name = buffer.name(), len = buffer.len(), "SoundFont selected");
        self.soundfont = Some(buffer);
        self.refresh_readiness();
    }

    /// Stores a MIDI buffer after checking it parses.
    pub fn set_midi(&mut self, buffer: ResourceBuffer) -> Result<()> {
        let clip = MidiClip::from_buffer(&buffer)?;
        tracing::info!(name = clip.name(), summary = %clip.summary().describe(), "MIDI file selected");
        self.midi = Some(clip);
        self.refresh_readiness();
        Ok(())
    }

    /// Reads a SoundFont file. Failures end up in the status line.
    pub fn load_soundfont_file<P: AsRef<Path>>(&mut self, path: P) -> bool {
        match read_resource(path) {
            Ok(buffer) => {
                self.set_soundfont(buffer);
                true
            }
            Err(e) => {
                tracing::warn!("SoundFont not loaded: {}", e);
                self.report_load_error(&e);
                false
            }
        }
    }

    /// Reads and checks a MIDI file. Failures end up in the status line.
    pub fn load_midi_file<P: AsRef<Path>>(&mut self, path: P) -> bool {
        match read_resource(path).and_then(|buffer| self.set_midi(buffer)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("MIDI file not loaded: {}", e);
                self.report_load_error(&e);
                false
            }
        }
    }

    /// Shows a selection error, unless an attempt owns the status line.
    fn report_load_error(&mut self, error: &PlayerError) {
        if !self.in_flight() {
            self.set_status(format!("Error: {}", error));
        }
    }

    /// Starts a playback attempt if the Start control is enabled.
    ///
    /// Returns whether an attempt was started.
    pub fn start(&mut self) -> bool {
        if !self.ui.start_enabled || self.in_flight() || !self.is_ready() {
            return false;
        }

        let soundfont = match (&self.soundfont, &self.config.soundfont_url) {
            (Some(buffer), _) => SoundFontSource::Buffer(buffer.clone()),
            (None, Some(url)) if self.mode == Mode::Note => SoundFontSource::Url(url.clone()),
            _ => return false,
        };
        let kind = match (self.mode, &self.midi) {
            (Mode::Note, _) => PlaybackKind::Note,
            (Mode::File, Some(clip)) => PlaybackKind::File(clip.clone()),
            (Mode::File, None) => return false,
        };
        let analyser = (self.mode == Mode::File).then(|| Analyser::new(self.config.analyser_size));

        let plan = AttemptPlan {
            soundfont,
            request: NoteRequest::from_config(&self.config),
            kind,
            engine: EngineOptions {
                sample_rate: self.config.sample_rate,
                analyser,
            },
            release_tail: self.config.release_tail(),
        };

        self.ui.start_enabled = false;
        self.visualizer.stop();
        self.apply_transition(Transition::Begin);
        tracing::info!(mode = ?self.mode, "playback attempt started");

        self.attempt = Some(ActiveAttempt {
            updates: spawn_attempt(Arc::clone(&self.factory), plan),
            analyser: None,
            released: false,
        });
        true
    }

    /// Hands the Start control back, once per attempt.
    fn release(&mut self) -> bool {
        match &mut self.attempt {
            Some(attempt) if !attempt.released => {
                attempt.released = true;
                self.ui.start_enabled = self.is_ready();
                true
            }
            _ => false,
        }
    }

    fn apply_transition(&mut self, transition: Transition) {
        match self.phase.apply(transition) {
            Some(next) => self.phase = next,
            None => tracing::warn!(phase = ?self.phase, ?transition, "ignored transition"),
        }
    }

    /// Applies one update from the running attempt.
    ///
    /// Returns true when this update re-enabled the Start control.
    pub fn apply(&mut self, update: AttemptUpdate) -> bool {
        match update {
            AttemptUpdate::Status(message) => {
                self.set_status(message);
                false
            }
            AttemptUpdate::Transition(transition) => {
                self.apply_transition(transition);
                match transition {
                    Transition::PlaybackEnded | Transition::Fail => self.release(),
                    _ => false,
                }
            }
            AttemptUpdate::Output(analyser) => {
                if let Some(attempt) = &mut self.attempt {
                    attempt.analyser = Some(analyser);
                }
                false
            }
            AttemptUpdate::Player(event) if !self.in_flight() => {
                tracing::debug!(?event, "player event after release ignored");
                false
            }
            AttemptUpdate::Player(PlayerEvent::Start) => {
                self.apply_transition(Transition::PlaybackStarted);
                self.set_status("Playing MIDI file...");
                if let Some(analyser) = self.attempt.as_ref().and_then(|a| a.analyser.clone()) {
                    self.visualizer.start(analyser);
                }
                false
            }
            AttemptUpdate::Player(PlayerEvent::End) => {
                self.apply_transition(Transition::PlaybackEnded);
                self.set_status("Playback finished. Ready to play again.");
                self.release()
            }
            AttemptUpdate::Player(PlayerEvent::Error(message)) => {
                self.apply_transition(Transition::Fail);
                self.set_status(format!("Error during playback: {}", message));
                self.release()
            }
            AttemptUpdate::Closed => {
                if self.phase.is_in_flight() {
                    // The worker ended without reporting an outcome.
                    self.apply_transition(Transition::Fail);
                }
                self.release()
            }
        }
    }

    /// Drains pending attempt updates. Called once per UI frame.
    pub fn poll_attempt(&mut self) {
        loop {
            let Some(attempt) = &self.attempt else {
                return;
            };
            match attempt.updates.try_recv() {
                Ok(update) => {
                    let closed = update == AttemptUpdate::Closed;
                    self.apply(update);
                    if closed {
                        self.attempt = None;
                        return;
                    }
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.apply(AttemptUpdate::Closed);
                    self.attempt = None;
                    return;
                }
            }
        }
    }

    /// Per-frame work: attempt progress, then the visualizer.
    pub fn tick(&mut self) {
        self.poll_attempt();
        self.visualizer.tick();
    }

    /// Opens the file browser for `target` in the working directory.
    pub fn open_browser(&mut self, target: FileTarget) {
        if target == FileTarget::Midi && self.mode != Mode::File {
            return;
        }
        let start_dir = std::env::current_dir().unwrap_or_default();
        self.browser = Some(FileBrowserState::new(target, start_dir));
    }

    /// Selects the current browser entry, loading the file if one was chosen.
    pub fn browser_select(&mut self) {
        let Some(browser) = &mut self.browser else {
            return;
        };
        let target = browser.target;
        if let Some(path) = browser.select() {
            self.browser = None;
            match target {
                FileTarget::SoundFont => self.load_soundfont_file(path),
                FileTarget::Midi => self.load_midi_file(path),
            };
        }
    }

    pub fn close_browser(&mut self) {
        self.browser = None;
    }
}
