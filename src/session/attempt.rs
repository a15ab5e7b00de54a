//! One playback attempt, from engine start to the end of playback.
//!
//! The steps run strictly in order on a worker thread. Progress goes back to
//! the controller as [`AttemptUpdate`]s. Every exit path, including errors,
//! ends with [`AttemptUpdate::Closed`].

use super::{NoteRequest, SynthSession, Transition};
use crate::audio::{Analyser, EngineFactory, EngineOptions, PlayerEvent};
use crate::error::{PlayerError, Result};
use crate::loader::SoundFontSource;
use crate::midi::{note_to_name, MidiClip};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// What the attempt plays once the SoundFont is loaded.
#[derive(Debug, Clone)]
pub enum PlaybackKind {
    /// A single note from the request.
    Note,
    /// A MIDI file, played through the engine's player.
    File(MidiClip),
}

/// Everything one attempt needs, handed over by the controller.
#[derive(Debug, Clone)]
pub struct AttemptPlan {
    pub soundfont: SoundFontSource,
    /// Instrument (and, in note mode, the note) to play.
    pub request: NoteRequest,
    pub kind: PlaybackKind,
    pub engine: EngineOptions,
    /// How long the engine stays up after the last note ends, so releases
    /// ring out.
    pub release_tail: Duration,
}

/// Progress reported by a running attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptUpdate {
    Status(String),
    Transition(Transition),
    /// A lifecycle event forwarded from the MIDI player.
    Player(PlayerEvent),
    /// The output context the session is bound to.
    Output(Analyser),
    /// The attempt's worker is done. Always the last update.
    Closed,
}

/// Sends `Closed` when dropped, whatever way the attempt ends.
struct CloseGuard {
    updates: Sender<AttemptUpdate>,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        let _ = self.updates.send(AttemptUpdate::Closed);
    }
}

/// Runs `plan` on a new worker thread.
pub fn spawn_attempt(factory: Arc<dyn EngineFactory>, plan: AttemptPlan) -> Receiver<AttemptUpdate> {
    let (updates, receiver) = mpsc::channel();
    std::thread::spawn(move || run_attempt(factory.as_ref(), plan, updates));
    receiver
}

/// Runs one attempt on the current thread.
///
/// Errors are not returned: they become a status message and a `Fail`
/// transition, then the attempt closes like any other.
pub fn run_attempt(factory: &dyn EngineFactory, plan: AttemptPlan, updates: Sender<AttemptUpdate>) {
    let _guard = CloseGuard {
        updates: updates.clone(),
    };
    let reporter = Reporter { updates };

    if let Err(e) = drive(factory, plan, &reporter) {
        tracing::error!("playback attempt failed: {}", e);
        let _ = reporter.status(format!("Error during playback: {}", e));
        let _ = reporter.transition(Transition::Fail);
    }
}

struct Reporter {
    updates: Sender<AttemptUpdate>,
}

impl Reporter {
    /// Fails once the controller stops listening, which ends the attempt.
    fn send(&self, update: AttemptUpdate) -> Result<()> {
        self.updates
            .send(update)
            .map_err(|_| PlayerError::Unexpected("controller went away".to_string()))
    }

    fn status(&self, message: impl Into<String>) -> Result<()> {
        self.send(AttemptUpdate::Status(message.into()))
    }

    fn transition(&self, transition: Transition) -> Result<()> {
        self.send(AttemptUpdate::Transition(transition))
    }
}

fn drive(factory: &dyn EngineFactory, plan: AttemptPlan, reporter: &Reporter) -> Result<()> {
    reporter.status("Initializing synthesizer...")?;
    let mut session = SynthSession::initialize(factory, plan.engine)?;
    if let Some(analyser) = session.analyser() {
        reporter.send(AttemptUpdate::Output(analyser.clone()))?;
    }
    reporter.transition(Transition::EngineReady)?;
    reporter.status("Synthesizer engine ready. Creating session...")?;

    reporter.status(format!(
        "Loading SoundFont from: {}...",
        plan.soundfont.describe()
    ))?;
    let id = session.load_soundfont(&plan.soundfont)?;
    session.select_instrument(&plan.request)?;
    reporter.transition(Transition::SoundFontLoaded)?;

    match plan.kind {
        PlaybackKind::Note => {
            let request = plan.request;
            reporter.status(format!(
                "SoundFont loaded (ID: {}). Playing {}...",
                id,
                note_to_name(request.note)
            ))?;
            reporter.transition(Transition::PlaybackStarted)?;

            let secs = request.hold.as_secs_f64();
            let mut held = Ok(());
            session.play_note(&request, || {
                held = reporter.status(format!(
                    "Playing... Note will stop in {} second{}.",
                    secs,
                    if secs == 1.0 { "" } else { "s" }
                ));
            });
            held?;

            reporter.status("Playback finished. Ready to play again.")?;
            reporter.transition(Transition::PlaybackEnded)?;
        }
        PlaybackKind::File(clip) => {
            reporter.status(format!(
                "SoundFont loaded (ID: {}). Starting MIDI playback...",
                id
            ))?;
            let events = session.play_file(&clip)?;
            follow_player(&events, reporter)?;
        }
    }

    // The session must outlive the last note-off for the release to sound.
    std::thread::sleep(plan.release_tail);

    tracing::info!("playback attempt finished");
    Ok(())
}

/// Forwards player events until the player ends or fails.
fn follow_player(events: &Receiver<PlayerEvent>, reporter: &Reporter) -> Result<()> {
    loop {
        let event = events.recv().map_err(|_| {
            PlayerError::Player("player stopped without finishing".to_string())
        })?;
        let last = !matches!(event, PlayerEvent::Start);
        if let PlayerEvent::Error(message) = &event {
            tracing::error!("MIDI player error: {}", message);
        }
        reporter.send(AttemptUpdate::Player(event))?;
        if last {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::loader::ResourceBuffer;
    use crate::midi::clip::fixtures;
    use crate::session::mock::{Call, MockFactory};

    fn plan(kind: PlaybackKind) -> AttemptPlan {
        let mut request = NoteRequest::from_config(&Config::default());
        request.hold = Duration::from_millis(10);
        AttemptPlan {
            soundfont: SoundFontSource::Buffer(ResourceBuffer::new("gm.sf2", vec![0; 4])),
            request,
            kind,
            engine: EngineOptions {
                sample_rate: 44100,
                analyser: None,
            },
            release_tail: Duration::ZERO,
        }
    }

    fn run(factory: &MockFactory, plan: AttemptPlan) -> Vec<AttemptUpdate> {
        let (updates, receiver) = mpsc::channel();
        run_attempt(factory, plan, updates);
        receiver.try_iter().collect()
    }

    fn statuses(updates: &[AttemptUpdate]) -> Vec<&str> {
        updates
            .iter()
            .filter_map(|u| match u {
                AttemptUpdate::Status(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_note_attempt_reports_each_step() {
        let factory = MockFactory::new();
        let updates = run(&factory, plan(PlaybackKind::Note));

        assert_eq!(
            statuses(&updates),
            vec![
                "Initializing synthesizer...",
                "Synthesizer engine ready. Creating session...",
                "Loading SoundFont from: gm.sf2...",
                "SoundFont loaded (ID: 1). Playing C4...",
                "Playing... Note will stop in 0.01 seconds.",
                "Playback finished. Ready to play again.",
            ]
        );
        assert_eq!(updates.last(), Some(&AttemptUpdate::Closed));
        assert!(updates.contains(&AttemptUpdate::Transition(Transition::PlaybackEnded)));

        let offs = factory
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::NoteOff { channel: 0, key: 60 }))
            .count();
        assert_eq!(offs, 1);
    }

    #[test]
    fn test_sentinel_fails_attempt_and_still_closes() {
        let factory = MockFactory::new().soundfont_result(-1);
        let updates = run(&factory, plan(PlaybackKind::Note));

        let last_status = statuses(&updates).last().copied().unwrap();
        assert!(last_status.starts_with("Error during playback: failed to load SoundFont from gm.sf2"));
        assert!(updates.contains(&AttemptUpdate::Transition(Transition::Fail)));
        assert!(!updates.contains(&AttemptUpdate::Transition(Transition::SoundFontLoaded)));
        assert_eq!(updates.last(), Some(&AttemptUpdate::Closed));
        assert!(!factory
            .calls()
            .iter()
            .any(|c| matches!(c, Call::NoteOn { .. })));
    }

    #[test]
    fn test_engine_not_ready_fails_attempt() {
        let factory = MockFactory::new().not_ready("no audio device");
        let updates = run(&factory, plan(PlaybackKind::Note));
        assert!(statuses(&updates)
            .iter()
            .any(|s| s.contains("no audio device")));
        assert_eq!(updates.last(), Some(&AttemptUpdate::Closed));
    }

    #[test]
    fn test_file_attempt_forwards_player_events() {
        let factory = MockFactory::new();
        let clip = MidiClip::from_buffer(&fixtures::one_note_buffer()).unwrap();
        let updates = run(&factory, plan(PlaybackKind::File(clip)));

        let player: Vec<_> = updates
            .iter()
            .filter(|u| matches!(u, AttemptUpdate::Player(_)))
            .cloned()
            .collect();
        assert_eq!(
            player,
            vec![
                AttemptUpdate::Player(PlayerEvent::Start),
                AttemptUpdate::Player(PlayerEvent::End)
            ]
        );
        assert!(factory
            .calls()
            .contains(&Call::StartPlayer("one-note.mid".to_string())));
        assert_eq!(updates.last(), Some(&AttemptUpdate::Closed));
    }

    #[test]
    fn test_vanished_player_is_an_error() {
        let factory = MockFactory::new().player_script(vec![PlayerEvent::Start]);
        let clip = MidiClip::from_buffer(&fixtures::one_note_buffer()).unwrap();
        let updates = run(&factory, plan(PlaybackKind::File(clip)));

        assert!(statuses(&updates)
            .iter()
            .any(|s| s.contains("player stopped without finishing")));
        assert!(updates.contains(&AttemptUpdate::Transition(Transition::Fail)));
    }

    #[test]
    fn test_spawned_attempt_closes() {
        let factory: Arc<dyn EngineFactory> = Arc::new(MockFactory::new());
        let receiver = spawn_attempt(factory, plan(PlaybackKind::Note));
        let updates: Vec<_> = receiver.iter().collect();
        assert_eq!(updates.last(), Some(&AttemptUpdate::Closed));
    }

    #[test]
    fn test_failed_program_select_fails_attempt() {
        let factory = MockFactory::new().program_select_error("sample rate out of range");
        let updates = run(&factory, plan(PlaybackKind::Note));

        let last_status = statuses(&updates).last().copied().unwrap();
        assert_eq!(
            last_status,
            "Error during playback: player error: sample rate out of range"
        );
        assert!(updates.contains(&AttemptUpdate::Transition(Transition::Fail)));
        assert!(!updates.contains(&AttemptUpdate::Transition(Transition::PlaybackEnded)));
        assert_eq!(updates.last(), Some(&AttemptUpdate::Closed));
        assert!(!factory
            .calls()
            .iter()
            .any(|c| matches!(c, Call::NoteOn { .. })));
    }

    #[test]
    fn test_engine_outlives_note_by_release_tail() {
        let factory = MockFactory::new();
        let mut plan = plan(PlaybackKind::Note);
        plan.release_tail = Duration::from_millis(40);
        run(&factory, plan);

        let note_off = factory.note_off_at().unwrap();
        let dropped = factory.dropped_at().unwrap();
        assert!(dropped.duration_since(note_off) >= Duration::from_millis(40));
    }

    #[test]
    fn test_engine_outlives_player_end_by_release_tail() {
        let factory = MockFactory::new();
        let clip = MidiClip::from_buffer(&fixtures::one_note_buffer()).unwrap();
        let mut plan = plan(PlaybackKind::File(clip));
        plan.release_tail = Duration::from_millis(40);

        let started = std::time::Instant::now();
        run(&factory, plan);
        assert!(factory.dropped_at().unwrap().duration_since(started) >= Duration::from_millis(40));
    }

    #[test]
    fn test_unreachable_url_fails_attempt() {
        let factory = MockFactory::new();
        let mut plan = plan(PlaybackKind::Note);
        plan.soundfont = SoundFontSource::Url("http://127.0.0.1:9/x.sf2".to_string());
        let updates = run(&factory, plan);

        assert!(statuses(&updates).contains(&"Loading SoundFont from: http://127.0.0.1:9/x.sf2..."));
        let last_status = statuses(&updates).last().copied().unwrap();
        assert!(last_status.starts_with("Error during playback: could not fetch http://127.0.0.1:9/x.sf2"));
        assert!(updates.contains(&AttemptUpdate::Transition(Transition::Fail)));
        assert_eq!(updates.last(), Some(&AttemptUpdate::Closed));
        assert!(!factory
            .calls()
            .iter()
            .any(|c| matches!(c, Call::LoadSoundFont(_))));
    }

    #[test]
    fn test_bound_output_is_reported() {
        let factory = MockFactory::new();
        let analyser = Analyser::new(16);
        let clip = MidiClip::from_buffer(&fixtures::one_note_buffer()).unwrap();
        let mut plan = plan(PlaybackKind::File(clip));
        plan.engine.analyser = Some(analyser.clone());
        let updates = run(&factory, plan);

        let output = updates.iter().position(|u| *u == AttemptUpdate::Output(analyser.clone()));
        let start = updates
            .iter()
            .position(|u| *u == AttemptUpdate::Player(PlayerEvent::Start));
        assert!(output.unwrap() < start.unwrap());
        assert!(!analyser.is_running());
    }
}
