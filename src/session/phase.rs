//! Playback state machine.
//!
//! ```text
//! Idle -> Initializing -> LoadingSoundFont -> Ready -> Playing -> Finished
//!            \________________\__________________\________\______-> Failed
//! ```
//!
//! `Finished` and `Failed` behave like `Idle`: the next attempt may begin.

/// Where a playback attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Initializing,
    LoadingSoundFont,
    /// SoundFont loaded and instrument selected; nothing sounding yet.
    Ready,
    Playing,
    Finished,
    Failed,
}

/// Events that move an attempt between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Begin,
    EngineReady,
    SoundFontLoaded,
    PlaybackStarted,
    PlaybackEnded,
    Fail,
}

impl Phase {
    /// Returns the phase after `transition`, or None if it does not apply here.
    pub fn apply(self, transition: Transition) -> Option<Phase> {
        use Phase::*;
        use Transition::*;

        match (self, transition) {
            (Idle | Finished | Failed, Begin) => Some(Initializing),
            (Initializing, EngineReady) => Some(LoadingSoundFont),
            (LoadingSoundFont, SoundFontLoaded) => Some(Ready),
            (Ready, PlaybackStarted) => Some(Playing),
            (Playing, PlaybackEnded) => Some(Finished),
            (phase, Fail) if phase.is_in_flight() => Some(Failed),
            _ => None,
        }
    }

    /// Whether an attempt is running in this phase.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Phase::Initializing | Phase::LoadingSoundFont | Phase::Ready | Phase::Playing
        )
    }

    /// Short label for the transport display.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "IDLE",
            Phase::Initializing => "INIT",
            Phase::LoadingSoundFont => "LOADING",
            Phase::Ready => "READY",
            Phase::Playing => "PLAYING",
            Phase::Finished => "DONE",
            Phase::Failed => "ERROR",
        }
    }
}
