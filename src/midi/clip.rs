//! A MIDI file ready to be handed to a player.
//!
//! The bytes are parsed twice: `midly` for a summary shown to the user, and
//! `rustysynth` for the sequencer. A file either library rejects never
//! reaches the player.

use crate::error::{PlayerError, Result};
use crate::loader::ResourceBuffer;
use midly::{Format, Smf, Timing, TrackEventKind};
use std::io::Cursor;
use std::sync::Arc;

/// Facts about a MIDI file, for status display and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiSummary {
    /// SMF format: 0 (single track), 1 (parallel) or 2 (sequential).
    pub format: u8,
    pub track_count: usize,
    /// Ticks per quarter note, None for SMPTE timecode files.
    pub ticks_per_beat: Option<u16>,
    /// Number of note-on events with non-zero velocity.
    pub note_count: usize,
    /// Length in seconds as computed by the sequencer.
    pub duration_secs: f64,
}

impl MidiSummary {
    /// One-line description, e.g. "2 tracks, 31 notes, 12.5s".
    pub fn describe(&self) -> String {
        format!(
            "{} track{}, {} notes, {:.1}s",
            self.track_count,
            if self.track_count == 1 { "" } else { "s" },
            self.note_count,
            self.duration_secs
        )
    }
}

/// A parsed MIDI file.
#[derive(Clone)]
pub struct MidiClip {
    name: String,
    summary: MidiSummary,
    file: Arc<rustysynth::MidiFile>,
}

impl MidiClip {
    /// Builds a clip from raw bytes.
    pub fn from_buffer(buffer: &ResourceBuffer) -> Result<Self> {
        let parse_err = |reason: String| PlayerError::MidiParse {
            name: buffer.name().to_string(),
            reason,
        };

        let smf = Smf::parse(buffer.bytes()).map_err(|e| parse_err(e.to_string()))?;

        let file = rustysynth::MidiFile::new(&mut Cursor::new(buffer.bytes()))
            .map_err(|e| parse_err(format!("{:?}", e)))?;

        let format = match smf.header.format {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
            Format::Sequential => 2,
        };
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => Some(tpb.as_int()),
            Timing::Timecode(_, _) => None,
        };
        let note_count = smf
            .tracks
            .iter()
            .flatten()
            .filter(|event| {
                matches!(
                    event.kind,
                    TrackEventKind::Midi {
                        message: midly::MidiMessage::NoteOn { vel, .. },
                        ..
                    } if vel.as_int() > 0
                )
            })
            .count();

        let summary = MidiSummary {
            format,
            track_count: smf.tracks.len(),
            ticks_per_beat,
            note_count,
            duration_secs: file.get_length(),
        };
        tracing::debug!(name = buffer.name(), ?summary, "parsed MIDI file");

        Ok(Self {
            name: buffer.name().to_string(),
            summary,
            file: Arc::new(file),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> &MidiSummary {
        &self.summary
    }

    /// The sequencer's view of the file.
    pub fn file(&self) -> &Arc<rustysynth::MidiFile> {
        &self.file
    }
}

impl std::fmt::Debug for MidiClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiClip")
            .field("name", &self.name)
            .field("summary", &self.summary)
            .finish()
    }
}
