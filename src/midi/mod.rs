//! MIDI helpers: note naming and playable MIDI file clips.

pub(crate) mod clip;

pub use clip::{MidiClip, MidiSummary};

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Examples
///
/// ```
/// use sfplayer::midi::note_to_name;
///
/// let name = note_to_name(60); // Middle C
/// assert_eq!(name, "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Parses a note given either as a name ("C4", "F#5") or a number ("60").
///
/// Returns None if the input is not a valid MIDI note (0-127).
pub fn parse_note(input: &str) -> Option<u8> {
    let input = input.trim();
    if let Ok(number) = input.parse::<u8>() {
        return (number <= 127).then_some(number);
    }

    let octave_start = input.chars().position(|c| c.is_ascii_digit() || c == '-')?;
    let (note_part, octave_part) = input.split_at(octave_start);

    let note_index = NOTE_NAMES
        .iter()
        .position(|&n| n.eq_ignore_ascii_case(note_part))?;
    let octave: i16 = octave_part.parse().ok()?;

    // MIDI note = (octave + 1) * 12 + note_index
    let midi_note = (octave + 1) * 12 + note_index as i16;
    (0..=127).contains(&midi_note).then_some(midi_note as u8)
}
