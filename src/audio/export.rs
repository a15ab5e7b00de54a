//! Offline rendering to WAV.
//!
//! Renders the same playback a session would perform, without an audio
//! device, and writes it as 16-bit stereo.

use crate::loader::ResourceBuffer;
use crate::midi::MidiClip;
use crate::session::NoteRequest;
use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use rustysynth::{MidiFileSequencer, SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Buffer size for rendering chunks.
/// Larger buffers are more efficient but use more memory.
const RENDER_BUFFER_SIZE: usize = 4096;

/// What to render.
#[derive(Debug, Clone, Copy)]
pub enum RenderJob<'a> {
    /// One note, held and released.
    Note(&'a NoteRequest),
    /// A whole MIDI file.
    File(&'a MidiClip),
}

/// Number of frames covering `duration` at `sample_rate`.
fn frames_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).round() as usize
}

/// Renders `frames` frames from `render` into the writer, in chunks.
fn write_frames<F>(
    writer: &mut WavWriter<BufWriter<File>>,
    frames: usize,
    left_buf: &mut [f32],
    right_buf: &mut [f32],
    mut render: F,
) -> Result<()>
where
    F: FnMut(&mut [f32], &mut [f32]),
{
    let mut written = 0usize;
    while written < frames {
        let chunk = (frames - written).min(left_buf.len());
        render(&mut left_buf[..chunk], &mut right_buf[..chunk]);

        for i in 0..chunk {
            // Convert f32 (-1.0 to 1.0) to i16
            let left_sample = (left_buf[i] * 32767.0).clamp(-32768.0, 32767.0) as i16;
            let right_sample = (right_buf[i] * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(left_sample)?;
            writer.write_sample(right_sample)?;
        }
        written += chunk;
    }
    Ok(())
}

/// Renders a job to a WAV file.
///
/// # Arguments
///
/// * `soundfont` - SoundFont bytes
/// * `job` - Note or MIDI file to render
/// * `sample_rate` - Output sample rate in Hz
/// * `tail` - Silence appended after the last event so releases ring out
/// * `output_path` - Path for the output WAV file
///
/// # Errors
///
/// Returns error if the SoundFont is invalid or the file cannot be written.
pub fn render_to_wav<P: AsRef<Path>>(
    soundfont: &ResourceBuffer,
    job: RenderJob<'_>,
    sample_rate: u32,
    tail: Duration,
    output_path: P,
) -> Result<()> {
    let font = Arc::new(
        SoundFont::new(&mut Cursor::new(soundfont.bytes()))
            .map_err(|e| anyhow::anyhow!("Failed to load SoundFont {}: {:?}", soundfont.name(), e))?,
    );
    let settings = SynthesizerSettings::new(sample_rate as i32);
    let mut synth = Synthesizer::new(&font, &settings)
        .map_err(|e| anyhow::anyhow!("Failed to create synthesizer: {:?}", e))?;

    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(output_path.as_ref(), spec).with_context(|| {
        format!(
            "Failed to create output WAV file: {}",
            output_path.as_ref().display()
        )
    })?;

    let mut left_buf = vec![0.0f32; RENDER_BUFFER_SIZE];
    let mut right_buf = vec![0.0f32; RENDER_BUFFER_SIZE];
    let tail_frames = frames_for(tail, sample_rate);

    match job {
        RenderJob::Note(request) => {
            let channel = request.channel as i32;
            synth.process_midi_message(channel, 0xB0, 0x00, request.bank.min(127) as i32);
            synth.process_midi_message(channel, 0xC0, request.preset as i32, 0);
            synth.note_on(channel, request.note as i32, request.velocity as i32);

            let hold_frames = frames_for(request.hold, sample_rate);
            write_frames(&mut writer, hold_frames, &mut left_buf, &mut right_buf, |l, r| {
                synth.render(l, r)
            })?;

            synth.note_off(channel, request.note as i32);
            write_frames(&mut writer, tail_frames, &mut left_buf, &mut right_buf, |l, r| {
                synth.render(l, r)
            })?;
        }
        RenderJob::File(clip) => {
            let mut sequencer = MidiFileSequencer::new(synth);
            sequencer.play(clip.file(), false);

            let frames = frames_for(
                Duration::from_secs_f64(clip.summary().duration_secs.max(0.0)),
                sample_rate,
            ) + tail_frames;
            write_frames(&mut writer, frames, &mut left_buf, &mut right_buf, |l, r| {
                sequencer.render(l, r)
            })?;
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    tracing::info!(path = %output_path.as_ref().display(), "rendered WAV");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    #[test]
    fn test_frames_for() {
        assert_eq!(frames_for(Duration::from_secs(1), 44100), 44100);
        assert_eq!(frames_for(Duration::from_millis(500), 48000), 24000);
        assert_eq!(frames_for(Duration::ZERO, 44100), 0);
    }

    #[test]
    fn test_invalid_soundfont_is_reported() {
        let font = ResourceBuffer::new("broken.sf2", vec![0; 16]);
        let request = NoteRequest::from_config(&Config::default());
        let out = std::env::temp_dir().join("sfplayer-broken.wav");
        let err = render_to_wav(&font, RenderJob::Note(&request), 44100, Duration::ZERO, out)
            .unwrap_err();
        assert!(err.to_string().contains("broken.sf2"));
    }

    #[test]
    #[ignore] // Requires SoundFont file
    fn test_render_note() {
        let font = crate::loader::read_resource("assets/TimGM6mb.sf2").unwrap();
        let request = NoteRequest::from_config(&Config::default());
        let output_path = PathBuf::from("test_output/test_note.wav");
        std::fs::create_dir_all("test_output").unwrap();

        render_to_wav(
            &font,
            RenderJob::Note(&request),
            44100,
            Duration::from_millis(500),
            &output_path,
        )
        .unwrap();

        let reader = hound::WavReader::open(&output_path).unwrap();
        // One second held plus half a second of tail, per channel.
        assert_eq!(reader.duration(), 44100 + 22050);
    }
}
