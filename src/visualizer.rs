//! Waveform visualizer state.
//!
//! Once a player reports `Start`, the visualizer pulls one time-domain frame
//! from the analyser per UI frame. It stops when the output context closes.

use crate::audio::Analyser;

/// Per-frame sampling of an analyser.
#[derive(Debug, Default)]
pub struct Visualizer {
    analyser: Option<Analyser>,
    frame: Vec<u8>,
    frames_pulled: u64,
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins sampling `analyser`. Called on the player's `Start` event.
    pub fn start(&mut self, analyser: Analyser) {
        self.frame = vec![128; analyser.size()];
        self.analyser = Some(analyser);
        self.frames_pulled = 0;
    }

    /// Stops sampling and keeps the last frame on screen.
    pub fn stop(&mut self) {
        self.analyser = None;
    }

    pub fn is_active(&self) -> bool {
        self.analyser.is_some()
    }

    /// Pulls a new frame if the output context is still running.
    ///
    /// Returns whether a frame was pulled.
    pub fn tick(&mut self) -> bool {
        let Some(analyser) = &self.analyser else {
            return false;
        };
        if !analyser.is_running() {
            tracing::debug!(frames = self.frames_pulled, "output closed, visualizer stopped");
            self.analyser = None;
            return false;
        }

        analyser.time_domain_bytes(&mut self.frame);
        self.frames_pulled += 1;
        true
    }

    /// The most recent frame (empty before the first start).
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn frames_pulled(&self) -> u64 {
        self.frames_pulled
    }
}

/// Maps a frame to line vertices in a `width` x `height` canvas.
///
/// Samples are spread evenly across the width; a byte `v` lands at
/// `v / 128 * height / 2`, so 128 (silence) is the vertical centre.
pub fn waveform_points(samples: &[u8], width: f64, height: f64) -> Vec<(f64, f64)> {
    if samples.is_empty() {
        return Vec::new();
    }

    let slice_width = width / samples.len() as f64;
    samples
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let v = sample as f64 / 128.0;
            (i as f64 * slice_width, v * height / 2.0)
        })
        .collect()
}
