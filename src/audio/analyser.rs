//! Analysis node shared between the audio thread and the UI.
//!
//! The audio source pushes every rendered block into a fixed-size window of
//! recent mono samples; the visualizer copies that window out once per frame.
//! The two sides do not coordinate beyond the mutex, so a frame may mix two
//! blocks. That is fine for a picture.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared state of one analyser.
struct AnalyserShared {
    window: Mutex<VecDeque<f32>>,
    size: usize,
    /// Output context state. Cleared when the session that feeds us ends.
    running: AtomicBool,
}

/// Cloneable handle to a time-domain analysis buffer.
#[derive(Clone)]
pub struct Analyser {
    shared: Arc<AnalyserShared>,
}

impl Analyser {
    /// Creates an analyser holding the most recent `size` samples (silence at first).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            shared: Arc::new(AnalyserShared {
                window: Mutex::new(std::iter::repeat(0.0).take(size).collect()),
                size,
                running: AtomicBool::new(true),
            }),
        }
    }

    /// Number of samples in the window.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Appends a stereo block, mixed down to mono.
    pub fn push_stereo(&self, left: &[f32], right: &[f32]) {
        let Ok(mut window) = self.shared.window.lock() else {
            return;
        };
        for (l, r) in left.iter().zip(right) {
            if window.len() == self.shared.size {
                window.pop_front();
            }
            window.push_back((l + r) * 0.5);
        }
    }

    /// Copies the newest samples as unsigned bytes, 128 meaning silence.
    ///
    /// Follows the Web Audio `getByteTimeDomainData` mapping:
    /// `128 * (1 + sample)`, clamped to 0..=255. Writes `min(out.len(), size)`
    /// samples and returns that count.
    pub fn time_domain_bytes(&self, out: &mut [u8]) -> usize {
        let Ok(window) = self.shared.window.lock() else {
            return 0;
        };
        let count = out.len().min(window.len());
        let skip = window.len() - count;
        for (slot, sample) in out.iter_mut().zip(window.iter().skip(skip)) {
            *slot = sample_to_byte(*sample);
        }
        count
    }

    /// Whether the output context feeding this analyser is still running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Marks the output context as closed.
    pub fn close(&self) {
        self.shared.running.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser")
            .field("size", &self.shared.size)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Two handles are equal when they share the same buffer.
impl PartialEq for Analyser {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// Converts a sample in [-1, 1] to the 0..=255 byte scale.
pub fn sample_to_byte(sample: f32) -> u8 {
    (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_centered() {
        let analyser = Analyser::new(8);
        let mut out = [0u8; 8];
        assert_eq!(analyser.time_domain_bytes(&mut out), 8);
        assert!(out.iter().all(|&b| b == 128));
    }

    #[test]
    fn test_byte_mapping_clamps() {
        assert_eq!(sample_to_byte(0.0), 128);
        assert_eq!(sample_to_byte(-1.0), 0);
        assert_eq!(sample_to_byte(1.0), 255);
        assert_eq!(sample_to_byte(3.0), 255);
        assert_eq!(sample_to_byte(-0.5), 64);
    }

    #[test]
    fn test_window_keeps_newest_samples() {
        let analyser = Analyser::new(4);
        analyser.push_stereo(&[0.5, 0.5, 0.5], &[0.5, 0.5, 0.5]);
        analyser.push_stereo(&[-1.0, -1.0], &[-1.0, -1.0]);

        let mut out = [0u8; 4];
        analyser.time_domain_bytes(&mut out);
        assert_eq!(out, [192, 192, 0, 0]);
    }

    #[test]
    fn test_short_output_gets_latest() {
        let analyser = Analyser::new(4);
        analyser.push_stereo(&[0.0, 0.0, 0.0, -1.0], &[0.0, 0.0, 0.0, -1.0]);
        let mut out = [7u8; 2];
        assert_eq!(analyser.time_domain_bytes(&mut out), 2);
        assert_eq!(out, [128, 0]);
    }

    #[test]
    fn test_close_is_visible_to_clones() {
        let analyser = Analyser::new(4);
        let ui_side = analyser.clone();
        assert!(ui_side.is_running());
        analyser.close();
        assert!(!ui_side.is_running());
    }

    #[test]
    fn test_equality_is_identity() {
        let analyser = Analyser::new(4);
        assert_eq!(analyser, analyser.clone());
        assert_ne!(analyser, Analyser::new(4));
    }
}
