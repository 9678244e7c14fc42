//! # Frame Energy Analysis
//!
//! Splits the PCM payload into one byte range per animation frame and reduces
//! each range to a single loudness value.
//!
//! ## Energy Definition:
//! The mean of the raw 16-bit words in the frame. Words are assembled as
//! `low | high << 8` without two's-complement correction, so negative samples
//! read as large values. The percentile thresholds downstream are calibrated
//! against this measure, so it is kept as is.

use crate::lipsync::format::{self, HEADER_BYTES};
use crate::lipsync::types::EnergyThresholds;
use byteorder::{ByteOrder, LittleEndian};

/// How the payload is divided into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub total_frames: usize,
    /// Bytes assigned to each frame: `floor(payload / total_frames)`
    pub frame_bytes: usize,
}

impl FrameLayout {
    pub fn for_buffer_len(buffer_len: usize) -> Self {
        let total_frames = format::total_frames(buffer_len);
        let frame_bytes = if total_frames > 0 {
            format::payload_len(buffer_len) / total_frames
        } else {
            0
        };

        Self {
            total_frames,
            frame_bytes,
        }
    }

    /// Byte range of frame `index`, clamped to the end of the buffer.
    pub fn byte_range(&self, index: usize, buffer_len: usize) -> (usize, usize) {
        let start = (HEADER_BYTES + index * self.frame_bytes).min(buffer_len);
        let end = (start + self.frame_bytes).min(buffer_len);
        (start, end)
    }
}

/// Mean raw sample magnitude of every frame, in frame order.
pub fn frame_energies(bytes: &[u8], layout: &FrameLayout) -> Vec<f64> {
    (0..layout.total_frames)
        .map(|index| {
            let (start, end) = layout.byte_range(index, bytes.len());
            frame_energy(&bytes[start..end])
        })
        .collect()
}

fn frame_energy(frame: &[u8]) -> f64 {
    let sum: u64 = frame
        .chunks_exact(2)
        .map(|pair| LittleEndian::read_u16(pair) as u64)
        .sum();

    // A trailing odd byte still counts toward the sample count
    let frame_size = frame.len() as f64 / 2.0;
    if frame_size > 0.0 {
        sum as f64 / frame_size
    } else {
        0.0
    }
}

/// Derive the 25th/50th/75th percentile thresholds from the frame energies.
///
/// Returns `None` when there are no frames.
pub fn adaptive_thresholds(energies: &[f64]) -> Option<EnergyThresholds> {
    if energies.is_empty() {
        return None;
    }

    let mut sorted = energies.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let percentile = |p: f64| {
        let index = (sorted.len() as f64 * p).floor() as usize;
        sorted[index.min(sorted.len() - 1)]
    };

    Some(EnergyThresholds {
        silence: percentile(0.25),
        low: percentile(0.5),
        medium: percentile(0.75),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lipsync::format::encode_pcm16_wav;
    use approx::assert_relative_eq;

    #[test]
    fn test_layout_bins_payload() {
        // 1 second at 24 kHz is 48000 payload bytes split into 24 frames
        let layout = FrameLayout::for_buffer_len(HEADER_BYTES + 48_000);
        assert_eq!(layout.total_frames, 24);
        assert_eq!(layout.frame_bytes, 2000);
        assert_eq!(layout.byte_range(0, HEADER_BYTES + 48_000), (44, 2044));
        assert_eq!(layout.byte_range(23, HEADER_BYTES + 48_000), (46_044, 48_044));

        let empty = FrameLayout::for_buffer_len(HEADER_BYTES);
        assert_eq!(empty.total_frames, 0);
        assert_eq!(empty.frame_bytes, 0);
    }

    #[test]
    fn test_energy_uses_unsigned_words() {
        // -1 is 0xFFFF on the wire and counts as 65535
        let wav = encode_pcm16_wav(&[-1i16; 1000]);
        let layout = FrameLayout::for_buffer_len(wav.len());
        let energies = frame_energies(&wav, &layout);

        assert_eq!(energies.len(), 1);
        assert_relative_eq!(energies[0], 65535.0);
    }

    #[test]
    fn test_energy_per_frame() {
        let mut samples = vec![100i16; 1000];
        samples.extend(vec![300i16; 1000]);
        let wav = encode_pcm16_wav(&samples);
        let layout = FrameLayout::for_buffer_len(wav.len());
        let energies = frame_energies(&wav, &layout);

        assert_eq!(energies.len(), 2);
        assert_relative_eq!(energies[0], 100.0);
        assert_relative_eq!(energies[1], 300.0);
    }

    #[test]
    fn test_odd_frame_bytes_count_half_samples() {
        // Three payload bytes: one word plus a dangling byte
        let frame = [10u8, 0, 7];
        assert_relative_eq!(frame_energy(&frame), 10.0 / 1.5);
        assert_eq!(frame_energy(&[]), 0.0);
    }

    #[test]
    fn test_thresholds_are_percentiles() {
        let energies: Vec<f64> = (0..8).rev().map(|v| v as f64).collect();
        let thresholds = adaptive_thresholds(&energies).unwrap();

        assert_eq!(thresholds.silence, 2.0);
        assert_eq!(thresholds.low, 4.0);
        assert_eq!(thresholds.medium, 6.0);
        assert!(adaptive_thresholds(&[]).is_none());
    }
}
