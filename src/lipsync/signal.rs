//! Synthetic speech-like test signals.
//!
//! Used by the debug endpoint to exercise the analyzer without a
//! text-to-speech provider, and by tests that need realistic energy contours.

use crate::lipsync::format::SAMPLE_RATE;
use std::f64::consts::PI;

/// Peak amplitude, leaving headroom below `i16::MAX`
const PEAK: f64 = 28_000.0;

/// A sine carrier whose loudness rises and falls like syllables.
///
/// ## Parameters:
/// - **duration_seconds**: length of the signal
/// - **frequency_hz**: carrier pitch (a voice fundamental sits around 100-250 Hz)
/// - **syllable_hz**: envelope rate; 3-5 Hz resembles conversational speech
///
/// The envelope is a raised cosine with a slower second component, so
/// successive syllables differ in loudness.
pub fn speech_like_tone(duration_seconds: f64, frequency_hz: f64, syllable_hz: f64) -> Vec<i16> {
    let sample_count = (duration_seconds.max(0.0) * SAMPLE_RATE as f64) as usize;

    (0..sample_count)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            let syllable = 0.5 * (1.0 - (2.0 * PI * syllable_hz * t).cos());
            let phrase = 0.6 + 0.4 * (2.0 * PI * 0.37 * t).sin();
            let carrier = (2.0 * PI * frequency_hz * t).sin();
            let sample = PEAK * syllable * phrase * carrier;
            sample.clamp(i16::MIN as f64, i16::MAX as f64) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_length_and_range() {
        let tone = speech_like_tone(0.5, 220.0, 4.0);
        assert_eq!(tone.len(), 12_000);
        assert_eq!(tone[0], 0);
        assert!(tone.iter().any(|&s| s > 10_000));
        assert!(tone.iter().any(|&s| s < -10_000));

        assert!(speech_like_tone(-1.0, 220.0, 4.0).is_empty());
    }
}
