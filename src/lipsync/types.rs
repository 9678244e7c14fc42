//! # Lip-Sync Data Types
//!
//! The output vocabulary of the analyzer: mouth shapes, timed cues and the
//! result wrapper the avatar renderer consumes, plus the diagnostic records
//! that describe how a particular buffer was classified.
//!
//! ## Wire Format:
//! ```json
//! { "mouthCues": [ { "start": 0.0, "end": 0.041666666666666664, "value": "B" } ] }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four mouth textures the avatar can display.
///
/// ## Rust Concepts:
/// - **Copy**: Shapes are plain tags, so they are passed around by value
/// - **Serialize**: Unit variants serialize as their name, which is exactly
///   the single-letter value the renderer expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouthShape {
    /// Open mouth
    A,
    /// Closed mouth
    B,
    /// Half-open mouth
    C,
    /// Emphasized articulation (the loudest frames)
    D,
}

impl MouthShape {
    /// The non-silent shapes in the order minimum coverage is enforced.
    pub const VOICED: [MouthShape; 3] = [MouthShape::A, MouthShape::C, MouthShape::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            MouthShape::A => "A",
            MouthShape::B => "B",
            MouthShape::C => "C",
            MouthShape::D => "D",
        }
    }
}

impl fmt::Display for MouthShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timed mouth shape covering `[start, end)` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f64,
    pub end: f64,
    pub value: MouthShape,
}

/// The complete cue list for one audio buffer.
///
/// Cues are contiguous and ordered; each cue's `end` is the next cue's `start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LipSyncResult {
    #[serde(rename = "mouthCues")]
    pub mouth_cues: Vec<MouthCue>,
}

impl LipSyncResult {
    pub fn len(&self) -> usize {
        self.mouth_cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mouth_cues.is_empty()
    }

    /// Total time covered by the cues, in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.mouth_cues.last().map(|cue| cue.end).unwrap_or(0.0)
    }

    /// Count how often each shape appears in the cue list.
    pub fn distribution(&self) -> ShapeDistribution {
        ShapeDistribution::from_shapes(self.mouth_cues.iter().map(|cue| cue.value))
    }
}

/// Per-shape frame counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct ShapeDistribution {
    pub A: usize,
    pub B: usize,
    pub C: usize,
    pub D: usize,
}

impl ShapeDistribution {
    pub fn from_shapes<I>(shapes: I) -> Self
    where
        I: IntoIterator<Item = MouthShape>,
    {
        let mut distribution = Self::default();
        for shape in shapes {
            *distribution.count_mut(shape) += 1;
        }
        distribution
    }

    pub fn count(&self, shape: MouthShape) -> usize {
        match shape {
            MouthShape::A => self.A,
            MouthShape::B => self.B,
            MouthShape::C => self.C,
            MouthShape::D => self.D,
        }
    }

    fn count_mut(&mut self, shape: MouthShape) -> &mut usize {
        match shape {
            MouthShape::A => &mut self.A,
            MouthShape::B => &mut self.B,
            MouthShape::C => &mut self.C,
            MouthShape::D => &mut self.D,
        }
    }

    pub fn total(&self) -> usize {
        self.A + self.B + self.C + self.D
    }
}

/// Percentile-derived energy cut-offs for one buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyThresholds {
    /// 25th percentile: below this the mouth is closed
    pub silence: f64,
    /// 50th percentile: below this the mouth is half-open
    pub low: f64,
    /// 75th percentile: below this the mouth is open, above it emphasized
    pub medium: f64,
}

/// Diagnostics describing how a buffer was analyzed.
///
/// ## Purpose:
/// Returned next to the cues when a caller asks for diagnostics and logged at
/// debug level otherwise. Nothing in here affects the cue list itself.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub analysis_id: String,
    pub buffer_bytes: usize,
    pub audio_seconds: f64,
    pub total_frames: usize,
    pub frame_bytes: usize,
    pub thresholds: EnergyThresholds,
    pub initial_distribution: ShapeDistribution,
    pub final_distribution: ShapeDistribution,
    pub target_minimum: usize,
    pub elapsed_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_with_renderer_field_names() {
        let result = LipSyncResult {
            mouth_cues: vec![MouthCue { start: 0.0, end: 0.5, value: MouthShape::D }],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mouthCues"][0]["value"], "D");
        assert_eq!(json["mouthCues"][0]["end"], 0.5);
        assert!(json.get("mouth_cues").is_none());
    }

    #[test]
    fn test_distribution_counts() {
        let shapes = [MouthShape::B, MouthShape::A, MouthShape::A, MouthShape::D];
        let distribution = ShapeDistribution::from_shapes(shapes);

        assert_eq!(distribution.count(MouthShape::A), 2);
        assert_eq!(distribution.count(MouthShape::C), 0);
        assert_eq!(distribution.total(), 4);
    }

    #[test]
    fn test_result_distribution_counts_cue_values() {
        let result = LipSyncResult {
            mouth_cues: [MouthShape::B, MouthShape::C, MouthShape::C, MouthShape::B]
                .iter()
                .enumerate()
                .map(|(i, &value)| MouthCue {
                    start: i as f64,
                    end: (i + 1) as f64,
                    value,
                })
                .collect(),
        };

        let distribution = result.distribution();
        assert_eq!(distribution.B, 2);
        assert_eq!(distribution.C, 2);
        assert_eq!(distribution.total(), result.len());
    }
}
