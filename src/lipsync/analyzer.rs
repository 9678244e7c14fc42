//! # Lip-Sync Cue Generation
//!
//! Turns one complete speech buffer into a frame-by-frame sequence of mouth
//! shapes. The work happens in a fixed series of passes over a per-frame shape
//! array; later passes read what earlier passes wrote, so the order matters.
//!
//! ## Pipeline:
//! 1. **Framing**: duration, frame count and per-frame byte ranges
//! 2. **Energy**: mean raw sample magnitude per frame
//! 3. **Thresholds**: 25th/50th/75th percentile of the energies
//! 4. **Assignment**: energy band to shape (B < C < A < D)
//! 5. **Plosives**: sharp single-frame attacks become D
//! 6. **Monotony breaks**: flat open stretches get periodic D/C accents
//! 7. **Smoothing**: single-frame flicker snaps to its neighbours
//! 8. **Minimum coverage**: A, C and D each appear a minimal number of times
//! 9. **Boundaries**: first and last frames are closed
//! 10. **Emission**: one cue per frame
//!
//! ## Concurrency:
//! The analyzer holds only configuration, so one instance can be shared by
//! any number of threads analyzing independent buffers.

use crate::lipsync::energy::{adaptive_thresholds, frame_energies, FrameLayout};
use crate::lipsync::error::LipSyncError;
use crate::lipsync::format::{self, HEADER_BYTES};
use crate::lipsync::types::{
    AnalysisReport, EnergyThresholds, LipSyncResult, MouthCue, MouthShape, ShapeDistribution,
};
use std::time::Instant;
use tracing::{debug, info, info_span};
use uuid::Uuid;

/// Behaviour switches for the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Validate the WAV header fields before analyzing
    pub strict_format: bool,

    /// Longest accepted recording in seconds (checked by `analyze_checked`)
    pub max_audio_seconds: u64,

    /// Log shape distributions before and after minimum-coverage enforcement
    pub log_distributions: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            strict_format: false,
            max_audio_seconds: 600,
            log_distributions: true,
        }
    }
}

/// Generates mouth cues from 16-bit mono 24 kHz PCM buffers.
#[derive(Debug, Clone, Default)]
pub struct LipSyncAnalyzer {
    config: AnalyzerConfig,
}

impl LipSyncAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a buffer without any input checks.
    ///
    /// Buffers shorter than the header yield an empty cue list. Anything else
    /// is analyzed as 16-bit mono 24 kHz PCM whatever it actually contains.
    pub fn analyze(&self, bytes: &[u8]) -> LipSyncResult {
        self.analyze_with_report(bytes).0
    }

    /// Validate the buffer, then analyze it.
    ///
    /// ## Validation Checks:
    /// - **Length**: the 44-byte header must be present
    /// - **Header**: fixed format fields, only when `strict_format` is set
    /// - **Duration**: at most `max_audio_seconds`
    pub fn analyze_checked(
        &self,
        bytes: &[u8],
    ) -> Result<(LipSyncResult, AnalysisReport), LipSyncError> {
        if bytes.len() < HEADER_BYTES {
            return Err(LipSyncError::BufferTooShort { len: bytes.len() });
        }

        if self.config.strict_format {
            format::validate_header(bytes)?;
        }

        let seconds = format::audio_seconds(bytes.len());
        if seconds > self.config.max_audio_seconds as f64 {
            return Err(LipSyncError::TooLong {
                seconds,
                limit: self.config.max_audio_seconds,
            });
        }

        Ok(self.analyze_with_report(bytes))
    }

    /// Analyze a buffer and return the diagnostics alongside the cues.
    pub fn analyze_with_report(&self, bytes: &[u8]) -> (LipSyncResult, AnalysisReport) {
        let analysis_id = Uuid::new_v4().to_string();
        let span = info_span!("lipsync", analysis_id = %analysis_id);
        let _guard = span.enter();

        let started = Instant::now();
        let audio_seconds = format::audio_seconds(bytes.len());
        let layout = FrameLayout::for_buffer_len(bytes.len());

        debug!(
            audio_seconds = %format!("{:.2}", audio_seconds),
            buffer_bytes = bytes.len(),
            total_frames = layout.total_frames,
            "Generating lip sync frames"
        );

        let energies = frame_energies(bytes, &layout);
        let thresholds = adaptive_thresholds(&energies).unwrap_or_default();

        debug!(
            silence = thresholds.silence,
            low = thresholds.low,
            medium = thresholds.medium,
            "Energy thresholds"
        );

        let mut shapes = assign_shapes(&energies, &thresholds);
        apply_plosive_overrides(&energies, &mut shapes);
        apply_monotony_breaks(&energies, &mut shapes);
        smooth_isolated_frames(&mut shapes);

        let initial_distribution = ShapeDistribution::from_shapes(shapes.iter().copied());
        if self.config.log_distributions {
            debug!(distribution = ?initial_distribution, "Initial mouth shape distribution");
        }

        let target = target_minimum(layout.total_frames);
        enforce_minimum_coverage(&mut shapes, &initial_distribution, target);
        force_closed_boundaries(&mut shapes);

        let result = emit_cues(&shapes);

        let final_distribution = result.distribution();
        if self.config.log_distributions {
            debug!(
                distribution = ?final_distribution,
                frames = final_distribution.total(),
                "Final mouth shape distribution"
            );
        }
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            frames = result.len(),
            elapsed_ms = %format!("{:.3}", elapsed_ms),
            "Lip sync generated"
        );

        let report = AnalysisReport {
            analysis_id,
            buffer_bytes: bytes.len(),
            audio_seconds,
            total_frames: layout.total_frames,
            frame_bytes: layout.frame_bytes,
            thresholds,
            initial_distribution,
            final_distribution,
            target_minimum: target,
            elapsed_ms,
        };

        (result, report)
    }
}

/// Map each frame's energy band to a shape.
pub fn assign_shapes(energies: &[f64], thresholds: &EnergyThresholds) -> Vec<MouthShape> {
    energies
        .iter()
        .map(|&energy| {
            if energy < thresholds.silence {
                MouthShape::B
            } else if energy < thresholds.low {
                MouthShape::C
            } else if energy < thresholds.medium {
                MouthShape::A
            } else {
                MouthShape::D
            }
        })
        .collect()
}

/// Promote interior frames that are 50% louder than both neighbours to D.
pub fn apply_plosive_overrides(energies: &[f64], shapes: &mut [MouthShape]) {
    for i in interior(energies.len()) {
        let energy = energies[i];
        if energy > energies[i - 1] * 1.5 && energy > energies[i + 1] * 1.5 {
            shapes[i] = MouthShape::D;
        }
    }
}

/// Break up flat open stretches: every 3rd frame index becomes D, otherwise
/// every 5th becomes C.
///
/// A frame is flat when it differs from both neighbours by less than 10% of
/// its own energy. The modulo tests use the absolute frame index.
pub fn apply_monotony_breaks(energies: &[f64], shapes: &mut [MouthShape]) {
    for i in interior(energies.len()) {
        let energy = energies[i];
        let tolerance = energy * 0.1;
        let flat = (energy - energies[i - 1]).abs() < tolerance
            && (energy - energies[i + 1]).abs() < tolerance;

        if !flat || shapes[i] != MouthShape::A {
            continue;
        }

        if i % 3 == 0 {
            shapes[i] = MouthShape::D;
        } else if i % 5 == 0 {
            shapes[i] = MouthShape::C;
        }
    }
}

/// Snap a frame to its neighbours when both neighbours agree and it does not.
///
/// Runs front to back in place, so a frame sees its already-smoothed
/// predecessor.
pub fn smooth_isolated_frames(shapes: &mut [MouthShape]) {
    for i in interior(shapes.len()) {
        let prev = shapes[i - 1];
        if prev == shapes[i + 1] && shapes[i] != prev {
            shapes[i] = prev;
        }
    }
}

/// `max(2, floor(total_frames * 5%))`
pub fn target_minimum(total_frames: usize) -> usize {
    2.max((total_frames as f64 * 0.05).floor() as usize)
}

/// Inject A, C and D (in that order) where they are under-represented.
///
/// ## Process:
/// For each shape whose count in `counts` is below `target`, frames
/// 5, 9, 13, ... up to `len - 5` are visited and overwritten when neither the
/// frame nor its neighbours already show that shape, until `target` frames
/// have been added or the scan runs out.
///
/// `counts` is taken once before any injection, so a later shape may
/// overwrite frames an earlier shape just claimed.
pub fn enforce_minimum_coverage(
    shapes: &mut [MouthShape],
    counts: &ShapeDistribution,
    target: usize,
) {
    for shape in MouthShape::VOICED {
        if counts.count(shape) >= target {
            continue;
        }

        debug!(shape = %shape, target, "Adding more shapes to meet minimum");

        let mut added = 0;
        let mut i = 5;
        while i + 5 < shapes.len() && added < target {
            if shapes[i] != shape && shapes[i - 1] != shape && shapes[i + 1] != shape {
                shapes[i] = shape;
                added += 1;
            }
            i += 4;
        }
    }
}

/// Start and end with a closed mouth.
pub fn force_closed_boundaries(shapes: &mut [MouthShape]) {
    if let Some(first) = shapes.first_mut() {
        *first = MouthShape::B;
    }
    if let Some(last) = shapes.last_mut() {
        *last = MouthShape::B;
    }
}

/// One cue per frame spanning `[i / 24, (i + 1) / 24)`.
pub fn emit_cues(shapes: &[MouthShape]) -> LipSyncResult {
    let frame_duration = format::frame_duration();
    let mouth_cues = shapes
        .iter()
        .enumerate()
        .map(|(i, &value)| MouthCue {
            start: i as f64 * frame_duration,
            end: (i + 1) as f64 * frame_duration,
            value,
        })
        .collect();

    LipSyncResult { mouth_cues }
}

/// Indices that have both a predecessor and a successor.
fn interior(len: usize) -> std::ops::Range<usize> {
    1..len.saturating_sub(1)
}
