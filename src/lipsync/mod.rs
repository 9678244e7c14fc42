//! # Lip-Sync Module
//!
//! Derives avatar mouth animation from synthesized speech. A finished TTS
//! buffer goes in, a list of timed mouth-shape cues comes out.
//!
//! ## Key Components:
//! - **Format**: the fixed input layout (44-byte WAV header, 16-bit mono 24 kHz PCM)
//! - **Energy**: per-frame loudness and adaptive percentile thresholds
//! - **Analyzer**: the staged shape pipeline producing the cue list
//! - **Signal**: synthetic speech-like audio for smoke tests
//!
//! ## Output Format:
//! `{ "mouthCues": [{ "start": 0.0, "end": 0.0417, "value": "B" }, ...] }` with
//! values from the four-shape alphabet `A` (open), `B` (closed),
//! `C` (half-open) and `D` (emphasized).

pub mod analyzer;   // Staged cue generation
pub mod energy;     // Framing, energy and thresholds
pub mod error;      // Input validation errors
pub mod format;     // Fixed WAV/PCM layout
pub mod signal;     // Synthetic test signals
pub mod types;      // Cue and diagnostic types

pub use analyzer::{AnalyzerConfig, LipSyncAnalyzer};
pub use error::LipSyncError;
pub use types::{AnalysisReport, LipSyncResult};
