//! Errors raised when a buffer fails the optional input checks.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LipSyncError {
    #[error("Audio buffer is {len} bytes, shorter than the 44-byte WAV header")]
    BufferTooShort { len: usize },

    #[error("Expected '{expected}' tag at byte offset {offset}")]
    MissingTag { offset: usize, expected: &'static str },

    #[error("{field} mismatch: expected {expected}, got {actual}")]
    FormatMismatch {
        field: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("Audio is {seconds:.2}s long, limit is {limit}s")]
    TooLong { seconds: f64, limit: u64 },

    #[error("Failed to read WAV header: {0}")]
    Io(#[from] std::io::Error),
}
