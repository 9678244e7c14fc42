//! # Input Audio Layout
//!
//! The analyzer accepts exactly one format: a canonical 44-byte WAV header
//! followed by 16-bit little-endian mono PCM at 24 kHz. This is what the
//! text-to-speech provider returns for LINEAR16 output.
//!
//! ## Key Functions:
//! - **Timing**: payload length, duration and frame count for a buffer
//! - **Header validation**: optional strict check of the fixed header fields
//! - **Encoding**: build a buffer in the same layout from raw samples
//!
//! ## Header Layout (byte offsets):
//! ```text
//!  0 "RIFF"   4 riff size   8 "WAVE"  12 "fmt "  16 fmt size
//! 20 format  22 channels   24 rate   28 byte rate  32 block align
//! 34 bits    36 "data"     40 data size   44 samples...
//! ```

use crate::lipsync::error::LipSyncError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// Size of the WAV header that precedes the samples.
pub const HEADER_BYTES: usize = 44;
pub const BYTES_PER_SAMPLE: usize = 2;
pub const CHANNELS: usize = 1;
pub const SAMPLE_RATE: usize = 24_000;
pub const BITS_PER_SAMPLE: u16 = 16;
/// Visual frame rate of the avatar animation.
pub const FRAMES_PER_SECOND: usize = 24;

const PCM_FORMAT_TAG: u16 = 1;

/// Header fields read from a buffer that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

/// Number of bytes after the header.
///
/// Buffers shorter than the header have no payload.
pub fn payload_len(buffer_len: usize) -> usize {
    buffer_len.saturating_sub(HEADER_BYTES)
}

/// Duration of the buffer in seconds, derived from its length alone.
pub fn audio_seconds(buffer_len: usize) -> f64 {
    payload_len(buffer_len) as f64 / (BYTES_PER_SAMPLE * CHANNELS * SAMPLE_RATE) as f64
}

/// Number of animation frames: `ceil(seconds * 24)`.
pub fn total_frames(buffer_len: usize) -> usize {
    (audio_seconds(buffer_len) * FRAMES_PER_SECOND as f64).ceil() as usize
}

/// Duration of one animation frame in seconds.
pub fn frame_duration() -> f64 {
    1.0 / FRAMES_PER_SECOND as f64
}

/// Check that the buffer starts with the canonical header for the fixed format.
///
/// ## Validation Checks:
/// 1. **Length**: at least the 44 header bytes
/// 2. **Tags**: `RIFF`, `WAVE`, `fmt ` and `data` at their canonical offsets
/// 3. **Format**: PCM, mono, 24000 Hz, 16 bits per sample
///
/// Extended headers with extra chunks before `data` are rejected, since the
/// analyzer always skips exactly 44 bytes.
pub fn validate_header(bytes: &[u8]) -> Result<PcmHeader, LipSyncError> {
    if bytes.len() < HEADER_BYTES {
        return Err(LipSyncError::BufferTooShort { len: bytes.len() });
    }

    let mut cursor = Cursor::new(&bytes[..HEADER_BYTES]);

    expect_tag(&mut cursor, 0, "RIFF")?;
    let _riff_size = cursor.read_u32::<LittleEndian>()?;
    expect_tag(&mut cursor, 8, "WAVE")?;
    expect_tag(&mut cursor, 12, "fmt ")?;
    let _fmt_size = cursor.read_u32::<LittleEndian>()?;

    let format_tag = cursor.read_u16::<LittleEndian>()?;
    let channels = cursor.read_u16::<LittleEndian>()?;
    let sample_rate = cursor.read_u32::<LittleEndian>()?;
    let _byte_rate = cursor.read_u32::<LittleEndian>()?;
    let _block_align = cursor.read_u16::<LittleEndian>()?;
    let bits_per_sample = cursor.read_u16::<LittleEndian>()?;

    expect_tag(&mut cursor, 36, "data")?;
    let data_len = cursor.read_u32::<LittleEndian>()?;

    check_field("Audio format", PCM_FORMAT_TAG as u32, format_tag as u32)?;
    check_field("Channel count", CHANNELS as u32, channels as u32)?;
    check_field("Sample rate", SAMPLE_RATE as u32, sample_rate)?;
    check_field("Bit depth", BITS_PER_SAMPLE as u32, bits_per_sample as u32)?;

    Ok(PcmHeader {
        channels,
        sample_rate,
        bits_per_sample,
        data_len,
    })
}

fn expect_tag(
    cursor: &mut Cursor<&[u8]>,
    offset: usize,
    expected: &'static str,
) -> Result<(), LipSyncError> {
    let mut tag = [0u8; 4];
    cursor.read_exact(&mut tag)?;
    if &tag[..] != expected.as_bytes() {
        return Err(LipSyncError::MissingTag { offset, expected });
    }
    Ok(())
}

fn check_field(field: &'static str, expected: u32, actual: u32) -> Result<(), LipSyncError> {
    if expected != actual {
        return Err(LipSyncError::FormatMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Canonical 44-byte header for `data_len` bytes of 16-bit mono 24 kHz PCM.
pub fn pcm16_header(data_len: u32) -> [u8; HEADER_BYTES] {
    let block_align = (CHANNELS * BYTES_PER_SAMPLE) as u16;
    let byte_rate = SAMPLE_RATE as u32 * block_align as u32;

    let mut header = [0u8; HEADER_BYTES];
    header[0..4].copy_from_slice(b"RIFF");
    LittleEndian::write_u32(&mut header[4..8], 36 + data_len);
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    LittleEndian::write_u32(&mut header[16..20], 16);
    LittleEndian::write_u16(&mut header[20..22], PCM_FORMAT_TAG);
    LittleEndian::write_u16(&mut header[22..24], CHANNELS as u16);
    LittleEndian::write_u32(&mut header[24..28], SAMPLE_RATE as u32);
    LittleEndian::write_u32(&mut header[28..32], byte_rate);
    LittleEndian::write_u16(&mut header[32..34], block_align);
    LittleEndian::write_u16(&mut header[34..36], BITS_PER_SAMPLE);
    header[36..40].copy_from_slice(b"data");
    LittleEndian::write_u32(&mut header[40..44], data_len);
    header
}

/// Encode 16-bit samples as a 24 kHz mono WAV buffer with a 44-byte header.
pub fn encode_pcm16_wav(samples: &[i16]) -> Vec<u8> {
    let data_len = samples.len() * BYTES_PER_SAMPLE;

    let mut out = vec![0u8; HEADER_BYTES + data_len];
    out[..HEADER_BYTES].copy_from_slice(&pcm16_header(data_len as u32));
    LittleEndian::write_i16_into(samples, &mut out[HEADER_BYTES..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_formula() {
        // 2 seconds of audio
        assert_eq!(total_frames(HEADER_BYTES + 2 * 24_000 * 2), 48);
        // Half a frame still counts as a frame
        assert_eq!(total_frames(HEADER_BYTES + 1000), 1);
        assert_eq!(total_frames(HEADER_BYTES), 0);
        // Shorter than the header behaves like an empty payload
        assert_eq!(total_frames(10), 0);

        for n in [1usize, 2, 333, 4000, 47_999, 96_002] {
            let expected = ((n as f64 / (2.0 * 24_000.0)) * 24.0).ceil() as usize;
            assert_eq!(total_frames(HEADER_BYTES + n), expected, "payload of {} bytes", n);
        }
    }

    #[test]
    fn test_encoded_header_validates() {
        let samples: Vec<i16> = (0..240).map(|i| (i * 100) as i16).collect();
        let wav = encode_pcm16_wav(&samples);

        assert_eq!(wav.len(), HEADER_BYTES + samples.len() * 2);
        let header = validate_header(&wav).unwrap();
        assert_eq!(header.sample_rate, 24_000);
        assert_eq!(header.channels, 1);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_len as usize, samples.len() * 2);
    }

    #[test]
    fn test_header_and_sample_layout() {
        let header = pcm16_header(0);
        assert_eq!(&header[4..8], &36u32.to_le_bytes());
        assert_eq!(validate_header(&header).unwrap().data_len, 0);

        let wav = encode_pcm16_wav(&[-2, 258]);
        assert_eq!(&wav[..HEADER_BYTES], &pcm16_header(4)[..]);
        assert_eq!(&wav[HEADER_BYTES..], &[0xFE, 0xFF, 0x02, 0x01]);
    }

    #[test]
    fn test_header_rejections() {
        assert!(matches!(
            validate_header(&[0u8; 20]),
            Err(LipSyncError::BufferTooShort { len: 20 })
        ));

        let mut wav = encode_pcm16_wav(&[0i16; 16]);
        wav[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            validate_header(&wav),
            Err(LipSyncError::MissingTag { offset: 8, .. })
        ));

        let mut wav = encode_pcm16_wav(&[0i16; 16]);
        wav[24..28].copy_from_slice(&16_000u32.to_le_bytes());
        match validate_header(&wav) {
            Err(LipSyncError::FormatMismatch { field, expected, actual }) => {
                assert_eq!(field, "Sample rate");
                assert_eq!(expected, 24_000);
                assert_eq!(actual, 16_000);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let mut wav = encode_pcm16_wav(&[0i16; 16]);
        wav[22..24].copy_from_slice(&2u16.to_le_bytes());
        assert!(matches!(
            validate_header(&wav),
            Err(LipSyncError::FormatMismatch { field: "Channel count", .. })
        ));
    }
}
