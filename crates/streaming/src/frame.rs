//! Binary audio frame codec
//!
//! Wire layout, big-endian:
//!
//! ```text
//! [sequence: u32][timestamp_ms: u64][speaker: u8][payload: PCM bytes]
//! ```
//!
//! Payload is 16kHz 16-bit mono little-endian PCM. Acks and telemetry
//! travel as JSON text messages on the same socket; only audio is binary.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use call_agent_core::Speaker;

/// Header bytes before the payload
pub const FRAME_HEADER_LEN: usize = 13;

const SPEAKER_CUSTOMER: u8 = 0;
const SPEAKER_AGENT: u8 = 1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {0} bytes, need at least {FRAME_HEADER_LEN}")]
    TooShort(usize),

    #[error("unknown speaker tag: {0}")]
    UnknownSpeaker(u8),
}

/// One audio frame on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunkFrame {
    pub sequence: u32,
    pub timestamp_ms: u64,
    pub speaker: Speaker,
    pub payload: Bytes,
}

impl AudioChunkFrame {
    pub fn customer(sequence: u32, timestamp_ms: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            timestamp_ms,
            speaker: Speaker::Customer,
            payload: payload.into(),
        }
    }

    pub fn agent(sequence: u32, timestamp_ms: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            timestamp_ms,
            speaker: Speaker::Agent,
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        buf.put_u32(self.sequence);
        buf.put_u64(self.timestamp_ms);
        buf.put_u8(match self.speaker {
            Speaker::Customer => SPEAKER_CUSTOMER,
            Speaker::Agent => SPEAKER_AGENT,
        });
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut data: Bytes) -> Result<Self, FrameError> {
        if data.len() < FRAME_HEADER_LEN {
            return Err(FrameError::TooShort(data.len()));
        }
        let sequence = data.get_u32();
        let timestamp_ms = data.get_u64();
        let speaker = match data.get_u8() {
            SPEAKER_CUSTOMER => Speaker::Customer,
            SPEAKER_AGENT => Speaker::Agent,
            other => return Err(FrameError::UnknownSpeaker(other)),
        };
        Ok(Self {
            sequence,
            timestamp_ms,
            speaker,
            payload: data,
        })
    }
}

/// Mean absolute amplitude of 16-bit LE samples, normalized to 0.0..1.0.
///
/// A trailing odd byte is ignored.
pub fn chunk_energy(payload: &[u8]) -> f32 {
    let samples = payload.len() / 2;
    if samples == 0 {
        return 0.0;
    }
    let sum: f64 = payload
        .chunks_exact(2)
        .map(|pair| (i16::from_le_bytes([pair[0], pair[1]]) as f64).abs())
        .sum();
    (sum / samples as f64 / i16::MAX as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_encode_decode() {
        let frame = AudioChunkFrame::customer(7, 1234, pcm(&[100, -200, 300]));
        let decoded = AudioChunkFrame::decode(frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_header_layout() {
        let frame = AudioChunkFrame::agent(1, 2, vec![0xAA]);
        let wire = frame.encode();
        assert_eq!(&wire[0..4], &[0, 0, 0, 1]);
        assert_eq!(&wire[4..12], &[0, 0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(wire[12], 1);
        assert_eq!(wire[13], 0xAA);
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let err = AudioChunkFrame::decode(Bytes::from_static(&[1, 2, 3])).unwrap_err();
        assert_eq!(err, FrameError::TooShort(3));
    }

    #[test]
    fn test_unknown_speaker_rejected() {
        let mut wire = AudioChunkFrame::customer(0, 0, vec![0u8; 4]).encode().to_vec();
        wire[12] = 9;
        let err = AudioChunkFrame::decode(Bytes::from(wire)).unwrap_err();
        assert_eq!(err, FrameError::UnknownSpeaker(9));
    }

    #[test]
    fn test_empty_payload_is_valid() {
        let frame = AudioChunkFrame::customer(0, 0, Vec::new());
        let decoded = AudioChunkFrame::decode(frame.encode()).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_energy_of_silence() {
        assert_eq!(chunk_energy(&pcm(&[0, 0, 0, 0])), 0.0);
        assert_eq!(chunk_energy(&[]), 0.0);
    }

    #[test]
    fn test_energy_of_loud_signal() {
        let loud = pcm(&[i16::MAX, i16::MIN + 1, i16::MAX, i16::MIN + 1]);
        let energy = chunk_energy(&loud);
        assert!((energy - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_energy_monotonic_in_amplitude() {
        let quiet = chunk_energy(&pcm(&[100, -100, 100, -100]));
        let loud = chunk_energy(&pcm(&[10_000, -10_000, 10_000, -10_000]));
        assert!(loud > quiet);
    }
}
