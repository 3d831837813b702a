//! Inbound frame codec: what the receiver reads off a connection after
//! stripping the `[u32 len]` prefix.
//!
//! ```text
//! 0x01 Event      [i64 ts][u16 key_len][key utf8][f64 value]
//! 0x02 Watermark  [i64 ts]
//! ```

use crate::result::codec::{ByteReader, CodecError, CodecResult, put_i64, put_u16};

const KIND_EVENT: u8 = 0x01;
const KIND_WATERMARK: u8 = 0x02;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Event { ts: i64, key: String, value: f64 },
    Watermark { ts: i64 },
}

impl InboundFrame {
    pub fn event(ts: i64, key: impl Into<String>, value: f64) -> Self {
        Self::Event {
            ts,
            key: key.into(),
            value,
        }
    }

    pub fn ts(&self) -> i64 {
        match self {
            Self::Event { ts, .. } | Self::Watermark { ts } => *ts,
        }
    }

    /// Encode the frame body. Keys longer than `u16::MAX` bytes are cut at
    /// the last character boundary that fits.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Event { ts, key, value } => {
                let key = truncate_utf8(key, u16::MAX as usize);
                out.reserve(1 + 8 + 2 + key.len() + 8);
                out.push(KIND_EVENT);
                put_i64(&mut out, *ts);
                put_u16(&mut out, key.len() as u16);
                out.extend_from_slice(key.as_bytes());
                out.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Self::Watermark { ts } => {
                out.push(KIND_WATERMARK);
                put_i64(&mut out, *ts);
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let frame = match reader.read_u8()? {
            KIND_EVENT => {
                let ts = reader.read_i64()?;
                let key_len = reader.read_u16()? as usize;
                let key = std::str::from_utf8(reader.read_bytes(key_len)?)
                    .map_err(|_| CodecError::InvalidUtf8)?
                    .to_string();
                let value = reader.read_f64()?;
                Self::Event { ts, key, value }
            }
            KIND_WATERMARK => Self::Watermark {
                ts: reader.read_i64()?,
            },
            other => return Err(CodecError::UnknownFrameKind(other)),
        };
        reader.finish()?;
        Ok(frame)
    }
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_layout() {
        let bytes = InboundFrame::event(7, "ab", 1.5).encode();
        assert_eq!(bytes[0], KIND_EVENT);
        assert_eq!(&bytes[1..9], &7i64.to_be_bytes());
        assert_eq!(&bytes[9..11], &2u16.to_be_bytes());
        assert_eq!(&bytes[11..13], b"ab");
        assert_eq!(&bytes[13..21], &1.5f64.to_be_bytes());
        assert_eq!(
            InboundFrame::decode(&bytes).unwrap(),
            InboundFrame::event(7, "ab", 1.5)
        );
    }

    #[test]
    fn watermark_frame() {
        let frame = InboundFrame::Watermark { ts: -3 };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 9);
        assert_eq!(InboundFrame::decode(&bytes).unwrap(), frame);
        assert_eq!(frame.ts(), -3);
    }

    #[test]
    fn malformed_frames_rejected() {
        assert_eq!(
            InboundFrame::decode(&[0x7f]).unwrap_err(),
            CodecError::UnknownFrameKind(0x7f)
        );
        assert!(matches!(
            InboundFrame::decode(&[KIND_WATERMARK, 0, 0]),
            Err(CodecError::Truncated { .. })
        ));

        let mut bad_utf8 = InboundFrame::event(1, "xy", 0.0).encode();
        bad_utf8[11] = 0xff;
        assert_eq!(
            InboundFrame::decode(&bad_utf8).unwrap_err(),
            CodecError::InvalidUtf8
        );

        let mut trailing = InboundFrame::Watermark { ts: 1 }.encode();
        trailing.push(9);
        assert_eq!(
            InboundFrame::decode(&trailing).unwrap_err(),
            CodecError::TrailingBytes(1)
        );
    }

    #[test]
    fn oversized_key_is_cut_on_char_boundary() {
        let key = "é".repeat(40_000);
        let bytes = InboundFrame::event(0, key, 0.0).encode();
        let InboundFrame::Event { key, .. } = InboundFrame::decode(&bytes).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(key.len(), 65_534);
        assert!(key.chars().all(|c| c == 'é'));
    }
}
