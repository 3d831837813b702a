use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use super::codec::{ByteReader, CodecError, CodecResult, put_i32, put_u32};

// Stable type tags. These are part of the wire contract and must never be
// renumbered.
pub const TAG_BOOL: i32 = -4;
pub const TAG_LONG: i32 = -8;
pub const TAG_DOUBLE: i32 = -10;
pub const TAG_TEXT: i32 = -11;
pub const TAG_BYTES: i32 = -12;
pub const TAG_PAIR: i32 = -200;

/// A value that can travel in the `result` field of a window result.
///
/// On the wire the field is `[i32 tag][u32 len][len bytes]`; implementors
/// only produce and consume the inner bytes.
pub trait ResultPayload: Sized {
    fn type_tag(&self) -> i32;

    fn write_payload(&self, out: &mut Vec<u8>);

    /// Rebuild a value from its tag and exactly the bytes written by
    /// [`write_payload`](Self::write_payload).
    fn read_payload(tag: i32, bytes: &[u8]) -> CodecResult<Self>;
}

/// Write `[tag][len][payload]`.
pub fn write_tagged<P: ResultPayload>(value: &P, out: &mut Vec<u8>) {
    let mut body = Vec::new();
    value.write_payload(&mut body);
    put_i32(out, value.type_tag());
    put_u32(out, body.len() as u32);
    out.extend_from_slice(&body);
}

/// Read `[tag][len][payload]`.
pub fn read_tagged<P: ResultPayload>(reader: &mut ByteReader<'_>) -> CodecResult<P> {
    let tag = reader.read_i32()?;
    let len = reader.read_u32()? as usize;
    let bytes = reader.read_bytes(len)?;
    P::read_payload(tag, bytes)
}

fn expect_tag(expected: i32, found: i32) -> CodecResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(CodecError::TagMismatch { expected, found })
    }
}

fn fixed<const N: usize>(tag: i32, bytes: &[u8]) -> CodecResult<[u8; N]> {
    bytes.try_into().map_err(|_| CodecError::PayloadLength {
        tag,
        expected: N,
        found: bytes.len(),
    })
}

// ---------------------------------------------------------------------------
// Concrete result types
// ---------------------------------------------------------------------------

impl ResultPayload for i64 {
    fn type_tag(&self) -> i32 {
        TAG_LONG
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn read_payload(tag: i32, bytes: &[u8]) -> CodecResult<Self> {
        expect_tag(TAG_LONG, tag)?;
        Ok(i64::from_be_bytes(fixed(tag, bytes)?))
    }
}

impl ResultPayload for f64 {
    fn type_tag(&self) -> i32 {
        TAG_DOUBLE
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bits().to_be_bytes());
    }

    fn read_payload(tag: i32, bytes: &[u8]) -> CodecResult<Self> {
        expect_tag(TAG_DOUBLE, tag)?;
        Ok(f64::from_bits(u64::from_be_bytes(fixed(tag, bytes)?)))
    }
}

impl ResultPayload for bool {
    fn type_tag(&self) -> i32 {
        TAG_BOOL
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn read_payload(tag: i32, bytes: &[u8]) -> CodecResult<Self> {
        expect_tag(TAG_BOOL, tag)?;
        match fixed::<1>(tag, bytes)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(CodecError::InvalidBool(b)),
        }
    }
}

impl ResultPayload for String {
    fn type_tag(&self) -> i32 {
        TAG_TEXT
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn read_payload(tag: i32, bytes: &[u8]) -> CodecResult<Self> {
        expect_tag(TAG_TEXT, tag)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

impl ResultPayload for Vec<u8> {
    fn type_tag(&self) -> i32 {
        TAG_BYTES
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn read_payload(tag: i32, bytes: &[u8]) -> CodecResult<Self> {
        expect_tag(TAG_BYTES, tag)?;
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Payload -- dynamically typed result
// ---------------------------------------------------------------------------

/// Closed set of result shapes, decodable without knowing the producer's
/// result type up front.
///
/// Tags without a registered decoder are preserved as [`Payload::Opaque`]
/// and re-encode byte-for-byte. Doubles compare and hash by bit pattern, so
/// `NaN == NaN` and `0.0 != -0.0`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Long(i64),
    Double(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Pair(Box<Payload>, Box<Payload>),
    Opaque { tag: i32, bytes: Vec<u8> },
}

type PayloadDecoder = fn(i32, &[u8]) -> CodecResult<Payload>;

const PAYLOAD_DECODERS: &[(i32, PayloadDecoder)] = &[
    (TAG_LONG, decode_long),
    (TAG_DOUBLE, decode_double),
    (TAG_BOOL, decode_bool),
    (TAG_TEXT, decode_text),
    (TAG_BYTES, decode_bytes),
    (TAG_PAIR, decode_pair),
];

fn decode_long(tag: i32, bytes: &[u8]) -> CodecResult<Payload> {
    i64::read_payload(tag, bytes).map(Payload::Long)
}

fn decode_double(tag: i32, bytes: &[u8]) -> CodecResult<Payload> {
    f64::read_payload(tag, bytes).map(Payload::Double)
}

fn decode_bool(tag: i32, bytes: &[u8]) -> CodecResult<Payload> {
    bool::read_payload(tag, bytes).map(Payload::Bool)
}

fn decode_text(tag: i32, bytes: &[u8]) -> CodecResult<Payload> {
    String::read_payload(tag, bytes).map(Payload::Text)
}

fn decode_bytes(tag: i32, bytes: &[u8]) -> CodecResult<Payload> {
    Vec::<u8>::read_payload(tag, bytes).map(Payload::Bytes)
}

fn decode_pair(_tag: i32, bytes: &[u8]) -> CodecResult<Payload> {
    let mut reader = ByteReader::new(bytes);
    let first: Payload = read_tagged(&mut reader)?;
    let second: Payload = read_tagged(&mut reader)?;
    reader.finish()?;
    Ok(Payload::Pair(Box::new(first), Box::new(second)))
}

impl Payload {
    pub fn pair(first: Payload, second: Payload) -> Self {
        Payload::Pair(Box::new(first), Box::new(second))
    }

    /// Whether a decoder is registered for `tag`.
    pub fn is_known_tag(tag: i32) -> bool {
        PAYLOAD_DECODERS.iter().any(|(t, _)| *t == tag)
    }
}

impl ResultPayload for Payload {
    fn type_tag(&self) -> i32 {
        match self {
            Payload::Long(_) => TAG_LONG,
            Payload::Double(_) => TAG_DOUBLE,
            Payload::Bool(_) => TAG_BOOL,
            Payload::Text(_) => TAG_TEXT,
            Payload::Bytes(_) => TAG_BYTES,
            Payload::Pair(..) => TAG_PAIR,
            Payload::Opaque { tag, .. } => *tag,
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        match self {
            Payload::Long(v) => v.write_payload(out),
            Payload::Double(v) => v.write_payload(out),
            Payload::Bool(v) => v.write_payload(out),
            Payload::Text(v) => v.write_payload(out),
            Payload::Bytes(v) => v.write_payload(out),
            Payload::Pair(a, b) => {
                write_tagged(a.as_ref(), out);
                write_tagged(b.as_ref(), out);
            }
            Payload::Opaque { bytes, .. } => out.extend_from_slice(bytes),
        }
    }

    fn read_payload(tag: i32, bytes: &[u8]) -> CodecResult<Self> {
        match PAYLOAD_DECODERS.iter().find(|(t, _)| *t == tag) {
            Some((_, decode)) => decode(tag, bytes),
            None => Ok(Payload::Opaque {
                tag,
                bytes: bytes.to_vec(),
            }),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        use Payload::*;
        match (self, other) {
            (Long(a), Long(b)) => a == b,
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Pair(a1, a2), Pair(b1, b2)) => a1 == b1 && a2 == b2,
            (Opaque { tag: ta, bytes: ba }, Opaque { tag: tb, bytes: bb }) => ta == tb && ba == bb,
            _ => false,
        }
    }
}

impl Eq for Payload {}

impl Hash for Payload {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_tag().hash(state);
        match self {
            Payload::Long(v) => v.hash(state),
            Payload::Double(v) => v.to_bits().hash(state),
            Payload::Bool(v) => v.hash(state),
            Payload::Text(v) => v.hash(state),
            Payload::Bytes(v) => v.hash(state),
            Payload::Pair(a, b) => {
                a.hash(state);
                b.hash(state);
            }
            Payload::Opaque { bytes, .. } => bytes.hash(state),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Long(v) => write!(f, "{v}"),
            Payload::Double(v) => write!(f, "{v}"),
            Payload::Bool(v) => write!(f, "{v}"),
            Payload::Text(v) => f.write_str(v),
            Payload::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Payload::Pair(a, b) => write!(f, "({a}, {b})"),
            Payload::Opaque { tag, bytes } => write!(f, "<tag {tag}: {} bytes>", bytes.len()),
        }
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Long(v)
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Double(v)
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::Text(v)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
