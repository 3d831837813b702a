pub mod codec;
mod payload;
mod registry;

pub use codec::{ByteReader, CodecError, CodecResult};
pub use payload::{
    Payload, ResultPayload, TAG_BOOL, TAG_BYTES, TAG_DOUBLE, TAG_LONG, TAG_PAIR, TAG_TEXT,
    read_tagged, write_tagged,
};
pub use registry::{
    DATAMODEL_FACTORY_ID, DataModel, IdentifiedData, WINDOW_RESULT_CLASS_ID, decode_identified,
    encode_identified,
};

use std::fmt;

use chrono::{Local, TimeZone};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::window::WindowKey;
use codec::{put_bool, put_i64};

/// Aggregate result for one time window, emitted early (provisional) or
/// final (authoritative, exactly once per window).
///
/// Immutable once built. Equality and hash cover all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowResult<R> {
    start: i64,
    end: i64,
    result: R,
    is_early: bool,
}

impl<R> WindowResult<R> {
    pub fn new(key: WindowKey, result: R, is_early: bool) -> Self {
        Self {
            start: key.start(),
            end: key.end(),
            result,
            is_early,
        }
    }

    /// A final (non-early) result.
    pub fn new_final(key: WindowKey, result: R) -> Self {
        Self::new(key, result, false)
    }

    /// Inclusive window start, epoch millis.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Exclusive window end, epoch millis.
    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn result(&self) -> &R {
        &self.result
    }

    /// Whether this is an early result, to be followed by the final one.
    pub fn is_early(&self) -> bool {
        self.is_early
    }

    pub fn key(&self) -> WindowKey {
        WindowKey::from_ordered(self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Wire codec
// ---------------------------------------------------------------------------

impl<R: ResultPayload> WindowResult<R> {
    /// Encode as `[i64 start][i64 end][u8 is_early][i32 tag][u32 len][payload]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        self.write_data(&mut out);
        out
    }

    pub fn write_data(&self, out: &mut Vec<u8>) {
        put_i64(out, self.start);
        put_i64(out, self.end);
        put_bool(out, self.is_early);
        write_tagged(&self.result, out);
    }

    /// Decode a buffer produced by [`encode`](Self::encode). The buffer must
    /// contain exactly one result.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let value = Self::read_data(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }

    pub fn read_data(reader: &mut ByteReader<'_>) -> CodecResult<Self> {
        let start = reader.read_i64()?;
        let end = reader.read_i64()?;
        let is_early = reader.read_bool()?;
        let key = WindowKey::new(start, end).ok_or(CodecError::InvalidBounds { start, end })?;
        let result = read_tagged(reader)?;
        Ok(Self::new(key, result, is_early))
    }
}

// ---------------------------------------------------------------------------
// Display / Serialize
// ---------------------------------------------------------------------------

/// Render epoch millis as local wall-clock time, falling back to the raw
/// number when the instant is not representable.
fn local_time(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).earliest() {
        Some(t) => t.format("%H:%M:%S%.3f").to_string(),
        None => millis.to_string(),
    }
}

impl<R: fmt::Display> fmt::Display for WindowResult<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WindowResult{{start={}, end={}, value='{}', is_early={}}}",
            local_time(self.start),
            local_time(self.end),
            self.result,
            self.is_early,
        )
    }
}

impl<R: Serialize> Serialize for WindowResult<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("WindowResult", 4)?;
        s.serialize_field("start", &self.start)?;
        s.serialize_field("end", &self.end)?;
        s.serialize_field("result", &self.result)?;
        s.serialize_field("is_early", &self.is_early)?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
