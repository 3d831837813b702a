use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Mutex;

use orion_error::StructError;
use orion_error::ErrorOweBase;
use serde::Serialize;

use super::{ResultSink, SinkAck};
use crate::error::{CoreReason, CoreResult};
use crate::result::{DataModel, ResultPayload, WindowResult, decode_identified, encode_identified};

fn open_append(path: &Path) -> CoreResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).owe(CoreReason::ResultSink)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .owe(CoreReason::ResultSink)
}

/// Writes whole records to `W`.
///
/// A record is assembled in memory and handed over in a single `write_all`
/// followed by `flush`. Nothing is kept back after a failed write, so a
/// rejected result that is offered again is written once.
struct RecordWriter<W> {
    out: W,
    record: Vec<u8>,
}

impl<W: Write> RecordWriter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            record: Vec::with_capacity(128),
        }
    }

    fn write(&mut self, fill: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> anyhow::Result<()> {
        self.record.clear();
        fill(&mut self.record)?;
        self.out.write_all(&self.record)?;
        self.out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonLinesSink
// ---------------------------------------------------------------------------

/// Appends results as JSON Lines:
/// `{"start":0,"end":10,"result":6.0,"is_early":false}`.
pub struct JsonLinesSink<W = File> {
    writer: Mutex<RecordWriter<W>>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Ok(Self::from_writer(open_append(path.as_ref())?))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn from_writer(out: W) -> Self {
        Self {
            writer: Mutex::new(RecordWriter::new(out)),
        }
    }

    fn write_line<R: Serialize>(&self, result: &WindowResult<R>) -> anyhow::Result<()> {
        let mut w = self.writer.lock().expect("jsonl sink lock poisoned");
        w.write(|record| {
            serde_json::to_writer(&mut *record, result)?;
            record.push(b'\n');
            Ok(())
        })
    }
}

impl<R: Serialize, W: Write + Send> ResultSink<R> for JsonLinesSink<W> {
    fn accept(&self, result: &WindowResult<R>) -> SinkAck {
        match self.write_line(result) {
            Ok(()) => SinkAck::Ack,
            Err(e) => {
                log::warn!("jsonl sink write failed: {e:#}");
                SinkAck::Reject
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BinarySink
// ---------------------------------------------------------------------------

/// Appends results as `[u32 len][identified frame]` records.
pub struct BinarySink<W = File> {
    writer: Mutex<RecordWriter<W>>,
}

impl BinarySink {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Ok(Self::from_writer(open_append(path.as_ref())?))
    }

    /// Read back every record of a file written by this sink.
    pub fn read_all(path: impl AsRef<Path>) -> CoreResult<Vec<DataModel>> {
        let mut bytes = Vec::new();
        File::open(path.as_ref())
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .owe(CoreReason::ResultSink)?;

        let mut models = Vec::new();
        let mut rest = bytes.as_slice();
        while !rest.is_empty() {
            if rest.len() < 4 {
                return Err(StructError::from(CoreReason::MalformedPayload)
                    .with_detail("truncated record length"));
            }
            let (len, tail) = rest.split_at(4);
            let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
            if tail.len() < len {
                return Err(StructError::from(CoreReason::MalformedPayload)
                    .with_detail(format!("record of {len} bytes truncated to {}", tail.len())));
            }
            let (frame, tail) = tail.split_at(len);
            models.push(decode_identified(frame).map_err(|e| e.into_core())?);
            rest = tail;
        }
        Ok(models)
    }
}

impl<W: Write> BinarySink<W> {
    pub fn from_writer(out: W) -> Self {
        Self {
            writer: Mutex::new(RecordWriter::new(out)),
        }
    }

    fn write_record(&self, frame: &[u8]) -> anyhow::Result<()> {
        let len = u32::try_from(frame.len())?;
        let mut w = self.writer.lock().expect("binary sink lock poisoned");
        w.write(|record| {
            record.extend_from_slice(&len.to_be_bytes());
            record.extend_from_slice(frame);
            Ok(())
        })
    }
}

impl<R: ResultPayload, W: Write + Send> ResultSink<R> for BinarySink<W> {
    fn accept(&self, result: &WindowResult<R>) -> SinkAck {
        match self.write_record(&encode_identified(result)) {
            Ok(()) => SinkAck::Ack,
            Err(e) => {
                log::warn!("binary sink write failed: {e:#}");
                SinkAck::Reject
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
