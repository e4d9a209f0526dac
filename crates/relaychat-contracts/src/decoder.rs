//! Incremental decoder for the newline-delimited record stream.
//!
//! Network reads rarely line up with record boundaries. The decoder keeps
//! the unterminated tail of the previous read as raw bytes and only decodes
//! a record once its `\n` has arrived, so a UTF-8 sequence split between
//! two reads is reassembled before any text decoding happens.

use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::frame::{Frame, RECORD_PREFIX};

/// Upper bound for a single undelimited record.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

const DONE_MARKER: &str = "[DONE]";
const PREVIEW_LEN: usize = 64;

#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_record_bytes: usize,
    /// Set after an oversized record was dropped; the rest of it is skipped
    /// up to the next delimiter.
    discarding: bool,
    /// Leading bytes of `buffer` already known to hold no delimiter.
    scanned: usize,
    malformed: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORD_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_record_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_record_bytes,
            discarding: false,
            scanned: 0,
            malformed: 0,
        }
    }

    /// Feed one network read and return the frames completed by it, in
    /// arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            if self.discarding {
                self.discarding = false;
            } else {
                match decode_record(&self.buffer[consumed..end]) {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => {}
                    Err(err) => {
                        self.malformed += 1;
                        warn!(error = %err, "Skipping malformed stream record");
                    }
                }
            }
            consumed = end + 1;
            search_from = consumed;
        }
        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_record_bytes {
            let err = ProtocolError::RecordTooLarge {
                limit: self.max_record_bytes,
            };
            warn!(error = %err, "Dropping oversized stream record");
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
            self.malformed += 1;
        }

        frames
    }

    /// Flush a final record that arrived without a trailing delimiter.
    pub fn finish(&mut self) -> Vec<Frame> {
        let tail = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || tail.is_empty() {
            return Vec::new();
        }

        match decode_record(&tail) {
            Ok(Some(frame)) => vec![frame],
            Ok(None) => Vec::new(),
            Err(err) => {
                self.malformed += 1;
                warn!(error = %err, "Skipping malformed trailing record");
                Vec::new()
            }
        }
    }

    /// Number of records skipped as malformed so far.
    pub fn malformed_records(&self) -> usize {
        self.malformed
    }

    /// Bytes buffered while waiting for a delimiter.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

/// Decode one record (without its `\n`). `Ok(None)` means filler.
fn decode_record(record: &[u8]) -> Result<Option<Frame>, ProtocolError> {
    let record = record.strip_suffix(b"\r").unwrap_or(record);
    let Some(payload) = record.strip_prefix(RECORD_PREFIX.as_bytes()) else {
        return Ok(None);
    };
    let payload = payload.strip_prefix(b" ").unwrap_or(payload);
    let text = std::str::from_utf8(payload)?.trim();

    if text.is_empty() || text == DONE_MARKER {
        debug!("Skipping empty data record");
        return Ok(None);
    }

    serde_json::from_str(text)
        .map(Some)
        .map_err(|source| ProtocolError::MalformedRecord {
            preview: text.chars().take(PREVIEW_LEN).collect(),
            source,
        })
}
