// Incremental reader for newline-delimited JSON bodies.
//
// Streaming endpoints (`traffic`, `memory`) never finish their body, so
// the reader is fed chunk by chunk and stops as soon as the requested
// record is complete. Blank lines are not records.

use bytes::BytesMut;
use serde_json::Value;

use crate::error::Error;

/// Picks the `target`-th (1-based) record out of an NDJSON byte stream.
#[derive(Debug)]
pub(crate) struct NdjsonReader {
    buf: BytesMut,
    seen: usize,
    target: usize,
}

impl NdjsonReader {
    pub(crate) fn new(target: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            seen: 0,
            target: target.max(1),
        }
    }

    /// Feed one chunk. Returns the decoded record once the target line is complete.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Option<Value>, Error> {
        self.buf.extend_from_slice(chunk);

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            if let Some(value) = self.take(&line)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Signal end of body. A final line without a trailing newline still counts.
    pub(crate) fn finish(&mut self) -> Result<Option<Value>, Error> {
        let rest = self.buf.split();
        self.take(&rest)
    }

    /// Number of records seen so far.
    pub(crate) fn seen(&self) -> usize {
        self.seen
    }

    fn take(&mut self, line: &[u8]) -> Result<Option<Value>, Error> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        self.seen += 1;
        if self.seen < self.target {
            return Ok(None);
        }

        let text = std::str::from_utf8(line).map_err(|e| Error::Deserialization {
            message: format!("line {} is not valid UTF-8: {e}", self.seen),
            body: String::from_utf8_lossy(line).into_owned(),
        })?;
        let text = text.trim();
        serde_json::from_str(text)
            .map(Some)
            .map_err(|e| Error::Deserialization {
                message: format!("line {}: {e}", self.seen),
                body: text.to_owned(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn first_line_in_single_chunk() {
        let mut reader = NdjsonReader::new(1);
        let value = reader.push(b"{\"up\":10,\"down\":20}\n{\"up\":1,\"down\":2}\n").unwrap();
        assert_eq!(value, Some(json!({"up": 10, "down": 20})));
    }

    #[test]
    fn second_line_split_across_chunks() {
        let mut reader = NdjsonReader::new(2);
        assert_eq!(reader.push(b"{\"inuse\":0,\"oslimit\":0}\n{\"in").unwrap(), None);
        assert_eq!(reader.seen(), 1);
        assert_eq!(reader.push(b"use\":4096").unwrap(), None);
        let value = reader.push(b",\"oslimit\":0}\n").unwrap();
        assert_eq!(value, Some(json!({"inuse": 4096, "oslimit": 0})));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut reader = NdjsonReader::new(2);
        let value = reader.push(b"{\"a\":1}\n\n  \r\n{\"a\":2}\n").unwrap();
        assert_eq!(value, Some(json!({"a": 2})));
    }

    #[test]
    fn unterminated_final_line_counts() {
        let mut reader = NdjsonReader::new(1);
        assert_eq!(reader.push(b"{\"up\":5,\"down\":6}").unwrap(), None);
        assert_eq!(reader.finish().unwrap(), Some(json!({"up": 5, "down": 6})));
    }

    #[test]
    fn short_stream_yields_nothing() {
        let mut reader = NdjsonReader::new(3);
        assert_eq!(reader.push(b"{}\n{}\n").unwrap(), None);
        assert_eq!(reader.finish().unwrap(), None);
    }

    #[test]
    fn malformed_target_line_is_an_error() {
        let mut reader = NdjsonReader::new(1);
        let err = reader.push(b"not json\n").unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }

    #[test]
    fn malformed_earlier_lines_are_ignored() {
        let mut reader = NdjsonReader::new(2);
        let value = reader.push(b"garbage\n{\"ok\":true}\n").unwrap();
        assert_eq!(value, Some(json!({"ok": true})));
    }
}
