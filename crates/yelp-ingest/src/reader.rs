//! Line-delimited JSON entity stream reader
//!
//! One physical line is one record. Lines are read into a reused buffer so memory stays
//! bounded by the longest line, not the file size.

use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use yelp_common::YelpError;

use crate::error::Result;

/// Raw field mapping of one source record
pub type RawRecord = Map<String, Value>;

const READ_BUFFER_BYTES: usize = 1 << 20;

/// One item produced by [`EntityStreamReader`]
#[derive(Debug)]
pub enum ReadEvent {
    Record { line: u64, fields: RawRecord },
    /// The line was not a JSON object; the stream continues
    Malformed { line: u64, error: String },
}

/// Lazy, forward-only reader over a JSONL source
pub struct EntityStreamReader<R> {
    inner: R,
    buf: String,
    line: u64,
    bytes_read: u64,
    records_emitted: u64,
    limit: Option<u64>,
    done: bool,
}

impl EntityStreamReader<BufReader<File>> {
    /// Open a file on disk
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(YelpError::SourceNotFound(path.to_path_buf()).into());
        }
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(READ_BUFFER_BYTES, file)))
    }
}

impl<R: BufRead> EntityStreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: String::new(),
            line: 0,
            bytes_read: 0,
            records_emitted: 0,
            limit: None,
            done: false,
        }
    }

    /// Stop after `limit` events (records plus malformed lines)
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Bytes consumed from the source so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Current 1-based line number (0 before the first read)
    pub fn line(&self) -> u64 {
        self.line
    }

    fn parse_current(&self) -> ReadEvent {
        match serde_json::from_str::<Value>(self.buf.trim()) {
            Ok(Value::Object(fields)) => ReadEvent::Record {
                line: self.line,
                fields,
            },
            Ok(other) => ReadEvent::Malformed {
                line: self.line,
                error: format!("expected a JSON object, found {}", json_kind(&other)),
            },
            Err(e) => ReadEvent::Malformed {
                line: self.line,
                error: e.to_string(),
            },
        }
    }
}

impl<R: BufRead> Iterator for EntityStreamReader<R> {
    type Item = Result<ReadEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.limit.is_some_and(|limit| self.records_emitted >= limit) {
            self.done = true;
            return None;
        }

        loop {
            self.buf.clear();
            let n = match self.inner.read_line(&mut self.buf) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                },
            };
            if n == 0 {
                self.done = true;
                return None;
            }
            self.line += 1;
            self.bytes_read += n as u64;

            if self.buf.trim().is_empty() {
                continue;
            }

            self.records_emitted += 1;
            return Some(Ok(self.parse_current()));
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn events(input: &str) -> Vec<ReadEvent> {
        EntityStreamReader::new(Cursor::new(input.as_bytes().to_vec()))
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_reads_one_record_per_line() {
        let out = events("{\"business_id\":\"b1\"}\n{\"business_id\":\"b2\"}\n");
        assert_eq!(out.len(), 2);
        match &out[1] {
            ReadEvent::Record { line, fields } => {
                assert_eq!(*line, 2);
                assert_eq!(fields["business_id"], "b2");
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_line_is_reported_and_stream_continues() {
        let out = events("{\"a\":1}\n{not json\n[1,2]\n{\"a\":2}");
        assert_eq!(out.len(), 4);
        assert!(matches!(out[1], ReadEvent::Malformed { line: 2, .. }));
        match &out[2] {
            ReadEvent::Malformed { line, error } => {
                assert_eq!(*line, 3);
                assert!(error.contains("array"));
            },
            other => panic!("unexpected event: {:?}", other),
        }
        // Last line without trailing newline still parses
        assert!(matches!(out[3], ReadEvent::Record { line: 4, .. }));
    }

    #[test]
    fn test_blank_lines_are_skipped_but_counted_for_line_numbers() {
        let out = events("\n   \n{\"a\":1}\n\n");
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], ReadEvent::Record { line: 3, .. }));
    }

    #[test]
    fn test_limit_stops_early() {
        let input = "{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n";
        let reader = EntityStreamReader::new(Cursor::new(input)).with_limit(Some(2));
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn test_bytes_read_tracks_consumption() {
        let input = "{\"a\":1}\n{\"a\":2}\n";
        let mut reader = EntityStreamReader::new(Cursor::new(input));
        reader.next();
        assert_eq!(reader.bytes_read(), 8);
        reader.next();
        assert_eq!(reader.bytes_read(), input.len() as u64);
    }

    #[test]
    fn test_open_missing_file_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = EntityStreamReader::open(&dir.path().join("missing.json"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_open_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"user_id\":\"u1\"}}").unwrap();
        let reader = EntityStreamReader::open(file.path()).unwrap();
        assert_eq!(reader.count(), 1);
    }
}
