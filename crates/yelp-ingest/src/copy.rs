//! PostgreSQL `COPY` text-format encoding
//!
//! Rows are tab-delimited and newline-terminated, `\N` marks NULL, and backslash, tab,
//! newline and carriage return inside values are backslash-escaped so free text can never
//! split a field or a row. NUL characters are dropped because PostgreSQL text columns reject
//! them and one stray byte would otherwise fail the whole batch.

use std::fmt::{Display, Write as _};

const NULL_MARKER: &str = "\\N";

/// Appends rows to an in-memory `COPY ... FROM STDIN` payload
#[derive(Debug, Default)]
pub struct CopyEncoder {
    buf: String,
    at_row_start: bool,
    rows: usize,
}

impl CopyEncoder {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: String::with_capacity(bytes),
            at_row_start: true,
            rows: 0,
        }
    }

    fn separator(&mut self) {
        if self.at_row_start {
            self.at_row_start = false;
        } else {
            self.buf.push('\t');
        }
    }

    /// Free-text value, escaped
    pub fn text(&mut self, value: &str) -> &mut Self {
        self.separator();
        for ch in value.chars() {
            match ch {
                '\\' => self.buf.push_str("\\\\"),
                '\t' => self.buf.push_str("\\t"),
                '\n' => self.buf.push_str("\\n"),
                '\r' => self.buf.push_str("\\r"),
                '\0' => {}
                other => self.buf.push(other),
            }
        }
        self
    }

    pub fn opt_text(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.text(v),
            None => self.null(),
        }
    }

    /// Value whose `Display` output never contains delimiter characters (numbers, dates)
    pub fn value<T: Display>(&mut self, value: T) -> &mut Self {
        self.separator();
        // Writing into a String is infallible
        let _ = write!(self.buf, "{}", value);
        self
    }

    pub fn opt_value<T: Display>(&mut self, value: Option<T>) -> &mut Self {
        match value {
            Some(v) => self.value(v),
            None => self.null(),
        }
    }

    pub fn boolean(&mut self, value: bool) -> &mut Self {
        self.separator();
        self.buf.push(if value { 't' } else { 'f' });
        self
    }

    pub fn null(&mut self) -> &mut Self {
        self.separator();
        self.buf.push_str(NULL_MARKER);
        self
    }

    pub fn end_row(&mut self) {
        self.buf.push('\n');
        self.at_row_start = true;
        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}

/// Decode one `COPY` text line back into its fields (`None` for NULL)
///
/// Used by the in-memory store to inspect what would have been written.
pub fn decode_line(line: &str) -> Vec<Option<String>> {
    line.split('\t')
        .map(|field| {
            if field == NULL_MARKER {
                return None;
            }
            let mut out = String::with_capacity(field.len());
            let mut chars = field.chars();
            while let Some(ch) = chars.next() {
                if ch != '\\' {
                    out.push(ch);
                    continue;
                }
                match chars.next() {
                    Some('t') => out.push('\t'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                }
            }
            Some(out)
        })
        .collect()
}
