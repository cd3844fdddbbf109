//! Field coercion helpers shared by the per-entity normalizers
//!
//! Optional fields never fail: absent keys, `null`, empty strings, the literal `"None"` and
//! unparseable values all fall back to the caller's default.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::MalformedRecord;
use crate::reader::RawRecord;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// The value under `key`, or `None` when it is absent in any of the accepted spellings
pub fn present<'a>(raw: &'a RawRecord, key: &str) -> Option<&'a Value> {
    match raw.get(key)? {
        Value::Null => None,
        Value::String(s) if is_blank(s) => None,
        v => Some(v),
    }
}

fn is_blank(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s == "None"
}

/// Mandatory identifier; the record is malformed without it
pub fn required_id(raw: &RawRecord, key: &'static str) -> Result<String, MalformedRecord> {
    match present(raw, key) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(MalformedRecord::invalid(key, "identifier is not a string")),
        None => Err(MalformedRecord::Missing(key)),
    }
}

pub fn opt_string(raw: &RawRecord, key: &str) -> Option<String> {
    match present(raw, key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn opt_f64(raw: &RawRecord, key: &str) -> Option<f64> {
    let value: Option<f64> = match present(raw, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Star rating in `0.0..=5.0`; anything outside the range is treated as absent
pub fn opt_rating(raw: &RawRecord, key: &str) -> Option<f64> {
    opt_f64(raw, key).filter(|v| (0.0..=5.0).contains(v))
}

/// Integer field; floats and numeric strings are truncated toward zero
pub fn int_or(raw: &RawRecord, key: &str, default: i32) -> i32 {
    let value = match present(raw, key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        },
        _ => None,
    };
    value
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(default)
}

pub fn bool_or(raw: &RawRecord, key: &str, default: bool) -> bool {
    match present(raw, key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(default),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "yes" => true,
            "0" | "false" | "f" | "no" => false,
            _ => default,
        },
        _ => default,
    }
}

/// `%Y-%m-%d %H:%M:%S` or `%Y-%m-%d`; only the date part is kept
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(s, DATE_FORMAT))
        .ok()
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), DATETIME_FORMAT).ok()
}

pub fn opt_date(raw: &RawRecord, key: &str) -> Option<NaiveDate> {
    match present(raw, key)? {
        Value::String(s) => parse_date(s),
        _ => None,
    }
}

/// Mandatory date; missing or unparseable makes the record malformed
pub fn required_date(raw: &RawRecord, key: &'static str) -> Result<NaiveDate, MalformedRecord> {
    match present(raw, key) {
        Some(Value::String(s)) => {
            parse_date(s).ok_or_else(|| MalformedRecord::invalid(key, format!("unparseable date '{}'", s)))
        },
        Some(_) => Err(MalformedRecord::invalid(key, "date is not a string")),
        None => Err(MalformedRecord::Missing(key)),
    }
}

/// Elements of a list field given as an array or a comma-joined string
///
/// Elements are trimmed; empty elements and `"None"` are skipped; repeats collapse to the
/// first occurrence.
pub fn list_elements(raw: &RawRecord, key: &str) -> Vec<String> {
    let items: Vec<String> = match present(raw, key) {
        Some(Value::String(s)) => s.split(',').map(|e| e.trim().to_string()).collect(),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    dedup(items.into_iter().filter(|e| !is_blank(e)))
}

/// Object-valued field, if present
pub fn object<'a>(raw: &'a RawRecord, key: &str) -> Option<&'a Map<String, Value>> {
    match present(raw, key)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Keep the first occurrence of each item
pub fn dedup<T, I>(items: I) -> Vec<T>
where
    T: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
